//! Messages shared by every supported firmware family.

use crate::codec::ByteWriter;
use crate::FirmwareVersion;

/// Hardware name reported in the firmware descriptor.
pub const HARDWARE_NAME: &str = "HardwareName";

/// Firmware descriptor, reply to command ID 0.
///
/// `[major, minor]` followed by the UTF-8 hardware name; the rest of the
/// 64-byte buffer stays zero.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareMessage {
    version: FirmwareVersion,
}

impl FirmwareMessage {
    pub const BYTE_LENGTH: usize = 64;

    pub fn new(version: FirmwareVersion) -> Self {
        Self { version }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new(Self::BYTE_LENGTH);
        w.put_u8(0, 6)
            .put_u8(1, self.version.minor())
            .put_bytes(2, HARDWARE_NAME.as_bytes());
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_600_descriptor() {
        let buf = FirmwareMessage::new(FirmwareVersion::Fw6_00).encode();
        assert_eq!(buf.len(), FirmwareMessage::BYTE_LENGTH);
        assert_eq!(buf[0], 6);
        assert_eq!(buf[1], 0);
        assert_eq!(&buf[2..14], b"HardwareName");
        assert!(buf[14..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_firmware_602_descriptor() {
        let buf = FirmwareMessage::new(FirmwareVersion::Fw6_02).encode();
        assert_eq!(buf[0], 6);
        assert_eq!(buf[1], 2);
        assert_eq!(&buf[2..14], b"HardwareName");
    }
}
