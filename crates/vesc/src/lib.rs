//! VESC binary protocol front-end.
//!
//! Emulates the serial face of a VESC motor controller: inbound command
//! frames are classified by ID and dispatched to telemetry builders or
//! motor setpoints, replies are framed and written back, and a heartbeat
//! watchdog terminates the simulation when the client goes quiet.
//!
//! Two firmware message families are supported, 6.00 and 6.02. A given
//! processor instance speaks exactly one of them.
//!
//! Reference: <https://github.com/vedderb/bldc/blob/master/comm/commands.c>

pub mod cmp;
pub mod codec;
pub mod fw;
pub mod fw600;
pub mod fw602;
pub mod transport;
pub mod watchdog;

pub use cmp::{CommandMessageProcessor, CmpError};
pub use transport::{memory_pair, MemoryTransport, SerialTransport, Transport, TransportError};
pub use watchdog::HeartbeatWatchdog;

use std::fmt;
use std::str::FromStr;

/// Number of bytes read per inbound command frame. Clients pad every
/// command packet to this size.
pub const COMMAND_BYTE_SIZE: usize = 256;

/// Default heartbeat timeout in seconds.
pub const HEARTBEAT_TIMEOUT_SEC: f64 = 1.5;

/// VESC firmware variants the simulator can present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareVersion {
    Fw6_00,
    Fw6_02,
}

impl FirmwareVersion {
    /// Minor version byte sent in the firmware descriptor.
    pub fn minor(self) -> u8 {
        match self {
            Self::Fw6_00 => 0,
            Self::Fw6_02 => 2,
        }
    }

    /// Classify an inbound command ID for this firmware's dispatch table.
    pub fn command_for_id(self, id: u8) -> Option<Command> {
        match (self, id) {
            (_, 0) => Some(Command::Firmware),
            (_, 4) => Some(Command::State),
            (_, 6) => Some(Command::Current),
            (_, 8) => Some(Command::Rpm),
            (_, 30) => Some(Command::Heartbeat),
            (Self::Fw6_00, 65) => Some(Command::ImuState),
            (Self::Fw6_02, 14) => Some(Command::McConfig),
            (Self::Fw6_02, 164) => Some(Command::BionicBoarder),
            _ => None,
        }
    }
}

impl FromStr for FirmwareVersion {
    type Err = UnknownFirmware;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "6.00" => Ok(Self::Fw6_00),
            "6.02" => Ok(Self::Fw6_02),
            other => Err(UnknownFirmware(other.to_string())),
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fw6_00 => write!(f, "6.00"),
            Self::Fw6_02 => write!(f, "6.02"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("no VESC firmware version matching {0:?}")]
pub struct UnknownFirmware(pub String);

/// Commands understood by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Firmware descriptor request
    Firmware,
    /// Telemetry snapshot request
    State,
    /// Current setpoint (only 0.0 is accepted)
    Current,
    /// ERPM setpoint
    Rpm,
    /// Keep-alive; re-arms the watchdog
    Heartbeat,
    /// IMU snapshot request (6.00)
    ImuState,
    /// Motor controller configuration request (6.02)
    McConfig,
    /// Combined motor + IMU summary request (6.02)
    BionicBoarder,
}

impl Command {
    /// ID byte carried in the reply header. The bionic boarder summary is
    /// requested with ID 164 but answered under ID 66.
    pub fn reply_id(self) -> u8 {
        match self {
            Self::Firmware => 0,
            Self::State => 4,
            Self::Current => 6,
            Self::Rpm => 8,
            Self::Heartbeat => 30,
            Self::ImuState => 65,
            Self::McConfig => 14,
            Self::BionicBoarder => 66,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_tables_per_firmware() {
        let fw00 = FirmwareVersion::Fw6_00;
        let fw02 = FirmwareVersion::Fw6_02;

        for id in [0u8, 4, 6, 8, 30] {
            assert!(fw00.command_for_id(id).is_some());
            assert!(fw02.command_for_id(id).is_some());
        }
        assert_eq!(fw00.command_for_id(65), Some(Command::ImuState));
        assert_eq!(fw00.command_for_id(14), None);
        assert_eq!(fw00.command_for_id(164), None);

        assert_eq!(fw02.command_for_id(14), Some(Command::McConfig));
        assert_eq!(fw02.command_for_id(164), Some(Command::BionicBoarder));
        assert_eq!(fw02.command_for_id(65), None);
    }

    #[test]
    fn test_bionic_boarder_answers_under_66() {
        assert_eq!(Command::BionicBoarder.reply_id(), 66);
    }

    #[test]
    fn test_firmware_version_parse() {
        assert_eq!("6.00".parse::<FirmwareVersion>().unwrap(), FirmwareVersion::Fw6_00);
        assert_eq!("6.02".parse::<FirmwareVersion>().unwrap(), FirmwareVersion::Fw6_02);
        assert!("5.30".parse::<FirmwareVersion>().is_err());
    }
}
