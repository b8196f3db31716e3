//! Firmware 6.00 message family.
//!
//! Layouts follow the `COMM_GET_VALUES` and `COMM_GET_IMU_DATA` tables of
//! the VESC bldc-6.00 sources; only the fields the simulator drives are
//! populated, everything else stays zero.

use crate::codec::ByteWriter;

/// Telemetry snapshot, reply to command ID 4. 74 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMessage {
    pub motor_current_a: f64,
    pub erpm: i32,
    pub watt_hours: f64,
}

impl StateMessage {
    pub const BYTE_LENGTH: usize = 74;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new(Self::BYTE_LENGTH);
        w.put_i32(4, (self.motor_current_a * 100.0) as i32)
            .put_i32(22, self.erpm)
            .put_i32(36, (self.watt_hours * 10_000.0) as i32);
        w.into_bytes()
    }
}

/// IMU snapshot, reply to command ID 65. 68 bytes.
///
/// Sixteen big-endian IEEE-754 float32 values starting at offset 1:
/// roll/pitch/yaw (radians), accelerometer, gyroscope, magnetometer, then
/// the attitude quaternion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImuStateMessage {
    pub rpy: [f64; 3],
    pub acc: [f64; 3],
    pub gyro: [f64; 3],
    pub mag: [f64; 3],
    pub q: [f64; 4],
}

impl ImuStateMessage {
    pub const BYTE_LENGTH: usize = 68;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new(Self::BYTE_LENGTH);
        let fields = self
            .rpy
            .iter()
            .chain(self.acc.iter())
            .chain(self.gyro.iter())
            .chain(self.mag.iter())
            .chain(self.q.iter());
        for (i, &value) in fields.enumerate() {
            w.put_f32(1 + i * 4, value as f32);
        }
        w.into_bytes()
    }
}
