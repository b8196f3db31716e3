//! Firmware 6.02 message family.
//!
//! Layouts follow the `COMM_GET_VALUES` and `COMM_GET_MCCONF` tables of the
//! VESC bldc-6.02 sources. The bionic boarder summary is a simulator-side
//! extension carrying the motor dynamics and IMU fields in one packet.

use crate::codec::ByteWriter;
use board::EBoardParams;
use std::f64::consts::PI;

/// Full `COMM_GET_VALUES` telemetry snapshot, reply to command ID 4. 74 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMessage {
    pub temp_fet_c: f64,
    pub temp_motor_c: f64,
    pub avg_motor_current_a: f64,
    pub avg_input_current_a: f64,
    pub avg_id_a: f64,
    pub avg_iq_a: f64,
    pub duty_cycle_now: f64,
    pub rpm: i32,
    pub vin: f64,
    pub amp_hours: f64,
    pub amp_hours_charged: f64,
    pub watt_hours: f64,
    pub watt_hours_charged: f64,
    pub tachometer: i32,
    pub tachometer_abs: i32,
    pub fault_code: u8,
    pub pid_pos_now: f64,
    pub controller_id: u8,
    pub mos1_temp_c: f64,
    pub mos2_temp_c: f64,
    pub mos3_temp_c: f64,
    pub avg_vd: f64,
    pub avg_vq: f64,
    pub status: u8,
}

impl StateMessage {
    pub const BYTE_LENGTH: usize = 74;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new(Self::BYTE_LENGTH);
        w.put_i16(0, (self.temp_fet_c * 1e1) as i16)
            .put_i16(2, (self.temp_motor_c * 1e1) as i16)
            .put_i32(4, (self.avg_motor_current_a * 1e2) as i32)
            .put_i32(8, (self.avg_input_current_a * 1e2) as i32)
            .put_i32(12, (self.avg_id_a * 1e2) as i32)
            .put_i32(16, (self.avg_iq_a * 1e2) as i32)
            .put_i16(20, (self.duty_cycle_now * 1e3) as i16)
            .put_i32(22, self.rpm)
            .put_i16(26, (self.vin * 1e1) as i16)
            .put_i32(28, (self.amp_hours * 1e4) as i32)
            .put_i32(32, (self.amp_hours_charged * 1e4) as i32)
            .put_i32(36, (self.watt_hours * 1e4) as i32)
            .put_i32(40, (self.watt_hours_charged * 1e4) as i32)
            .put_i32(44, self.tachometer)
            .put_i32(48, self.tachometer_abs)
            .put_u8(52, self.fault_code)
            .put_i32(53, (self.pid_pos_now * 1e6) as i32)
            .put_u8(57, self.controller_id)
            .put_i16(58, (self.mos1_temp_c * 1e1) as i16)
            .put_i16(60, (self.mos2_temp_c * 1e1) as i16)
            .put_i16(62, (self.mos3_temp_c * 1e1) as i16)
            .put_i32(64, (self.avg_vd * 1e3) as i32)
            .put_i32(68, (self.avg_vq * 1e3) as i32)
            .put_u8(72, self.status);
        w.into_bytes()
    }
}

/// Combined motor + IMU summary, requested with ID 164 and answered under
/// ID 66. 34 bytes; attitude in radians.
#[derive(Debug, Clone, Copy, Default)]
pub struct BionicBoarderMessage {
    pub motor_current_a: f64,
    pub duty_cycle: f64,
    pub rpm: i32,
    pub acc: [f64; 3],
    pub rpy: [f64; 3],
}

impl BionicBoarderMessage {
    pub const BYTE_LENGTH: usize = 34;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new(Self::BYTE_LENGTH);
        w.put_i32(0, (self.motor_current_a * 100.0) as i32)
            .put_i16(4, (self.duty_cycle * 1000.0) as i16)
            .put_i32(6, self.rpm);
        for (i, &a) in self.acc.iter().enumerate() {
            w.put_f32(10 + i * 4, a as f32);
        }
        for (i, &r) in self.rpy.iter().enumerate() {
            w.put_f32(22 + i * 4, r as f32);
        }
        w.into_bytes()
    }
}

/// Motor controller configuration, reply to command ID 14. 697 bytes.
///
/// Only the fields a rider-facing application reads are populated; the
/// remaining offsets stay zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotorConfigMessage {
    pub l_current_max_a: f64,
    pub l_max_vin: f64,
    pub l_watt_max: f64,
    pub foc_motor_flux_linkage: f64,
    pub si_motor_poles: u8,
    pub si_gear_ratio: f64,
    pub si_wheel_diameter_m: f64,
    pub si_battery_ah: f64,
}

impl MotorConfigMessage {
    pub const BYTE_LENGTH: usize = 697;

    /// Build the configuration the simulated controller would report for
    /// this board.
    pub fn from_params(params: &EBoardParams) -> Self {
        // kv ties the flux linkage down: λ = 60 / (√3·2π·kv·pole_pairs).
        let flux_linkage = 60.0
            / (3f64.sqrt()
                * 2.0
                * PI
                * params.motor_kv as f64
                * params.motor_pole_pairs as f64);
        Self {
            l_current_max_a: params.motor_max_amps,
            l_max_vin: params.battery_nominal_voltage,
            l_watt_max: params.motor_max_power_w,
            foc_motor_flux_linkage: flux_linkage,
            si_motor_poles: (2 * params.motor_pole_pairs) as u8,
            si_gear_ratio: params.gear_ratio,
            si_wheel_diameter_m: params.wheel_diameter_m,
            si_battery_ah: params.battery_capacity_ah,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new(Self::BYTE_LENGTH);
        w.put_f32(0, self.l_current_max_a as f32)
            .put_f32(44, self.l_max_vin as f32)
            .put_f32(85, self.l_watt_max as f32)
            .put_f32(222, self.foc_motor_flux_linkage as f32)
            .put_u8(644, self.si_motor_poles)
            .put_f32(645, self.si_gear_ratio as f32)
            .put_f32(649, self.si_wheel_diameter_m as f32)
            .put_f32(661, self.si_battery_ah as f32);
        w.into_bytes()
    }
}
