//! Shared parameters and kinematic state for the e-board simulator.
//!
//! The kinematic state lives behind a single coarse mutex ([`SharedEks`]);
//! every reader and writer takes the lock for the duration of one tick,
//! micro-step or telemetry reply so no partial update is ever observable.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Physical configuration of the board, rider and drivetrain.
///
/// Immutable after construction; validated by the daemon at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EBoardParams {
    /// Combined mass of board and rider in kg
    pub total_mass_kg: f64,
    /// Frontal area of the rider facing the wind in m²
    pub frontal_area_m2: f64,
    /// Wheel diameter in meters
    pub wheel_diameter_m: f64,
    /// Battery capacity in amp-hours
    pub battery_capacity_ah: f64,
    /// Battery nominal voltage in volts
    pub battery_nominal_voltage: f64,
    /// Motor-to-wheel gear ratio
    pub gear_ratio: f64,
    /// Motor velocity constant in RPM per volt
    pub motor_kv: u32,
    /// Maximum motor torque in N·m
    pub motor_max_torque_nm: f64,
    /// Maximum motor current in amps
    pub motor_max_amps: f64,
    /// Maximum motor power in watts
    pub motor_max_power_w: f64,
    /// Number of motor pole pairs (ERPM = mechanical RPM × pole pairs)
    pub motor_pole_pairs: u32,
}

impl EBoardParams {
    /// Wheel radius in meters.
    pub fn wheel_radius_m(&self) -> f64 {
        self.wheel_diameter_m / 2.0
    }

    /// Board velocity in m/s for a signed electrical RPM.
    pub fn velocity_for_erpm(&self, erpm: i32) -> f64 {
        ((erpm as f64 / self.motor_pole_pairs as f64) / self.gear_ratio)
            * (PI * self.wheel_diameter_m / 60.0)
    }

    /// Signed electrical RPM for a board velocity in m/s.
    pub fn erpm_for_velocity(&self, velocity_mps: f64) -> i32 {
        let wheel_rpm = velocity_mps / (PI * self.wheel_diameter_m) * 60.0;
        let motor_rpm = wheel_rpm * self.gear_ratio;
        (self.motor_pole_pairs as f64 * motor_rpm) as i32
    }
}

/// Kinematic state of the board in its body frame.
///
/// The x-axis runs along the length of the board; velocity is the signed
/// speed along that axis and may go negative when rolling backward down a
/// slope. Attitude is kept in degrees and converted to radians on the wire.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EboardKinematicState {
    /// Signed speed along the board's long axis in m/s
    pub velocity_mps: f64,
    /// Instantaneous longitudinal acceleration in m/s²
    pub acceleration_x_mps2: f64,
    /// Lateral acceleration in m/s² (not driven by the 1-D model)
    pub acceleration_y_mps2: f64,
    /// Vertical acceleration in m/s² (not driven by the 1-D model)
    pub acceleration_z_mps2: f64,
    /// Pitch in degrees, driven by the slope process
    pub pitch_deg: f64,
    /// Roll in degrees (not driven by the 1-D model)
    pub roll_deg: f64,
    /// Yaw in degrees (not driven by the 1-D model)
    pub yaw_deg: f64,
    /// Signed electrical RPM
    pub erpm: i32,
    /// Signed motor-side current in amps
    pub motor_current_a: f64,
    /// Signed battery-side current in amps
    pub input_current_a: f64,
}

/// Shared handle to the kinematic state. One coarse lock for every field.
pub type SharedEks = Arc<Mutex<EboardKinematicState>>;

/// Create a fresh shared kinematic state at rest.
pub fn shared_eks() -> SharedEks {
    Arc::new(Mutex::new(EboardKinematicState::default()))
}

/// Monotonic clock started when the simulation comes up.
///
/// Cloned into every component that stamps records, replacing any global
/// elapsed-time state.
#[derive(Debug, Clone, Copy)]
pub struct MissionClock {
    start: Instant,
}

impl MissionClock {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Seconds elapsed since the simulation started.
    pub fn elapsed_sec(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
