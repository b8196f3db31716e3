//! Coasting physics for the e-board simulator.
//!
//! Pure force models (friction/drag, rider push), the battery energy
//! integrator, and the fixed-step kinematic loop that advances the shared
//! kinematic state whenever the motor is not driving.

mod battery;
mod friction;
mod kinematic;
mod push;

pub use battery::{BatteryDischargeModel, IDLE_DRAW_A};
pub use friction::FrictionModel;
pub use kinematic::{KinematicConfig, KinematicLoop};
pub use push::PushModel;

/// Standard gravity in m/s².
pub const GRAVITY_MPS2: f64 = 9.81;
