//! Motor controller for the e-board simulator.
//!
//! Two cooperating control tasks override the coasting physics while the
//! motor drives: an ERPM ramp task that slews the motor toward the
//! commanded electrical RPM, and a current task whose only supported
//! setpoint is exactly zero (disengage and coast).

mod controller;
mod signal;

pub use controller::{MotorController, MotorError, MotorHandle, CONTROLLER_EFFICIENCY, MOTOR_EFFICIENCY};
pub use signal::Signal;
