//! Single foot/paddle push along the board's long axis.

use board::EBoardParams;

/// Models one push: an arm-up phase that briefly slows the board (the foot
/// or paddle planting on the ground), then the propulsive stroke.
///
/// The arm-up phase leads with 10% of the push duration and 10% of the
/// rider acceleration, in the negative direction. Both phases ramp
/// linearly, peaking at twice the nominal acceleration so that the time
/// integral of the triangle equals the rectangular force impulse.
#[derive(Debug, Clone, Copy)]
pub struct PushModel {
    mass_kg: f64,
    accel_rider_mps2: f64,
    accel_slowdown_mps2: f64,
    duration_ms: f64,
    slowdown_ms: f64,
    elapsed_ms: f64,
    active: bool,
}

impl PushModel {
    pub fn new(params: &EBoardParams) -> Self {
        Self {
            mass_kg: params.total_mass_kg,
            accel_rider_mps2: 0.0,
            accel_slowdown_mps2: 0.0,
            duration_ms: 0.0,
            slowdown_ms: 0.0,
            elapsed_ms: 0.0,
            active: false,
        }
    }

    /// Arm a push with the given rider force and stroke duration.
    pub fn setup(&mut self, force_n: f64, duration_ms: f64) {
        self.accel_rider_mps2 = force_n / self.mass_kg;
        self.accel_slowdown_mps2 = -0.10 * self.accel_rider_mps2;
        self.duration_ms = duration_ms;
        self.slowdown_ms = 0.10 * duration_ms;
        self.elapsed_ms = 0.0;
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Advance the push by `dt_ms` and return the acceleration applied over
    /// that step and the resulting velocity change.
    pub fn step(&mut self, dt_ms: f64) -> (f64, f64) {
        if !self.active {
            return (0.0, 0.0);
        }
        let accel = if self.elapsed_ms <= self.slowdown_ms {
            // Arm-up: 2·a_slowdown ramping down to zero.
            let fraction = if self.slowdown_ms > 0.0 {
                self.elapsed_ms / self.slowdown_ms
            } else {
                1.0
            };
            2.0 * self.accel_slowdown_mps2 * (1.0 - fraction)
        } else {
            // Propulsive stroke: zero ramping up to 2·a_rider.
            let fraction = (self.elapsed_ms - self.slowdown_ms) / self.duration_ms;
            2.0 * self.accel_rider_mps2 * fraction
        };
        let dv = accel * (dt_ms / 1000.0);
        self.elapsed_ms += dt_ms;
        if self.elapsed_ms > self.duration_ms + self.slowdown_ms {
            self.active = false;
        }
        (accel, dv)
    }
}
