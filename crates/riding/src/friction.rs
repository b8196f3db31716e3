//! Rolling friction and aerodynamic drag.

use crate::GRAVITY_MPS2;
use board::EBoardParams;

/// Air density at sea level in kg/m³.
const AIR_DENSITY: f64 = 1.225;

/// Combined rolling-friction and drag model.
///
/// Returns unsigned magnitudes; the caller applies the sign opposing the
/// direction of motion.
#[derive(Debug, Clone, Copy)]
pub struct FrictionModel {
    mu_rolling: f64,
    c_drag: f64,
    mass_kg: f64,
    frontal_area_m2: f64,
}

impl FrictionModel {
    pub fn new(mu_rolling: f64, c_drag: f64, params: &EBoardParams) -> Self {
        Self {
            mu_rolling,
            c_drag,
            mass_kg: params.total_mass_kg,
            frontal_area_m2: params.frontal_area_m2,
        }
    }

    /// Deceleration magnitude and velocity reduction over `dt_ms` at the
    /// given velocity. Both values are non-negative.
    pub fn decelerate(&self, velocity_mps: f64, dt_ms: f64) -> (f64, f64) {
        let force_friction = self.mu_rolling * self.mass_kg * GRAVITY_MPS2;
        let force_drag =
            self.c_drag * AIR_DENSITY * velocity_mps * velocity_mps * self.frontal_area_m2;
        let decel_mps2 = (force_friction + force_drag) / self.mass_kg;
        let dv_mps = decel_mps2 * (dt_ms / 1000.0);
        (decel_mps2, dv_mps)
    }
}
