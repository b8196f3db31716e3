//! Battery energy integrator.

use std::sync::Mutex;

/// Idle electronics draw in amps, used whenever the motor is disengaged.
pub const IDLE_DRAW_A: f64 = 1.0;

/// Integrates instantaneous current draw into watt-hours consumed.
///
/// Guarded by its own mutex, independent of the kinematic state lock. The
/// accumulator is monotone non-decreasing: the draw is clamped at zero so
/// no caller can wind the energy count backwards.
#[derive(Debug)]
pub struct BatteryDischargeModel {
    nominal_voltage: f64,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    current_draw_a: f64,
    watt_hours_consumed: f64,
}

impl BatteryDischargeModel {
    pub fn new(nominal_voltage: f64) -> Self {
        Self {
            nominal_voltage,
            inner: Mutex::new(Inner {
                current_draw_a: IDLE_DRAW_A,
                watt_hours_consumed: 0.0,
            }),
        }
    }

    /// Set the instantaneous draw used by subsequent `discharge` calls.
    pub fn set_current_draw(&self, amps: f64) {
        self.inner.lock().unwrap().current_draw_a = amps.max(0.0);
    }

    pub fn current_draw(&self) -> f64 {
        self.inner.lock().unwrap().current_draw_a
    }

    /// Integrate the current draw over `dt_ms`.
    pub fn discharge(&self, dt_ms: f64) {
        let mut inner = self.inner.lock().unwrap();
        let power_w = self.nominal_voltage * inner.current_draw_a;
        inner.watt_hours_consumed += power_w * (dt_ms / 1000.0) / 3600.0;
    }

    pub fn watt_hours_consumed(&self) -> f64 {
        self.inner.lock().unwrap().watt_hours_consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discharge_accumulates_energy() {
        let bdm = BatteryDischargeModel::new(36.0);
        // 1 A idle draw at 36 V for one hour is 36 Wh.
        bdm.discharge(3_600_000.0);
        assert!((bdm.watt_hours_consumed() - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_draw_scales_energy() {
        let bdm = BatteryDischargeModel::new(36.0);
        bdm.set_current_draw(10.0);
        bdm.discharge(1000.0);
        let expected = 36.0 * 10.0 / 3600.0;
        assert!((bdm.watt_hours_consumed() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_monotone_across_any_sequence() {
        let bdm = BatteryDischargeModel::new(48.0);
        let mut last = bdm.watt_hours_consumed();
        for (draw, dt) in [(0.0, 20.0), (5.0, 20.0), (-3.0, 500.0), (120.0, 1.0)] {
            bdm.set_current_draw(draw);
            bdm.discharge(dt);
            let now = bdm.watt_hours_consumed();
            assert!(now >= last, "watt-hours decreased: {last} -> {now}");
            last = now;
        }
    }

    #[test]
    fn test_negative_draw_clamped() {
        let bdm = BatteryDischargeModel::new(36.0);
        bdm.set_current_draw(-42.0);
        assert_eq!(bdm.current_draw(), 0.0);
    }
}
