//! Fixed-step kinematic loop.

use crate::{BatteryDischargeModel, FrictionModel, PushModel, GRAVITY_MPS2};
use board::{EBoardParams, SharedEks};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Timing and disturbance settings for the kinematic loop.
#[derive(Debug, Clone, Copy)]
pub struct KinematicConfig {
    /// Fixed integration step in milliseconds
    pub fixed_step_ms: u64,
    /// Seconds between stochastic rider pushes
    pub push_period_sec: f64,
    /// Seconds between slope toggles
    pub theta_slope_period_sec: f64,
    /// Uniform bound for sampled slope angles in degrees
    pub slope_range_bound_deg: f64,
    /// Slope angle the ride starts on, in degrees
    pub initial_theta_slope_deg: f64,
}

impl Default for KinematicConfig {
    fn default() -> Self {
        Self {
            fixed_step_ms: 20,
            push_period_sec: 10.0,
            theta_slope_period_sec: 30.0,
            slope_range_bound_deg: 10.0,
            initial_theta_slope_deg: 0.0,
        }
    }
}

/// Advances the shared kinematic state when the motor is idle.
///
/// Each tick applies friction/drag, gravity along the current slope and any
/// active push, then re-derives ERPM from velocity. While the motor drives
/// (`input_current_a > 0`) the tick is a no-op so the motor controller's
/// writes are never contested.
pub struct KinematicLoop {
    params: EBoardParams,
    eks: SharedEks,
    friction: FrictionModel,
    push: PushModel,
    battery: Arc<BatteryDischargeModel>,
    config: KinematicConfig,
    stop: Arc<AtomicBool>,
}

impl KinematicLoop {
    pub fn new(
        params: EBoardParams,
        eks: SharedEks,
        friction: FrictionModel,
        push: PushModel,
        battery: Arc<BatteryDischargeModel>,
        config: KinematicConfig,
    ) -> Self {
        Self {
            params,
            eks,
            friction,
            push,
            battery,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that makes the loop exit at the end of its current tick.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Spawn the loop on its own OS thread.
    pub fn spawn(self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("kinematic-loop".into())
            .spawn(move || self.run())
            .expect("spawn kinematic loop thread")
    }

    /// Run the loop until the stop flag is set.
    pub fn run(mut self) {
        let step = Duration::from_millis(self.config.fixed_step_ms);
        let step_sec = self.config.fixed_step_ms as f64 / 1000.0;
        let step_ms = self.config.fixed_step_ms as f64;
        let mut rng = rand::thread_rng();

        let mut slope_deg = self.config.initial_theta_slope_deg;
        let mut slope_elapsed_sec = 0.0;
        let mut push_elapsed_sec = 0.0;

        self.eks.lock().unwrap().pitch_deg = slope_deg;
        info!(
            fixed_step_ms = self.config.fixed_step_ms,
            initial_slope_deg = slope_deg,
            "kinematic loop running"
        );

        while !self.stop.load(Ordering::Relaxed) {
            // Motor engaged: physics is frozen for this step.
            let driving = self.eks.lock().unwrap().input_current_a > 0.0;
            if driving {
                std::thread::sleep(step);
                continue;
            }
            let tick_start = Instant::now();

            if slope_elapsed_sec >= self.config.theta_slope_period_sec {
                slope_deg = if slope_deg == 0.0 {
                    rng.gen_range(
                        -self.config.slope_range_bound_deg..=self.config.slope_range_bound_deg,
                    )
                } else {
                    0.0
                };
                slope_elapsed_sec = 0.0;
                self.eks.lock().unwrap().pitch_deg = slope_deg;
                debug!(slope_deg, "slope toggled");
            }
            slope_elapsed_sec += step_sec;

            if push_elapsed_sec >= self.config.push_period_sec {
                if !self.push.is_active() {
                    let force_1g_n = self.params.total_mass_kg * GRAVITY_MPS2;
                    let force_n = rng.gen_range(force_1g_n..=2.0 * force_1g_n);
                    let duration_ms = rng.gen_range(400..=600) as f64;
                    self.push.setup(force_n, duration_ms);
                    debug!(force_n, duration_ms, "push armed");
                }
                push_elapsed_sec = 0.0;
            }
            push_elapsed_sec += step_sec;

            {
                let mut eks = self.eks.lock().unwrap();

                // Friction always opposes the direction of travel and never
                // flips the velocity sign on its own.
                let (a_friction, dv_friction) = self.friction.decelerate(eks.velocity_mps, step_ms);
                if eks.velocity_mps < 0.0 {
                    eks.velocity_mps = (eks.velocity_mps + dv_friction).min(0.0);
                    eks.acceleration_x_mps2 = a_friction;
                } else {
                    eks.velocity_mps = (eks.velocity_mps - dv_friction).max(0.0);
                    eks.acceleration_x_mps2 = -a_friction;
                }

                // Gravity along the slope: uphill slope bleeds speed, downhill
                // slope feeds it (and can roll the board backwards).
                let a_gravity = GRAVITY_MPS2 * slope_deg.abs().to_radians().sin();
                let dv_gravity = a_gravity * step_sec;
                if slope_deg >= 0.0 {
                    eks.velocity_mps -= dv_gravity;
                    eks.acceleration_x_mps2 -= a_gravity;
                } else {
                    eks.velocity_mps += dv_gravity;
                    eks.acceleration_x_mps2 += a_gravity;
                }

                if self.push.is_active() {
                    let (a_push, dv_push) = self.push.step(step_ms);
                    eks.acceleration_x_mps2 += a_push;
                    eks.velocity_mps += dv_push;
                }

                eks.erpm = self.params.erpm_for_velocity(eks.velocity_mps);
            }

            self.battery.discharge(step_ms);

            // Sleep out the remainder of the fixed step; a tick that overran
            // goes straight into the next one.
            let elapsed = tick_start.elapsed();
            if elapsed < step {
                std::thread::sleep(step - elapsed);
            }
        }
        info!("kinematic loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board::shared_eks;

    fn params() -> EBoardParams {
        EBoardParams {
            total_mass_kg: 80.0,
            frontal_area_m2: 0.5,
            wheel_diameter_m: 0.1,
            battery_capacity_ah: 12.0,
            battery_nominal_voltage: 36.0,
            gear_ratio: 2.0,
            motor_kv: 190,
            motor_max_torque_nm: 6.0,
            motor_max_amps: 60.0,
            motor_max_power_w: 1500.0,
            motor_pole_pairs: 7,
        }
    }

    fn quiet_config() -> KinematicConfig {
        // Disturbance periods far beyond the test window.
        KinematicConfig {
            fixed_step_ms: 20,
            push_period_sec: 3600.0,
            theta_slope_period_sec: 3600.0,
            slope_range_bound_deg: 10.0,
            initial_theta_slope_deg: 0.0,
        }
    }

    fn build(config: KinematicConfig) -> (KinematicLoop, SharedEks) {
        let p = params();
        let eks = shared_eks();
        let battery = Arc::new(BatteryDischargeModel::new(p.battery_nominal_voltage));
        let kl = KinematicLoop::new(
            p,
            Arc::clone(&eks),
            FrictionModel::new(0.012, 0.9, &p),
            PushModel::new(&p),
            battery,
            config,
        );
        (kl, eks)
    }

    #[test]
    fn test_at_rest_stays_at_rest_on_flat_ground() {
        let (kl, eks) = build(quiet_config());
        let stop = kl.stop_handle();
        let handle = kl.spawn();
        std::thread::sleep(Duration::from_millis(300));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
        let state = eks.lock().unwrap();
        assert_eq!(state.velocity_mps, 0.0);
        assert_eq!(state.erpm, 0);
    }

    #[test]
    fn test_coasting_decelerates_and_keeps_erpm_coherent() {
        let (kl, eks) = build(quiet_config());
        let p = params();
        eks.lock().unwrap().velocity_mps = 8.0;
        let stop = kl.stop_handle();
        let handle = kl.spawn();
        std::thread::sleep(Duration::from_millis(400));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        let state = eks.lock().unwrap();
        assert!(state.velocity_mps < 8.0);
        assert!(state.velocity_mps > 0.0);
        assert!(state.acceleration_x_mps2 < 0.0);
        // ERPM and velocity stay proportional within one ERPM unit.
        let expected = p.erpm_for_velocity(state.velocity_mps);
        assert!((state.erpm - expected).abs() <= 1);
    }

    #[test]
    fn test_motor_engaged_freezes_physics() {
        let (kl, eks) = build(quiet_config());
        {
            let mut state = eks.lock().unwrap();
            state.velocity_mps = 5.0;
            state.erpm = 13_000;
            state.input_current_a = 2.5;
        }
        let stop = kl.stop_handle();
        let handle = kl.spawn();
        std::thread::sleep(Duration::from_secs(1));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        let state = eks.lock().unwrap();
        assert_eq!(state.velocity_mps, 5.0);
        assert_eq!(state.erpm, 13_000);
    }

    #[test]
    fn test_uphill_start_rolls_board_backwards() {
        let mut config = quiet_config();
        config.initial_theta_slope_deg = 5.0;
        let (kl, eks) = build(config);
        let stop = kl.stop_handle();
        let handle = kl.spawn();
        std::thread::sleep(Duration::from_millis(200));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        let state = eks.lock().unwrap();
        assert!(state.velocity_mps < 0.0, "velocity {}", state.velocity_mps);
        assert!(state.erpm < 0, "erpm {}", state.erpm);
        assert_eq!(state.pitch_deg, 5.0);
    }

    #[test]
    fn test_battery_discharges_while_coasting() {
        let (kl, eks) = build(quiet_config());
        let battery = Arc::clone(&kl.battery);
        let stop = kl.stop_handle();
        let handle = kl.spawn();
        std::thread::sleep(Duration::from_millis(300));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
        drop(eks);
        assert!(battery.watt_hours_consumed() > 0.0);
    }
}
