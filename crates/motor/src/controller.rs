//! ERPM ramp and current-zero control tasks.

use crate::Signal;
use board::{EBoardParams, SharedEks};
use riding::{BatteryDischargeModel, FrictionModel, IDLE_DRAW_A};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

/// Estimated motor efficiency, applicable to any motor setup.
pub const MOTOR_EFFICIENCY: f64 = 0.90;
/// Estimated efficiency of the VESC controller itself.
pub const CONTROLLER_EFFICIENCY: f64 = 0.97;

#[derive(Debug, Error)]
pub enum MotorError {
    /// The current control scheme only disengages the motor; any setpoint
    /// other than exactly zero is a caller error.
    #[error("target current must be exactly 0.0, got {0}")]
    NonZeroTargetCurrent(f64),
}

struct Inner {
    params: EBoardParams,
    eks: SharedEks,
    friction: FrictionModel,
    battery: Arc<BatteryDischargeModel>,
    control_step_sec: f64,
    erpm_per_sec_max: f64,
    target_erpm: AtomicI32,
    zero_current: AtomicBool,
    erpm_signal: Signal,
    current_signal: Signal,
    stop: AtomicBool,
}

/// Cloneable setpoint interface handed to the command processor.
#[derive(Clone)]
pub struct MotorHandle {
    inner: Arc<Inner>,
}

impl MotorHandle {
    /// Store a new ERPM target and wake the ramp task.
    pub fn set_target_erpm(&self, erpm: i32) {
        self.inner.target_erpm.store(erpm, Ordering::SeqCst);
        self.inner.erpm_signal.release();
    }

    /// Request a current setpoint. Only exactly `0.0` is supported.
    pub fn set_target_current(&self, amps: f64) -> Result<(), MotorError> {
        if amps != 0.0 {
            return Err(MotorError::NonZeroTargetCurrent(amps));
        }
        self.inner.current_signal.release();
        Ok(())
    }
}

/// Owns the two control task threads.
///
/// While a ramp is in flight, every micro-step mutates the shared kinematic
/// state under its lock: ERPM slews by a fixed step, velocity follows the
/// drivetrain ratio, and motor/battery currents are derived from the torque
/// needed to hold speed against friction at the current wheel speed.
pub struct MotorController {
    inner: Arc<Inner>,
    handles: Vec<JoinHandle<()>>,
}

impl MotorController {
    pub fn new(
        params: EBoardParams,
        eks: SharedEks,
        friction: FrictionModel,
        battery: Arc<BatteryDischargeModel>,
        control_step_sec: f64,
    ) -> Self {
        // Maximum achievable ERPM slew for this board: peak motor torque
        // through the gearing to a wheel force, to linear acceleration, to
        // wheel angular acceleration, back up the gearing to motor RPM/s.
        let wheel_radius = params.wheel_radius_m();
        let torque_at_wheel = params.motor_max_torque_nm * params.gear_ratio;
        let force_at_wheel = torque_at_wheel / wheel_radius;
        let linear_accel = force_at_wheel / params.total_mass_kg;
        let wheel_accel_rad_per_sec2 = linear_accel / wheel_radius;
        let wheel_accel_rpm_per_sec = wheel_accel_rad_per_sec2 * 60.0 / (2.0 * PI);
        let motor_rpm_per_sec = wheel_accel_rpm_per_sec * params.gear_ratio;
        let erpm_per_sec_max = motor_rpm_per_sec * params.motor_pole_pairs as f64;

        Self {
            inner: Arc::new(Inner {
                params,
                eks,
                friction,
                battery,
                control_step_sec,
                erpm_per_sec_max,
                target_erpm: AtomicI32::new(0),
                zero_current: AtomicBool::new(false),
                erpm_signal: Signal::new(),
                current_signal: Signal::new(),
                stop: AtomicBool::new(false),
            }),
            handles: Vec::new(),
        }
    }

    pub fn handle(&self) -> MotorHandle {
        MotorHandle { inner: Arc::clone(&self.inner) }
    }

    pub fn erpm_per_sec_max(&self) -> f64 {
        self.inner.erpm_per_sec_max
    }

    /// Launch both control tasks. They block on their signals until the
    /// first setpoint arrives.
    pub fn start(&mut self) {
        let inner = Arc::clone(&self.inner);
        self.handles.push(
            std::thread::Builder::new()
                .name("motor-erpm".into())
                .spawn(move || erpm_control(inner))
                .expect("spawn ERPM control thread"),
        );
        let inner = Arc::clone(&self.inner);
        self.handles.push(
            std::thread::Builder::new()
                .name("motor-current".into())
                .spawn(move || current_control(inner))
                .expect("spawn current control thread"),
        );
    }

    /// Set the stop flag, unblock both tasks and join them.
    pub fn stop(&mut self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        self.inner.erpm_signal.unblock();
        self.inner.current_signal.unblock();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Spin on the monotonic clock for one control step. Sub-10 ms sleeps are
/// not dependable on a general-purpose OS, and the slew has to track
/// real time.
fn busy_wait(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::thread::yield_now();
    }
}

fn erpm_control(inner: Arc<Inner>) {
    let params = &inner.params;
    let step_duration = Duration::from_secs_f64(inner.control_step_sec);
    let control_step_ms = inner.control_step_sec * 1000.0;
    let kt = 60.0 / (2.0 * PI * params.motor_kv as f64);

    while !inner.stop.load(Ordering::SeqCst) {
        if !inner.erpm_signal.acquire() {
            break;
        }
        inner.zero_current.store(false, Ordering::SeqCst);

        let mut target = inner.target_erpm.load(Ordering::SeqCst);
        let (starting_erpm, mut prev_velocity) = {
            let eks = inner.eks.lock().unwrap();
            (eks.erpm, eks.velocity_mps)
        };
        if starting_erpm == target {
            continue;
        }
        info!(starting_erpm, target_erpm = target, "ERPM control activated");

        let mut step = (inner.erpm_per_sec_max * inner.control_step_sec).round() as i32;
        if step == 0 {
            step = 1;
        }
        if starting_erpm > target {
            step = -step;
        }
        let mut last_erpm = starting_erpm;

        while (step > 0) == (last_erpm < target) && !inner.stop.load(Ordering::SeqCst) {
            busy_wait(step_duration);

            let input_current;
            {
                let mut eks = inner.eks.lock().unwrap();
                eks.erpm += step;
                eks.velocity_mps = params.velocity_for_erpm(eks.erpm);

                let mechanical_rpm = eks.erpm as f64 / params.motor_pole_pairs as f64;
                let omega_motor = mechanical_rpm * 2.0 * PI / 60.0;
                let wheel_speed = (omega_motor / params.gear_ratio) * params.wheel_radius_m();

                // Torque required to hold speed against friction at the
                // current wheel speed, referred back to the motor shaft.
                let (a_friction, _) = inner.friction.decelerate(wheel_speed, control_step_ms);
                let resistive_force = a_friction * params.total_mass_kg;
                let wheel_torque = resistive_force * params.wheel_radius_m();
                let motor_torque = wheel_torque / params.gear_ratio;

                eks.motor_current_a = motor_torque / kt;
                let mechanical_power = motor_torque * omega_motor;
                eks.input_current_a = mechanical_power
                    / (params.battery_nominal_voltage * MOTOR_EFFICIENCY * CONTROLLER_EFFICIENCY);

                eks.acceleration_x_mps2 =
                    (eks.velocity_mps - prev_velocity) / inner.control_step_sec - a_friction;
                prev_velocity = eks.velocity_mps;
                input_current = eks.input_current_a;
            }
            inner.battery.set_current_draw(input_current);
            inner.battery.discharge(control_step_ms);

            last_erpm += step;

            // Mid-flight retarget: keep slewing, just re-resolve direction.
            let latest = inner.target_erpm.load(Ordering::SeqCst);
            if latest != target {
                target = latest;
                step = if last_erpm < target { step.abs() } else { -step.abs() };
            }

            if inner.zero_current.load(Ordering::SeqCst) {
                let mut eks = inner.eks.lock().unwrap();
                eks.motor_current_a = 0.0;
                eks.input_current_a = 0.0;
                drop(eks);
                inner.battery.set_current_draw(IDLE_DRAW_A);
                break;
            }
        }
        info!(target_erpm = target, last_erpm, "ERPM control deactivated");
    }
}

/// The only supported current setpoint is zero: disengage the motor so the
/// board coasts and the kinematic loop takes back over.
fn current_control(inner: Arc<Inner>) {
    while !inner.stop.load(Ordering::SeqCst) {
        if !inner.current_signal.acquire() {
            break;
        }
        inner.zero_current.store(true, Ordering::SeqCst);
        {
            let mut eks = inner.eks.lock().unwrap();
            eks.motor_current_a = 0.0;
            eks.input_current_a = 0.0;
        }
        inner.battery.set_current_draw(IDLE_DRAW_A);
        info!("current control set motor current to 0");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board::shared_eks;

    fn params() -> EBoardParams {
        EBoardParams {
            total_mass_kg: 90.0,
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

    fn build() -> (MotorController, SharedEks, Arc<BatteryDischargeModel>) {
        let p = params();
        let eks = shared_eks();
        let battery = Arc::new(BatteryDischargeModel::new(p.battery_nominal_voltage));
        let mc = MotorController::new(
            p,
            Arc::clone(&eks),
            FrictionModel::new(0.012, 0.9, &p),
            Arc::clone(&battery),
            0.005,
        );
        (mc, eks, battery)
    }

    #[test]
    fn test_erpm_per_sec_max_positive() {
        let (mc, _, _) = build();
        // 6 N·m × 2 gearing over 0.05 m wheels on 90 kg comes out in the
        // thousands of ERPM per second.
        assert!(mc.erpm_per_sec_max() > 1000.0);
    }

    #[test]
    fn test_ramp_up_then_down() {
        let (mut mc, eks, _) = build();
        let p = params();
        let handle = mc.handle();
        mc.start();

        handle.set_target_erpm(2000);
        std::thread::sleep(Duration::from_millis(700));
        {
            let state = eks.lock().unwrap();
            assert!(
                (state.erpm - 2000).abs() <= 100,
                "erpm after ramp up: {}",
                state.erpm
            );
            assert!(state.input_current_a > 0.0);
            assert!(state.motor_current_a > 0.0);
            // Velocity tracks ERPM through the drivetrain ratio.
            let expected = p.velocity_for_erpm(state.erpm);
            assert!((state.velocity_mps - expected).abs() < 1e-9);
        }

        handle.set_target_erpm(500);
        std::thread::sleep(Duration::from_millis(500));
        {
            let state = eks.lock().unwrap();
            assert!(
                (state.erpm - 500).abs() <= 100,
                "erpm after ramp down: {}",
                state.erpm
            );
        }
        mc.stop();
    }

    #[test]
    fn test_zero_current_disengages() {
        let (mut mc, eks, battery) = build();
        let handle = mc.handle();
        mc.start();

        handle.set_target_erpm(1500);
        std::thread::sleep(Duration::from_millis(500));
        assert!(eks.lock().unwrap().input_current_a > 0.0);

        handle.set_target_current(0.0).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        {
            let state = eks.lock().unwrap();
            assert_eq!(state.motor_current_a, 0.0);
            assert_eq!(state.input_current_a, 0.0);
        }
        assert_eq!(battery.current_draw(), IDLE_DRAW_A);
        mc.stop();
    }

    #[test]
    fn test_nonzero_target_current_rejected() {
        let (mc, _, _) = build();
        let err = mc.handle().set_target_current(3.2).unwrap_err();
        assert!(matches!(err, MotorError::NonZeroTargetCurrent(_)));
    }

    #[test]
    fn test_retarget_mid_flight() {
        let (mut mc, eks, _) = build();
        let handle = mc.handle();
        mc.start();

        handle.set_target_erpm(4000);
        std::thread::sleep(Duration::from_millis(100));
        // Reverse course before the first ramp completes.
        handle.set_target_erpm(200);
        std::thread::sleep(Duration::from_millis(700));
        {
            let state = eks.lock().unwrap();
            assert!(
                (state.erpm - 200).abs() <= 100,
                "erpm after retarget: {}",
                state.erpm
            );
        }
        mc.stop();
    }

    #[test]
    fn test_stop_joins_idle_tasks() {
        let (mut mc, _, _) = build();
        mc.start();
        std::thread::sleep(Duration::from_millis(50));
        mc.stop();
    }
}
