//! Simulator configuration: TOML file, validated at startup.

use board::EBoardParams;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    pub board: EBoardParams,
    pub serial: SerialConfig,
    pub kinematics: KinematicsConfig,
    pub friction: FrictionConfig,
    pub motor: MotorConfig,
    pub vesc: VescConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialConfig {
    /// Serial device of the attached FTDI/BLE bridge, e.g. "/dev/ttyUSB0"
    pub com_port: String,
    /// Baud rate, e.g. 115200 or 230400
    pub baud_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KinematicsConfig {
    #[serde(default = "default_fixed_step_ms")]
    pub fixed_time_step_ms: u64,
    pub push_period_sec: f64,
    pub theta_slope_period_sec: f64,
    pub slope_range_bound_deg: f64,
    #[serde(default)]
    pub initial_theta_slope_deg: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrictionConfig {
    /// Coefficient of rolling friction
    pub mu_rolling: f64,
    /// Coefficient of aerodynamic drag
    pub c_drag: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotorConfig {
    #[serde(default = "default_control_step_sec")]
    pub control_time_step_sec: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VescConfig {
    /// Firmware message family, "6.00" or "6.02"
    pub firmware: String,
    #[serde(default = "default_heartbeat_timeout_sec")]
    pub heartbeat_timeout_sec: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingConfig {
    /// Snapshot period; defaults to twice the kinematic step
    pub period_ms: Option<u64>,
}

fn default_fixed_step_ms() -> u64 {
    20
}

fn default_control_step_sec() -> f64 {
    0.02
}

fn default_heartbeat_timeout_sec() -> f64 {
    vesc::HEARTBEAT_TIMEOUT_SEC
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: SimConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn recording_period_ms(&self) -> u64 {
        self.recording
            .period_ms
            .unwrap_or(self.kinematics.fixed_time_step_ms * 2)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.board;
        let positive = [
            (b.total_mass_kg, "board.total_mass_kg"),
            (b.frontal_area_m2, "board.frontal_area_m2"),
            (b.wheel_diameter_m, "board.wheel_diameter_m"),
            (b.battery_capacity_ah, "board.battery_capacity_ah"),
            (b.battery_nominal_voltage, "board.battery_nominal_voltage"),
            (b.gear_ratio, "board.gear_ratio"),
            (b.motor_max_torque_nm, "board.motor_max_torque_nm"),
            (b.motor_max_amps, "board.motor_max_amps"),
            (b.motor_max_power_w, "board.motor_max_power_w"),
            (self.friction.mu_rolling, "friction.mu_rolling"),
            (self.friction.c_drag, "friction.c_drag"),
            (self.motor.control_time_step_sec, "motor.control_time_step_sec"),
            (self.vesc.heartbeat_timeout_sec, "vesc.heartbeat_timeout_sec"),
            (self.kinematics.push_period_sec, "kinematics.push_period_sec"),
            (
                self.kinematics.theta_slope_period_sec,
                "kinematics.theta_slope_period_sec",
            ),
        ];
        for (value, name) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be > 0, got {value}")));
            }
        }
        // K_t = 60/(2π·kv) is undefined for kv = 0.
        if b.motor_kv == 0 {
            return Err(ConfigError::Invalid("board.motor_kv must be >= 1".into()));
        }
        if b.motor_pole_pairs == 0 {
            return Err(ConfigError::Invalid("board.motor_pole_pairs must be >= 1".into()));
        }
        if self.kinematics.fixed_time_step_ms == 0 {
            return Err(ConfigError::Invalid(
                "kinematics.fixed_time_step_ms must be >= 1".into(),
            ));
        }
        if !(0.0..=90.0).contains(&self.kinematics.slope_range_bound_deg) {
            return Err(ConfigError::Invalid(format!(
                "kinematics.slope_range_bound_deg must be within [0, 90], got {}",
                self.kinematics.slope_range_bound_deg
            )));
        }
        if self.kinematics.initial_theta_slope_deg.abs() > 90.0 {
            return Err(ConfigError::Invalid(format!(
                "kinematics.initial_theta_slope_deg must be within [-90, 90], got {}",
                self.kinematics.initial_theta_slope_deg
            )));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("serial.baud_rate must be > 0".into()));
        }
        if self.vesc.firmware.parse::<vesc::FirmwareVersion>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "vesc.firmware must be \"6.00\" or \"6.02\", got {:?}",
                self.vesc.firmware
            )));
        }
        if let Some(period) = self.recording.period_ms {
            if period == 0 {
                return Err(ConfigError::Invalid("recording.period_ms must be >= 1".into()));
            }
        }
        Ok(())
    }
}
