//! boardsimd — e-board VESC simulator daemon.
//!
//! Presents a VESC-family motor controller on a serial port while a 1-D
//! kinematic model keeps the reported telemetry self-consistent with the
//! commands received.

mod config;

use anyhow::{Context, Result};
use board::{shared_eks, MissionClock};
use clap::Parser;
use config::SimConfig;
use motor::MotorController;
use recording::StateRecorder;
use riding::{BatteryDischargeModel, FrictionModel, KinematicConfig, KinematicLoop, PushModel};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use vesc::{
    CommandMessageProcessor, FirmwareVersion, HeartbeatWatchdog, SerialTransport,
    COMMAND_BYTE_SIZE,
};

#[derive(Parser)]
#[command(name = "boardsimd", about = "E-board VESC simulator daemon")]
struct Args {
    /// Path to the simulation TOML configuration file
    config: PathBuf,

    /// Record kinematic state snapshots to a binary file
    #[arg(long)]
    record: bool,

    /// Mirror console logging into a timestamped log file
    #[arg(long)]
    log: bool,
}

fn init_logging(to_file: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("boardsimd=info".parse().unwrap());
    if to_file {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let appender = tracing_appender::rolling::never(".", format!("boardsim_{timestamp}.log"));
        let (file_writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file_writer.and(std::io::stdout))
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log);

    let config = SimConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let firmware: FirmwareVersion = config
        .vesc
        .firmware
        .parse()
        .expect("firmware validated at load");
    let params = config.board;

    info!(
        com_port = %config.serial.com_port,
        baud_rate = config.serial.baud_rate,
        firmware = %firmware,
        "starting boardsimd"
    );

    let clock = MissionClock::start();
    let eks = shared_eks();
    let battery = Arc::new(BatteryDischargeModel::new(params.battery_nominal_voltage));
    let friction = FrictionModel::new(config.friction.mu_rolling, config.friction.c_drag, &params);

    let mut motor_controller = MotorController::new(
        params,
        Arc::clone(&eks),
        friction,
        Arc::clone(&battery),
        config.motor.control_time_step_sec,
    );

    let kinematic_loop = KinematicLoop::new(
        params,
        Arc::clone(&eks),
        friction,
        PushModel::new(&params),
        Arc::clone(&battery),
        KinematicConfig {
            fixed_step_ms: config.kinematics.fixed_time_step_ms,
            push_period_sec: config.kinematics.push_period_sec,
            theta_slope_period_sec: config.kinematics.theta_slope_period_sec,
            slope_range_bound_deg: config.kinematics.slope_range_bound_deg,
            initial_theta_slope_deg: config.kinematics.initial_theta_slope_deg,
        },
    );

    let transport = SerialTransport::open(&config.serial.com_port, config.serial.baud_rate)
        .context("opening serial port")?;
    let watchdog =
        HeartbeatWatchdog::new(Duration::from_secs_f64(config.vesc.heartbeat_timeout_sec));
    let cmp = CommandMessageProcessor::new(
        transport,
        firmware,
        COMMAND_BYTE_SIZE,
        params,
        Arc::clone(&eks),
        Arc::clone(&battery),
        motor_controller.handle(),
        watchdog,
    );

    let cmp_handle = cmp.spawn();
    motor_controller.start();
    let kinematic_stop = kinematic_loop.stop_handle();
    let kinematic_handle = kinematic_loop.spawn();

    let recorder = if args.record {
        let recorder = StateRecorder::new(
            Arc::clone(&eks),
            clock,
            config.recording_period_ms(),
            ".",
        );
        let stop = recorder.stop_handle();
        let handle = recorder.spawn().context("starting state recorder")?;
        Some((stop, handle))
    } else {
        None
    };

    info!("VESC CMP, motor controller, and kinematic loop threads are running");

    // The daemon lives as long as the transport; a heartbeat timeout exits
    // the process directly from the watchdog.
    cmp_handle.join().expect("command processor thread panicked");

    if let Some((stop, handle)) = recorder {
        stop.store(true, Ordering::Relaxed);
        handle.join().expect("state recorder thread panicked");
    }
    kinematic_stop.store(true, Ordering::Relaxed);
    kinematic_handle.join().expect("kinematic loop thread panicked");
    motor_controller.stop();
    info!("simulation stopped");
    Ok(())
}
