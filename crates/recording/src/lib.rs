//! Binary recording of the simulated kinematic state.
//!
//! An optional background thread snapshots the shared kinematic state at a
//! fixed cadence and appends fixed-size little-endian records to a
//! timestamped file for offline analysis:
//!
//! `[t_mission f64][velocity f32][acc_x f32][acc_y f32][acc_z f32]`
//! `[pitch f32][roll f32][yaw f32][erpm i32][motor_current f32]`
//!
//! 44 bytes per record, attitude in degrees as held in the state.

use board::{MissionClock, SharedEks};
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Size of one serialized record in bytes.
pub const RECORD_SIZE: usize = 44;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Periodic recorder of kinematic state snapshots.
pub struct StateRecorder {
    eks: SharedEks,
    clock: MissionClock,
    period: Duration,
    path: PathBuf,
    stop: Arc<AtomicBool>,
}

impl StateRecorder {
    /// Recorder writing to `sim_data_recording_<timestamp>.bin` in the
    /// given directory.
    pub fn new(
        eks: SharedEks,
        clock: MissionClock,
        recording_period_ms: u64,
        directory: impl Into<PathBuf>,
    ) -> Self {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = directory
            .into()
            .join(format!("sim_data_recording_{timestamp}.bin"));
        Self {
            eks,
            clock,
            period: Duration::from_millis(recording_period_ms),
            path,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Spawn the recording thread. The file is created immediately so an
    /// unwritable destination fails fast.
    pub fn spawn(self) -> Result<JoinHandle<()>, RecordingError> {
        let file = File::create(&self.path)?;
        info!(path = %self.path.display(), period_ms = self.period.as_millis() as u64, "recording kinematic state");
        let handle = std::thread::Builder::new()
            .name("state-recorder".into())
            .spawn(move || self.run(file))
            .expect("spawn state recorder thread");
        Ok(handle)
    }

    fn run(self, file: File) {
        let mut writer = BufWriter::new(file);
        loop {
            let record = {
                let eks = self.eks.lock().unwrap();
                encode_record(self.clock.elapsed_sec(), &eks)
            };
            if let Err(e) = writer.write_all(&record) {
                error!(error = %e, "recording write failed, recorder exiting");
                return;
            }
            if self.stop.load(Ordering::Relaxed) {
                if let Err(e) = writer.flush() {
                    error!(error = %e, "recording flush failed");
                }
                info!(path = %self.path.display(), "recording stopped");
                return;
            }
            std::thread::sleep(self.period);
        }
    }
}

fn encode_record(t_mission_sec: f64, eks: &board::EboardKinematicState) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..8].copy_from_slice(&t_mission_sec.to_le_bytes());
    let floats = [
        eks.velocity_mps,
        eks.acceleration_x_mps2,
        eks.acceleration_y_mps2,
        eks.acceleration_z_mps2,
        eks.pitch_deg,
        eks.roll_deg,
        eks.yaw_deg,
    ];
    for (i, value) in floats.iter().enumerate() {
        let off = 8 + i * 4;
        buf[off..off + 4].copy_from_slice(&(*value as f32).to_le_bytes());
    }
    buf[36..40].copy_from_slice(&eks.erpm.to_le_bytes());
    buf[40..44].copy_from_slice(&(eks.motor_current_a as f32).to_le_bytes());
    buf
}
