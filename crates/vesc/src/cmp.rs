//! Command/message processor: the protocol front-end.

use crate::codec::{self, get_i32};
use crate::fw::FirmwareMessage;
use crate::transport::{Transport, TransportError};
use crate::watchdog::HeartbeatWatchdog;
use crate::{fw600, fw602, Command, FirmwareVersion};
use board::{EBoardParams, SharedEks};
use motor::{MotorError, MotorHandle};
use riding::BatteryDischargeModel;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum CmpError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Motor(#[from] MotorError),
}

/// Owns the byte-stream transport and runs the read/dispatch loop.
///
/// Telemetry requests are answered from a snapshot of the kinematic state;
/// setpoints are forwarded to the motor controller through its signals.
/// A handler error is logged and the loop moves on to the next frame; only
/// a closed transport ends the loop.
pub struct CommandMessageProcessor<T: Transport> {
    transport: T,
    firmware: FirmwareVersion,
    command_byte_size: usize,
    params: EBoardParams,
    eks: SharedEks,
    battery: Arc<BatteryDischargeModel>,
    motor: MotorHandle,
    watchdog: HeartbeatWatchdog,
}

impl<T: Transport + 'static> CommandMessageProcessor<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: T,
        firmware: FirmwareVersion,
        command_byte_size: usize,
        params: EBoardParams,
        eks: SharedEks,
        battery: Arc<BatteryDischargeModel>,
        motor: MotorHandle,
        watchdog: HeartbeatWatchdog,
    ) -> Self {
        Self {
            transport,
            firmware,
            command_byte_size,
            params,
            eks,
            battery,
            motor,
            watchdog,
        }
    }

    /// Spawn the read/dispatch loop on its own OS thread.
    pub fn spawn(self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("vesc-cmp".into())
            .spawn(move || self.run())
            .expect("spawn VESC command processor thread")
    }

    /// Read frames until the transport closes.
    pub fn run(mut self) {
        info!(firmware = %self.firmware, "VESC command processor running");
        let mut frame = vec![0u8; self.command_byte_size];
        loop {
            if let Err(e) = self.transport.read_exact(&mut frame) {
                match e {
                    TransportError::Closed => {
                        info!("transport closed, command processor exiting");
                        break;
                    }
                    other => {
                        warn!(error = %other, "frame read failed");
                        continue;
                    }
                }
            }

            // Command ID sits at offset 2 of the client frame; any CRC the
            // client appended is accepted as-is.
            let id = frame[2];
            let Some(command) = self.firmware.command_for_id(id) else {
                warn!(command_id = id, "unknown command id");
                continue;
            };
            info!(command = ?command, "VESC received command");

            let result = match command {
                Command::Firmware => self.publish_firmware(),
                Command::State => self.publish_state(),
                Command::ImuState => self.publish_imu_state(),
                Command::McConfig => self.publish_mc_config(),
                Command::BionicBoarder => self.publish_bionic_boarder(),
                Command::Current => self.update_current(&frame),
                Command::Rpm => self.update_rpm(&frame),
                Command::Heartbeat => {
                    self.watchdog.feed();
                    Ok(())
                }
            };
            if let Err(e) = result {
                error!(command = ?command, error = %e, "command was not processed correctly");
            }
        }
    }

    fn write_reply(&mut self, command: Command, payload: &[u8]) -> Result<(), CmpError> {
        // The EKS lock is never held across this write.
        self.transport
            .write_all(&codec::frame_reply(command.reply_id(), payload))?;
        Ok(())
    }

    fn publish_firmware(&mut self) -> Result<(), CmpError> {
        let payload = FirmwareMessage::new(self.firmware).encode();
        self.write_reply(Command::Firmware, &payload)
    }

    /// Duty cycle the controller would be applying to spin at this ERPM.
    fn duty_cycle(&self, erpm: i32) -> f64 {
        let mechanical_rpm = erpm as f64 / self.params.motor_pole_pairs as f64;
        let no_load_rpm = self.params.motor_kv as f64 * self.params.battery_nominal_voltage;
        (mechanical_rpm / no_load_rpm).clamp(-0.95, 0.95)
    }

    fn publish_state(&mut self) -> Result<(), CmpError> {
        let snapshot = *self.eks.lock().unwrap();
        let watt_hours = self.battery.watt_hours_consumed();
        match self.firmware {
            FirmwareVersion::Fw6_00 => {
                let msg = fw600::StateMessage {
                    motor_current_a: snapshot.motor_current_a,
                    erpm: snapshot.erpm,
                    watt_hours,
                };
                info!(
                    erpm = msg.erpm,
                    motor_current = msg.motor_current_a,
                    watt_hours = msg.watt_hours,
                    "publishing state message"
                );
                self.write_reply(Command::State, &msg.encode())
            }
            FirmwareVersion::Fw6_02 => {
                let msg = fw602::StateMessage {
                    avg_motor_current_a: snapshot.motor_current_a,
                    avg_input_current_a: snapshot.input_current_a,
                    duty_cycle_now: self.duty_cycle(snapshot.erpm),
                    rpm: snapshot.erpm,
                    vin: self.params.battery_nominal_voltage,
                    watt_hours,
                    ..Default::default()
                };
                info!(
                    rpm = msg.rpm,
                    motor_current = msg.avg_motor_current_a,
                    input_current = msg.avg_input_current_a,
                    watt_hours = msg.watt_hours,
                    "publishing state message"
                );
                self.write_reply(Command::State, &msg.encode())
            }
        }
    }

    fn publish_imu_state(&mut self) -> Result<(), CmpError> {
        let snapshot = *self.eks.lock().unwrap();
        let msg = fw600::ImuStateMessage {
            rpy: [
                snapshot.roll_deg.to_radians(),
                snapshot.pitch_deg.to_radians(),
                snapshot.yaw_deg.to_radians(),
            ],
            acc: [
                snapshot.acceleration_x_mps2,
                snapshot.acceleration_y_mps2,
                snapshot.acceleration_z_mps2,
            ],
            ..Default::default()
        };
        info!(acc_x = msg.acc[0], pitch_rad = msg.rpy[1], "publishing IMU state message");
        self.write_reply(Command::ImuState, &msg.encode())
    }

    fn publish_bionic_boarder(&mut self) -> Result<(), CmpError> {
        let snapshot = *self.eks.lock().unwrap();
        let msg = fw602::BionicBoarderMessage {
            motor_current_a: snapshot.motor_current_a,
            duty_cycle: self.duty_cycle(snapshot.erpm),
            rpm: snapshot.erpm,
            acc: [
                snapshot.acceleration_x_mps2,
                snapshot.acceleration_y_mps2,
                snapshot.acceleration_z_mps2,
            ],
            rpy: [
                snapshot.roll_deg.to_radians(),
                snapshot.pitch_deg.to_radians(),
                snapshot.yaw_deg.to_radians(),
            ],
        };
        info!(
            rpm = msg.rpm,
            motor_current = msg.motor_current_a,
            acc_x = msg.acc[0],
            pitch_rad = msg.rpy[1],
            "publishing bionic boarder message"
        );
        self.write_reply(Command::BionicBoarder, &msg.encode())
    }

    fn publish_mc_config(&mut self) -> Result<(), CmpError> {
        let msg = fw602::MotorConfigMessage::from_params(&self.params);
        info!("publishing motor controller configuration message");
        self.write_reply(Command::McConfig, &msg.encode())
    }

    fn update_current(&mut self, frame: &[u8]) -> Result<(), CmpError> {
        let target_a = get_i32(frame, 3) as f64 / 1000.0;
        info!(motor_current = target_a, "processing set current command");
        self.motor.set_target_current(target_a)?;
        Ok(())
    }

    fn update_rpm(&mut self, frame: &[u8]) -> Result<(), CmpError> {
        let erpm = get_i32(frame, 3);
        info!(erpm, "processing set ERPM command");
        self.motor.set_target_erpm(erpm);
        Ok(())
    }
}
