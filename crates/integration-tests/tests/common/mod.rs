//! Common harness for simulator end-to-end tests.

use board::{shared_eks, EBoardParams, SharedEks};
use motor::MotorController;
use riding::{BatteryDischargeModel, FrictionModel, KinematicConfig, KinematicLoop, PushModel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use vesc::{
    memory_pair, CommandMessageProcessor, FirmwareVersion, HeartbeatWatchdog, MemoryTransport,
    Transport, COMMAND_BYTE_SIZE,
};

pub fn test_params() -> EBoardParams {
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

/// Kinematic settings with both disturbance processes pushed far beyond the
/// test window.
pub fn quiet_kinematics() -> KinematicConfig {
    KinematicConfig {
        fixed_step_ms: 20,
        push_period_sec: 3600.0,
        theta_slope_period_sec: 3600.0,
        slope_range_bound_deg: 10.0,
        initial_theta_slope_deg: 0.0,
    }
}

/// A fully assembled simulator talking over an in-memory serial pipe.
pub struct Simulator {
    pub client: MemoryTransport,
    pub eks: SharedEks,
    motor: MotorController,
    kinematic_stop: Arc<AtomicBool>,
    kinematic_handle: JoinHandle<()>,
    cmp_handle: JoinHandle<()>,
}

impl Simulator {
    pub fn start(firmware: FirmwareVersion, kinematics: KinematicConfig) -> Self {
        let params = test_params();
        let eks = shared_eks();
        let battery = Arc::new(BatteryDischargeModel::new(params.battery_nominal_voltage));
        let friction = FrictionModel::new(0.012, 0.9, &params);

        let mut motor = MotorController::new(
            params,
            Arc::clone(&eks),
            friction,
            Arc::clone(&battery),
            0.005,
        );

        let kinematic_loop = KinematicLoop::new(
            params,
            Arc::clone(&eks),
            friction,
            PushModel::new(&params),
            Arc::clone(&battery),
            kinematics,
        );

        let (client, server) = memory_pair();
        let cmp = CommandMessageProcessor::new(
            server,
            firmware,
            COMMAND_BYTE_SIZE,
            params,
            Arc::clone(&eks),
            battery,
            motor.handle(),
            HeartbeatWatchdog::with_action(Duration::from_secs(3600), || {}),
        );

        let cmp_handle = cmp.spawn();
        motor.start();
        let kinematic_stop = kinematic_loop.stop_handle();
        let kinematic_handle = kinematic_loop.spawn();

        Self {
            client,
            eks,
            motor,
            kinematic_stop,
            kinematic_handle,
            cmp_handle,
        }
    }

    /// Send a command frame and block for the reply payload (header
    /// stripped, header content asserted).
    pub fn request(&mut self, id: u8) -> Vec<u8> {
        self.send(id, &[]);
        self.read_reply(id)
    }

    /// Send a command frame carrying a big-endian i32 setpoint.
    pub fn send_setpoint(&mut self, id: u8, value: i32) {
        self.send(id, &value.to_be_bytes());
    }

    pub fn send(&mut self, id: u8, payload: &[u8]) {
        self.client
            .write_all(&client_frame(id, payload))
            .expect("client write");
    }

    fn read_reply(&mut self, request_id: u8) -> Vec<u8> {
        let mut start = [0u8; 1];
        self.client.read_exact(&mut start).expect("reply start byte");
        let (len, reply_id) = match start[0] {
            0x02 => {
                let mut rest = [0u8; 2];
                self.client.read_exact(&mut rest).expect("short header");
                (rest[0] as usize, rest[1])
            }
            0x03 => {
                let mut rest = [0u8; 3];
                self.client.read_exact(&mut rest).expect("long header");
                (u16::from_be_bytes([rest[0], rest[1]]) as usize, rest[2])
            }
            other => panic!("unexpected reply start byte {other:#04x}"),
        };
        // The bionic boarder summary is requested under 164 but answered
        // under 66; every other reply echoes the request ID.
        let expected_id = if request_id == 164 { 66 } else { request_id };
        assert_eq!(reply_id, expected_id, "reply ID mismatch");
        let mut payload = vec![0u8; len];
        self.client.read_exact(&mut payload).expect("reply payload");
        payload
    }

    pub fn shutdown(mut self) {
        drop(self.client);
        self.cmp_handle.join().expect("cmp thread");
        self.kinematic_stop.store(true, Ordering::Relaxed);
        self.kinematic_handle.join().expect("kinematic thread");
        self.motor.stop();
    }
}

/// Client-side command frame: `[0x02, len, id, payload, crc, crc, 0x03,
/// 0x00]` zero-padded to the fixed command size. The simulator never checks
/// the CRC.
pub fn client_frame(id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; COMMAND_BYTE_SIZE];
    frame[0] = 0x02;
    frame[1] = (payload.len() + 1) as u8;
    frame[2] = id;
    frame[3..3 + payload.len()].copy_from_slice(payload);
    let i = 3 + payload.len();
    frame[i] = 0x45;
    frame[i + 1] = 0x67;
    frame[i + 2] = 0x03;
    frame
}

pub fn get_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

pub fn get_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}
