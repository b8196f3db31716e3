//! Byte-stream transport owned by the command processor.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer is gone; the read loop should shut down.
    #[error("transport closed")]
    Closed,
    #[error("serial port error: {0}")]
    Serial(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocking byte-stream transport. The serial port and the in-memory test
/// pipe are equivalent at this layer, as is BLE UART framing.
pub trait Transport: Send {
    /// Fill `buf` completely, blocking as long as it takes.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;
    /// Write the whole frame.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError>;
}

/// Serial port configured as 8-N-1 at the given baud rate.
pub struct SerialTransport {
    port: Box<dyn tokio_serial::SerialPort>,
}

impl SerialTransport {
    /// Open the port in native blocking mode. The short port timeout only
    /// paces the retry loop inside [`Transport::read_exact`]; liveness is
    /// the heartbeat watchdog's job.
    pub fn open(com_port: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = tokio_serial::new(com_port, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .timeout(Duration::from_millis(500))
            .open()
            .map_err(|e| TransportError::Serial(e.to_string()))?;
        info!(com_port, baud_rate, "serial port open");
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(buf)?;
        Ok(())
    }
}

/// One end of an in-memory duplex byte pipe.
///
/// Stands in for the serial port in tests and development, the way a
/// simulated bus replaces real hardware elsewhere in the stack.
pub struct MemoryTransport {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

/// Create a connected pair of in-memory transports.
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let (tx_a, rx_b) = mpsc::channel();
    let (tx_b, rx_a) = mpsc::channel();
    (
        MemoryTransport { tx: tx_a, rx: rx_a, pending: VecDeque::new() },
        MemoryTransport { tx: tx_b, rx: rx_b, pending: VecDeque::new() },
    )
}

impl Transport for MemoryTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        for slot in buf.iter_mut() {
            while self.pending.is_empty() {
                let chunk = self.rx.recv().map_err(|_| TransportError::Closed)?;
                self.pending.extend(chunk);
            }
            *slot = self.pending.pop_front().unwrap();
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.tx.send(buf.to_vec()).map_err(|_| TransportError::Closed)
    }
}

impl MemoryTransport {
    /// Non-blocking probe used by tests to drain replies that may not have
    /// arrived yet.
    pub fn try_read_available(&mut self) -> Vec<u8> {
        while let Ok(chunk) = self.rx.try_recv() {
            self.pending.extend(chunk);
        }
        self.pending.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pair_round_trip() {
        let (mut a, mut b) = memory_pair();
        a.write_all(&[1, 2, 3, 4]).unwrap();
        a.write_all(&[5, 6]).unwrap();

        // Reads may straddle write boundaries.
        let mut buf = [0u8; 3];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        let mut buf = [0u8; 3];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [4, 5, 6]);
    }

    #[test]
    fn test_memory_read_blocks_until_write() {
        let (mut a, mut b) = memory_pair();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 2];
            b.read_exact(&mut buf).unwrap();
            buf
        });
        std::thread::sleep(Duration::from_millis(50));
        a.write_all(&[9, 8]).unwrap();
        assert_eq!(handle.join().unwrap(), [9, 8]);
    }

    #[test]
    fn test_memory_closed_peer_errors() {
        let (a, mut b) = memory_pair();
        drop(a);
        let mut buf = [0u8; 1];
        assert!(matches!(b.read_exact(&mut buf), Err(TransportError::Closed)));
        assert!(matches!(b.write_all(&[0]), Err(TransportError::Closed)));
    }
}
