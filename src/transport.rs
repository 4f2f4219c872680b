//! # Serial Transport Layer
//!
//! Outbound byte access to the shared serial line, plus the receive pump
//! that feeds inbound bytes into the bridge.
//!
//! Outbound and inbound paths are asymmetric by design: request frames are
//! written straight to the port (no buffering needed), while response bytes
//! arrive asynchronously and are handed to
//! [`Ingress::on_bytes_received`](crate::bridge::Ingress) from a dedicated
//! pump task, mirroring a receive-interrupt callback.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modbus_bridge::{SerialModbusBridge, SerialConfig, RtuLink};
//!
//! # fn example(bridge: &SerialModbusBridge) -> modbus_bridge::BridgeResult<()> {
//! let config = SerialConfig::new("/dev/ttyUSB0", 115200);
//! let link = RtuLink::open(&config, bridge.ingress())?;
//! // hand `link` to the protocol client as its ByteTransport
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_serial::SerialStream;
use tracing::{debug, error};

use crate::bridge::Ingress;
use crate::error::{BridgeError, BridgeResult};

/// Read chunk size for the receive pump; matches the largest RTU frame.
const RX_CHUNK_SIZE: usize = 256;

/// Raw outbound byte access consumed by the protocol client
///
/// Implementations must deliver the whole buffer or fail; a short write is
/// an error at this boundary because a partial request frame is
/// unrecoverable mid-transaction.
#[async_trait]
pub trait ByteTransport: Send {
    /// Write all of `bytes` to the line, returning the count written
    async fn write(&mut self, bytes: &[u8]) -> BridgeResult<usize>;
}

/// Serial port configuration
///
/// Defaults to 8 data bits, no parity, one stop bit; only the path and
/// baud rate are mandatory.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
}

impl SerialConfig {
    /// Create a configuration with 8N1 framing
    pub fn new(path: &str, baud_rate: u32) -> Self {
        Self {
            path: path.to_string(),
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::None,
        }
    }
}

/// Serial line bound to a bridge's ingress path
///
/// Opening the link splits the port: the write half backs
/// [`ByteTransport`], the read half is moved into a pump task that forwards
/// every received chunk to the ingress adapter until the port closes or the
/// link is shut down.
pub struct RtuLink {
    writer: WriteHalf<SerialStream>,
    pump: JoinHandle<()>,
}

impl RtuLink {
    /// Open the serial port and start the receive pump
    pub fn open(config: &SerialConfig, ingress: Ingress) -> BridgeResult<Self> {
        let builder = tokio_serial::new(&config.path, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity);

        let port = SerialStream::open(&builder).map_err(|e| {
            BridgeError::io(format!("failed to open serial port {}: {}", config.path, e))
        })?;
        debug!(path = %config.path, baud = config.baud_rate, "serial port opened");

        let (reader, writer) = tokio::io::split(port);
        let pump = tokio::spawn(Self::pump_loop(reader, ingress));

        Ok(Self { writer, pump })
    }

    async fn pump_loop(mut reader: ReadHalf<SerialStream>, ingress: Ingress) {
        let mut chunk = [0u8; RX_CHUNK_SIZE];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    debug!("serial port closed, stopping receive pump");
                    break;
                }
                Ok(n) => {
                    ingress.on_bytes_received(&chunk[..n]);
                }
                Err(e) => {
                    error!("serial read error, stopping receive pump: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the receive pump and shut the writer down
    ///
    /// Any transaction still waiting on response bytes observes the
    /// shutdown through its own deadline rather than a torn fifo.
    pub async fn close(mut self) -> BridgeResult<()> {
        self.pump.abort();
        self.writer
            .shutdown()
            .await
            .map_err(|e| BridgeError::io(format!("serial shutdown failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ByteTransport for RtuLink {
    async fn write(&mut self, bytes: &[u8]) -> BridgeResult<usize> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| BridgeError::io(format!("serial write failed: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| BridgeError::io(format!("serial flush failed: {}", e)))?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0", 115200);
        assert_eq!(config.path, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.data_bits, tokio_serial::DataBits::Eight);
        assert_eq!(config.parity, tokio_serial::Parity::None);
    }

    #[tokio::test]
    async fn test_open_missing_port_fails_with_io() {
        let bridge = crate::SerialModbusBridge::with_capacity(16).unwrap();

        let config = SerialConfig::new("/dev/does-not-exist-0", 9600);
        let result = RtuLink::open(&config, bridge.ingress());
        assert!(matches!(result, Err(BridgeError::Io { .. })));
    }
}
