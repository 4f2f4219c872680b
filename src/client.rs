//! Protocol client collaborator contract
//!
//! The Modbus RTU codec (request framing, CRC-16, response parsing) lives
//! outside this crate. The bridge talks to it through [`RegisterClient`]:
//! two register operations exchanging raw big-endian register bytes, two
//! bytes per register. A client implementation writes its request frames
//! directly to a [`ByteTransport`](crate::transport::ByteTransport) and
//! assembles response frames through an
//! [`ExactReader`](crate::reader::ExactReader) using the timeouts in
//! [`ClientConfig`].

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DEFAULT_BYTE_TIMEOUT_MS, DEFAULT_RESPONSE_TIMEOUT_MS};

/// Timeouts for the protocol client, set once at startup
///
/// `byte_timeout_ms` bounds the gap between consecutive response bytes;
/// `response_timeout_ms` bounds the whole response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub byte_timeout_ms: u64,
    pub response_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            byte_timeout_ms: DEFAULT_BYTE_TIMEOUT_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
        }
    }
}

/// Failures reported by a protocol client
///
/// The bridge maps these onto its own taxonomy when a transaction aborts:
/// `ResponseTimeout` becomes a bridge `Timeout`, everything else an I/O
/// error. The distinction matters to callers deciding whether the remote
/// device is slow or the line is corrupt.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// No complete response frame arrived within the response timeout
    #[error("response timeout after {timeout_ms}ms")]
    ResponseTimeout { timeout_ms: u64 },

    /// Response frame failed its checksum
    #[error("CRC mismatch: expected {expected:#06X}, actual {actual:#06X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Response frame structure was invalid
    #[error("malformed frame: {message}")]
    MalformedFrame { message: String },

    /// The underlying transport write failed
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl ClientError {
    pub fn malformed_frame<S: Into<String>>(message: S) -> Self {
        Self::MalformedFrame { message: message.into() }
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport { message: message.into() }
    }
}

/// Map a client failure onto the bridge taxonomy
///
/// Response timeouts stay timeouts; CRC, framing and transport faults all
/// abort the transaction as I/O errors.
impl From<ClientError> for crate::error::BridgeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::ResponseTimeout { timeout_ms } => {
                Self::timeout("await response frame", timeout_ms)
            }
            other => Self::io(other.to_string()),
        }
    }
}

/// Register-transaction interface implemented by the protocol client
///
/// One complete request/response exchange per call. Register values cross
/// this boundary as raw bytes (`2 * quantity`, wire order); the client owns
/// all endianness and framing concerns.
#[async_trait]
pub trait RegisterClient: Send {
    /// Read `quantity` holding registers starting at `start_address`
    ///
    /// Returns exactly `2 * quantity` bytes on success.
    async fn read_holding_registers(
        &mut self,
        start_address: u16,
        quantity: u16,
    ) -> Result<Bytes, ClientError>;

    /// Write `quantity` registers starting at `start_address`
    ///
    /// `data` carries `2 * quantity` bytes. Completes once the device's
    /// acknowledgement frame was received and validated.
    async fn write_multiple_registers(
        &mut self,
        start_address: u16,
        quantity: u16,
        data: &[u8],
    ) -> Result<(), ClientError>;
}
