//! # Bridge Error Handling
//!
//! Error taxonomy for the serial Modbus bridge. Four categories cover every
//! failure the bridge itself can produce:
//!
//! - **InvalidArgument**: bad capacity, timeout, address, register count or
//!   odd byte length. Always detected before the transport is touched and
//!   never worth retrying.
//! - **Timeout**: a deadline elapsed while assembling response bytes or
//!   awaiting a response frame. The transaction is aborted; no partial data
//!   is returned.
//! - **Io**: a transport write failed, or the protocol client reported a
//!   malformed or CRC-invalid response. The transaction is aborted.
//! - **OutOfMemory**: a per-call scratch allocation failed. Fatal to the
//!   specific call only.
//!
//! No retries are performed inside the bridge; retry policy, if any, belongs
//! to the caller. `is_recoverable()` tells a caller whether retrying could
//! plausibly succeed:
//!
//! ```rust
//! use modbus_bridge::BridgeError;
//!
//! let err = BridgeError::timeout("await response frame", 1000);
//! assert!(err.is_recoverable());
//!
//! let err = BridgeError::invalid_argument("register count 0");
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors produced by the bridge core
///
/// Each variant carries enough context to diagnose the failure without a
/// debugger: the offending argument, the operation that timed out, or the
/// transport/protocol fault as reported by the collaborator.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// Invalid argument detected during validation
    ///
    /// Raised for zero buffer capacities, timeout values that cannot be
    /// represented as a deadline, register counts outside 1..=125, address
    /// ranges past the end of the register space and odd byte counts.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Deadline exceeded
    ///
    /// The named operation did not complete within `timeout_ms`. Partially
    /// assembled bytes are discarded, never returned.
    #[error("timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Transport write failure or protocol-level fault from the client
    ///
    /// Covers serial port I/O errors as well as malformed frames and CRC
    /// mismatches reported by the protocol client.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Scratch allocation failure
    #[error("out of memory: {message}")]
    OutOfMemory { message: String },
}

impl BridgeError {
    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    /// Create a new out-of-memory error
    pub fn out_of_memory<S: Into<String>>(message: S) -> Self {
        Self::OutOfMemory { message: message.into() }
    }

    /// Check if the error is recoverable (can retry)
    ///
    /// Timeouts and I/O faults are transient conditions of the line or the
    /// remote device; validation failures and allocation failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io { .. })
    }

    /// Check if the error was produced before any transport access
    ///
    /// Validation failures never touch the wire, so the transport state is
    /// exactly what it was before the call.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Convert from std::io::Error
///
/// Preserves the original error message; serial port failures surface this
/// way through the transport layer.
impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}
