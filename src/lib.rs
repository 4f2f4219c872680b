//! # Modbus Bridge - Serial-to-Modbus-RTU Bridge Library
//!
//! An async bridge between application code and Modbus RTU holding
//! registers over a shared serial line, built on Tokio.
//!
//! The bridge owns the serial line's receive path and hands out
//! lightweight handles. Each handle carries its own register cursor;
//! all handles funnel through one transaction lock so register
//! exchanges on the wire never interleave.
//!
//! ## Features
//!
//! - **Async throughout**: Tokio runtime, no blocking waits on the rx path
//! - **Lossy bounded rx fifo**: a slow consumer never stalls the serial line
//! - **Deadline-bounded reads**: exact-count byte assembly against an absolute deadline
//! - **Handle multiplexing**: any number of independent handles over one line
//! - **Atomic transactions**: a failed exchange returns no partial data
//! - **Built-in counters**: transactions, errors, timeouts, rx volume and drops
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modbus_bridge::{SerialModbusBridge, BridgeResult};
//!
//! #[tokio::main]
//! async fn main() -> BridgeResult<()> {
//!     let bridge = SerialModbusBridge::new()?;
//!     // ... open the serial link and install a protocol client ...
//!
//!     let mut handle = bridge.open();
//!     handle.set_address(0x0100);
//!
//!     // Read four holding registers as raw wire bytes.
//!     let raw = handle.read(8).await?;
//!     println!("registers: {}", hex::encode(&raw));
//!
//!     // Write two registers back.
//!     handle.write(&[0x12, 0x34, 0x56, 0x78]).await?;
//!
//!     handle.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  ┌─────────────┐
//! │  Handle #1  │  │  Handle #2  │   register cursors
//! └─────────────┘  └─────────────┘
//!        │                │
//! ┌───────────────────────────────┐
//! │       SerialModbusBridge      │   transaction lock, stats
//! └───────────────────────────────┘
//!        │                ▲
//! ┌──────────────┐  ┌──────────────┐
//! │RegisterClient│  │  ExactReader │   protocol client + deadline reads
//! └──────────────┘  └──────────────┘
//!        │                ▲
//! ┌──────────────┐  ┌──────────────┐
//! │ByteTransport │─►│   ByteFifo   │   serial tx / rx paths
//! └──────────────┘  └──────────────┘
//! ```

/// Core error types and result handling
pub mod error;

/// Lossy bounded fifo for the serial receive path
pub mod fifo;

/// Deadline-bounded exact-count byte assembly
pub mod reader;

/// Protocol client contract and configuration
pub mod client;

/// Serial transport layer and its contracts
pub mod transport;

/// The bridge device, its handles and the ingress adapter
pub mod bridge;

/// Utility functions and timing helpers
pub mod utils;

// Re-export main types for convenience
pub use error::{BridgeError, BridgeResult};
pub use fifo::ByteFifo;
pub use reader::ExactReader;
pub use client::{ClientConfig, ClientError, RegisterClient};
pub use transport::{ByteTransport, RtuLink, SerialConfig};
pub use bridge::{BridgeStats, Handle, Ingress, SerialModbusBridge};
pub use utils::OperationTimer;

/// Maximum number of registers in a single read or write transaction
pub const MAX_REGISTERS_PER_TRANSACTION: u16 = 125;

/// One past the highest addressable holding register
pub const REGISTER_ADDRESS_SPACE: u32 = 65536;

/// Default inter-byte timeout while assembling a response frame
pub const DEFAULT_BYTE_TIMEOUT_MS: u64 = 100;

/// Default timeout for a complete response frame
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 1000;

/// Default capacity of the serial receive fifo
pub const DEFAULT_RX_CAPACITY: usize = 256;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
