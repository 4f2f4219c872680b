//! # Serial Modbus Bridge
//!
//! The device object shared by every handle, the handles themselves, and
//! the ingress adapter the transport feeds.
//!
//! One [`SerialModbusBridge`] exists per physical serial line. It owns the
//! rx fifo, the installed protocol client and the transaction lock that
//! serializes all register exchanges on the line. Handles are cheap views
//! into the bridge: each carries only its own start address and is opened
//! and closed independently, any number of times.
//!
//! ## Wiring order
//!
//! ```rust,no_run
//! use modbus_bridge::{SerialModbusBridge, SerialConfig, RtuLink, ClientConfig};
//! # use modbus_bridge::{RegisterClient, ExactReader};
//! # fn build_rtu_client(
//! #     _link: RtuLink,
//! #     _reader: ExactReader,
//! #     _config: ClientConfig,
//! # ) -> Box<dyn RegisterClient> {
//! #     unimplemented!()
//! # }
//!
//! # async fn example() -> modbus_bridge::BridgeResult<()> {
//! let bridge = SerialModbusBridge::new()?;
//! let link = RtuLink::open(&SerialConfig::new("/dev/ttyUSB0", 115200), bridge.ingress())?;
//! let client = build_rtu_client(link, bridge.reader(), ClientConfig::default());
//! bridge.install_client_async(client).await;
//!
//! let mut handle = bridge.open();
//! handle.set_address(0x0100);
//! let raw = handle.read(8).await?; // four registers, raw wire bytes
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::RegisterClient;
use crate::error::{BridgeError, BridgeResult};
use crate::fifo::ByteFifo;
use crate::reader::ExactReader;
use crate::utils::OperationTimer;
use crate::{DEFAULT_RX_CAPACITY, MAX_REGISTERS_PER_TRANSACTION, REGISTER_ADDRESS_SPACE};

/// Snapshot of bridge activity counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub transactions: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub rx_bytes: u64,
    pub rx_bytes_dropped: u64,
}

#[derive(Default)]
struct StatsCells {
    transactions: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    rx_bytes: AtomicU64,
    rx_bytes_dropped: AtomicU64,
}

impl StatsCells {
    fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            transactions: self.transactions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_bytes_dropped: self.rx_bytes_dropped.load(Ordering::Relaxed),
        }
    }

    fn record_failure(&self, err: &BridgeError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if matches!(err, BridgeError::Timeout { .. }) {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }
}

struct BridgeShared {
    fifo: Arc<ByteFifo>,
    /// The transaction lock. Held for the full duration of one register
    /// exchange, including the client's internal response waits; the fifo
    /// lock is never taken while waiting on this one.
    client: tokio::sync::Mutex<Option<Box<dyn RegisterClient>>>,
    stats: Arc<StatsCells>,
}

/// Shared device state for one physical serial line
///
/// Created once at startup and kept for the process lifetime. Cloning is
/// cheap and yields another reference to the same device.
#[derive(Clone)]
pub struct SerialModbusBridge {
    shared: Arc<BridgeShared>,
}

impl SerialModbusBridge {
    /// Create a bridge with the default rx fifo capacity
    pub fn new() -> BridgeResult<Self> {
        Self::with_capacity(DEFAULT_RX_CAPACITY)
    }

    /// Create a bridge with an explicit rx fifo capacity
    pub fn with_capacity(rx_capacity: usize) -> BridgeResult<Self> {
        let fifo = Arc::new(ByteFifo::with_capacity(rx_capacity)?);
        Ok(Self {
            shared: Arc::new(BridgeShared {
                fifo,
                client: tokio::sync::Mutex::new(None),
                stats: Arc::new(StatsCells::default()),
            }),
        })
    }

    /// Install the protocol client, once at startup
    ///
    /// Transactions attempted before this call fail with an I/O error.
    pub fn install_client(&self, client: Box<dyn RegisterClient>) {
        *self.shared.client.blocking_lock() = Some(client);
    }

    /// Async variant of [`install_client`](Self::install_client) for use
    /// inside a runtime
    pub async fn install_client_async(&self, client: Box<dyn RegisterClient>) {
        *self.shared.client.lock().await = Some(client);
    }

    /// Ingress adapter for the transport's receive path
    pub fn ingress(&self) -> Ingress {
        Ingress {
            fifo: Arc::clone(&self.shared.fifo),
            stats: Arc::clone(&self.shared.stats),
        }
    }

    /// Deadline reader over this bridge's rx fifo, for the protocol client
    pub fn reader(&self) -> ExactReader {
        ExactReader::new(Arc::clone(&self.shared.fifo))
    }

    /// Open a handle with `start_address = 0`
    pub fn open(&self) -> Handle {
        debug!("open bridge handle");
        Handle {
            start_address: 0,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current activity counters
    pub fn stats(&self) -> BridgeStats {
        self.shared.stats.snapshot()
    }
}

/// Non-blocking entry point for freshly arrived transport bytes
///
/// Called by the transport collaborator whenever bytes arrive; completes in
/// time proportional to the byte count and never allocates beyond what the
/// fifo write requires. Overflow drops are counted and logged, never
/// surfaced as a failure: the producer must not be stalled by a slow
/// consumer.
#[derive(Clone)]
pub struct Ingress {
    fifo: Arc<ByteFifo>,
    stats: Arc<StatsCells>,
}

impl Ingress {
    /// Push received bytes into the rx fifo, returning the drop count
    pub fn on_bytes_received(&self, bytes: &[u8]) -> usize {
        let dropped = self.fifo.write(bytes);
        self.stats.rx_bytes.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.stats.rx_bytes_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
            warn!(received = bytes.len(), dropped, "rx fifo overflow, oldest bytes dropped");
        }
        dropped
    }
}

/// Independently-addressable view into the shared device
///
/// Tracks only its own register cursor; all transport state lives in the
/// bridge. Dropping the handle closes it, or call [`close`](Self::close)
/// to make the intent explicit. No state persists across opens.
pub struct Handle {
    start_address: u16,
    shared: Arc<BridgeShared>,
}

impl Handle {
    /// Move the register cursor
    ///
    /// Pure state update: no validation beyond the address width and no
    /// transport access. The address/count combination is checked at the
    /// point of use, when the register count is known.
    pub fn set_address(&mut self, addr: u16) {
        self.start_address = addr;
    }

    /// Current register cursor
    pub fn start_address(&self) -> u16 {
        self.start_address
    }

    /// Read `byte_count` bytes worth of holding registers at the cursor
    ///
    /// `byte_count` must be even (registers are whole 16-bit units) and
    /// describe 1..=125 registers fitting the address space. Returns the
    /// raw register bytes exactly as the protocol client produced them,
    /// two per register; endianness is the client's concern. Fails
    /// atomically: on any client error no bytes are returned.
    pub async fn read(&self, byte_count: usize) -> BridgeResult<Bytes> {
        let quantity = self.checked_quantity(byte_count)?;

        let timer = OperationTimer::start("read holding registers");
        self.shared.stats.transactions.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.shared.client.lock().await;
        let client = match guard.as_mut() {
            Some(client) => client,
            None => {
                let err = BridgeError::io("protocol client not installed");
                self.shared.stats.record_failure(&err);
                timer.stop_and_log(false);
                return Err(err);
            }
        };
        let result = client
            .read_holding_registers(self.start_address, quantity)
            .await;
        drop(guard);

        match result {
            Ok(data) if data.len() == byte_count => {
                debug!(
                    start_address = self.start_address,
                    quantity,
                    data = %hex::encode(&data),
                    "read transaction complete"
                );
                timer.stop_and_log(true);
                Ok(data)
            }
            Ok(data) => {
                let err = BridgeError::io(format!(
                    "client produced {} bytes for {} registers, expected {}",
                    data.len(),
                    quantity,
                    byte_count
                ));
                self.shared.stats.record_failure(&err);
                timer.stop_and_log(false);
                Err(err)
            }
            Err(client_err) => {
                let err = BridgeError::from(client_err);
                self.shared.stats.record_failure(&err);
                timer.stop_and_log(false);
                Err(err)
            }
        }
    }

    /// Write `payload` as holding registers at the cursor
    ///
    /// `payload.len()` obeys the same evenness and range rules as `read`.
    /// The whole payload is pushed in one transaction; on any client error
    /// nothing is reported as applied.
    pub async fn write(&self, payload: &[u8]) -> BridgeResult<()> {
        let quantity = self.checked_quantity(payload.len())?;

        let timer = OperationTimer::start("write holding registers");
        self.shared.stats.transactions.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.shared.client.lock().await;
        let client = match guard.as_mut() {
            Some(client) => client,
            None => {
                let err = BridgeError::io("protocol client not installed");
                self.shared.stats.record_failure(&err);
                timer.stop_and_log(false);
                return Err(err);
            }
        };
        let result = client
            .write_multiple_registers(self.start_address, quantity, payload)
            .await;
        drop(guard);

        match result {
            Ok(()) => {
                debug!(
                    start_address = self.start_address,
                    quantity,
                    data = %hex::encode(payload),
                    "write transaction complete"
                );
                timer.stop_and_log(true);
                Ok(())
            }
            Err(client_err) => {
                let err = BridgeError::from(client_err);
                self.shared.stats.record_failure(&err);
                timer.stop_and_log(false);
                Err(err)
            }
        }
    }

    /// Close the handle
    ///
    /// The bridge and its fifo persist; only this view goes away.
    pub fn close(self) {
        debug!(start_address = self.start_address, "close bridge handle");
    }

    /// Validate the cursor/count combination before touching the transport
    fn checked_quantity(&self, byte_count: usize) -> BridgeResult<u16> {
        if byte_count == 0 {
            return Err(BridgeError::invalid_argument("byte count must be > 0"));
        }
        if byte_count % 2 != 0 {
            return Err(BridgeError::invalid_argument(format!(
                "byte count {} is odd; registers are whole 16-bit units",
                byte_count
            )));
        }

        let quantity = byte_count / 2;
        if quantity > MAX_REGISTERS_PER_TRANSACTION as usize {
            return Err(BridgeError::invalid_argument(format!(
                "{} registers exceed the per-transaction limit of {}",
                quantity, MAX_REGISTERS_PER_TRANSACTION
            )));
        }
        if self.start_address as u32 + quantity as u32 > REGISTER_ADDRESS_SPACE {
            return Err(BridgeError::invalid_argument(format!(
                "range {}..{} exceeds the register address space",
                self.start_address,
                self.start_address as u32 + quantity as u32
            )));
        }

        Ok(quantity as u16)
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("start_address", &self.start_address)
            .finish()
    }
}
