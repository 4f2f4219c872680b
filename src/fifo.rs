/// Bounded byte ring buffer between the serial receive path and the
/// protocol client's response assembler
///
/// One producer (the ingress callback) and one consumer (the deadline
/// reader) share the fifo; the internal mutex makes both sides safe without
/// external synchronization. The fifo never blocks either side: when full,
/// the oldest byte is dropped to make room for the newest. Dropped bytes
/// are reported to the producer so the condition is observable.

use std::sync::Mutex;

use tokio::sync::Notify;

use crate::error::{BridgeError, BridgeResult};

struct FifoState {
    data: Box<[u8]>,
    write_index: usize,
    read_index: usize,
    count: usize,
}

/// Fixed-capacity circular byte store, lossy on overflow
///
/// Invariant: `count == (write_index - read_index) mod capacity` and
/// `count <= capacity` at all times. All operations are O(n) in the byte
/// count and never suspend; the mutex is the innermost lock in the crate
/// and is never held across an await point.
pub struct ByteFifo {
    state: Mutex<FifoState>,
    /// Wakes a reader parked in `wait_for_data` after bytes were stored.
    data_ready: Notify,
    capacity: usize,
}

impl ByteFifo {
    /// Create a fifo with the given capacity
    ///
    /// Fails with `InvalidArgument` for a zero capacity. Storage is zeroed
    /// and both indices start at the origin.
    pub fn with_capacity(capacity: usize) -> BridgeResult<Self> {
        if capacity == 0 {
            return Err(BridgeError::invalid_argument("fifo capacity must be > 0"));
        }

        Ok(Self {
            state: Mutex::new(FifoState {
                data: vec![0u8; capacity].into_boxed_slice(),
                write_index: 0,
                read_index: 0,
                count: 0,
            }),
            data_ready: Notify::new(),
            capacity,
        })
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently stored
    pub fn len(&self) -> usize {
        self.state.lock().expect("fifo lock poisoned").count
    }

    /// Whether the fifo holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots remaining before the next write starts dropping
    pub fn writable_space(&self) -> usize {
        let state = self.state.lock().expect("fifo lock poisoned");
        self.capacity - state.count
    }

    /// Append bytes, dropping the oldest stored bytes when full
    ///
    /// Returns the number of bytes that were dropped to make room (0 when
    /// everything fit). Never blocks and never allocates; safe to call from
    /// the transport's receive callback.
    pub fn write(&self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }

        let mut dropped = 0usize;
        {
            let mut state = self.state.lock().expect("fifo lock poisoned");
            for &byte in bytes {
                if state.count == self.capacity {
                    // Overwrite-on-full: advance the read side past the
                    // oldest byte before storing the new one.
                    state.read_index = (state.read_index + 1) % self.capacity;
                    state.count -= 1;
                    dropped += 1;
                }
                let write_index = state.write_index;
                state.data[write_index] = byte;
                state.write_index = (write_index + 1) % self.capacity;
                state.count += 1;
            }
        }

        // Wake the reader only after the lock is released.
        self.data_ready.notify_one();

        dropped
    }

    /// Remove up to `buf.len()` bytes in insertion order
    ///
    /// Stops early when the fifo drains; returns how many bytes were
    /// written into `buf`. Reading from an empty fifo returns 0, not an
    /// error.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut state = self.state.lock().expect("fifo lock poisoned");
        let n = buf.len().min(state.count);
        for slot in buf.iter_mut().take(n) {
            let read_index = state.read_index;
            *slot = state.data[read_index];
            state.read_index = (read_index + 1) % self.capacity;
            state.count -= 1;
        }
        n
    }

    /// Wait until the producer stores at least one byte
    ///
    /// The check the caller re-runs after waking is for readable data
    /// (`count > 0`), not writable space. A permit stored by a `write` that
    /// raced ahead of this call is consumed immediately, so no wakeup is
    /// lost. Cancel-safe: dropping the future leaves the fifo untouched.
    pub(crate) async fn wait_for_data(&self) {
        self.data_ready.notified().await;
    }
}

impl std::fmt::Debug for ByteFifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteFifo")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            ByteFifo::with_capacity(0),
            Err(BridgeError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_exact_round_trip() {
        let fifo = ByteFifo::with_capacity(8).unwrap();
        assert_eq!(fifo.write(b"ABCDEFGH"), 0);

        let mut buf = [0u8; 8];
        assert_eq!(fifo.read(&mut buf), 8);
        assert_eq!(&buf, b"ABCDEFGH");
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_lossy_overflow_drops_oldest() {
        let fifo = ByteFifo::with_capacity(4).unwrap();
        assert_eq!(fifo.write(b"ABCDE"), 1);

        let mut buf = [0u8; 4];
        assert_eq!(fifo.read(&mut buf), 4);
        assert_eq!(&buf, b"BCDE");
    }

    #[test]
    fn test_empty_read_is_not_an_error() {
        let fifo = ByteFifo::with_capacity(16).unwrap();
        let mut buf = [0u8; 10];
        assert_eq!(fifo.read(&mut buf), 0);
    }

    #[test]
    fn test_writable_space() {
        let fifo = ByteFifo::with_capacity(8).unwrap();
        assert_eq!(fifo.writable_space(), 8);
        fifo.write(b"abc");
        assert_eq!(fifo.writable_space(), 5);
        assert_eq!(fifo.len(), 3);

        let mut buf = [0u8; 2];
        fifo.read(&mut buf);
        assert_eq!(fifo.writable_space(), 7);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let fifo = ByteFifo::with_capacity(4).unwrap();
        let mut buf = [0u8; 4];

        fifo.write(b"AB");
        assert_eq!(fifo.read(&mut buf[..2]), 2);
        // Indices now sit mid-buffer; the next write wraps.
        fifo.write(b"CDEF");
        assert_eq!(fifo.read(&mut buf), 4);
        assert_eq!(&buf, b"CDEF");
    }

    #[test]
    fn test_short_read_stops_at_available() {
        let fifo = ByteFifo::with_capacity(8).unwrap();
        fifo.write(b"xyz");

        let mut buf = [0u8; 8];
        assert_eq!(fifo.read(&mut buf), 3);
        assert_eq!(&buf[..3], b"xyz");
    }

    #[test]
    fn test_single_producer_single_consumer() {
        use std::sync::Arc;

        let fifo = Arc::new(ByteFifo::with_capacity(64).unwrap());
        let producer_fifo = Arc::clone(&fifo);

        let producer = std::thread::spawn(move || {
            let mut dropped = 0;
            for chunk in 0u8..200 {
                dropped += producer_fifo.write(&[chunk]);
            }
            dropped
        });

        let mut received = Vec::new();
        let mut buf = [0u8; 16];
        while received.len() < 200 {
            let n = fifo.read(&mut buf);
            if n == 0 {
                if producer.is_finished() && fifo.is_empty() {
                    break;
                }
                std::thread::yield_now();
                continue;
            }
            received.extend_from_slice(&buf[..n]);
        }
        let dropped = producer.join().unwrap();

        // Whatever survived must be an in-order subsequence of the input.
        assert_eq!(received.len() + dropped, 200);
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }
}
