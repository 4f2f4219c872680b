//! Deadline-bounded exact-count byte assembly
//!
//! The protocol client consumes inbound serial bytes through an
//! [`ExactReader`]: it asks for exactly `n` bytes within a timeout and gets
//! either all of them or a `Timeout`. Bytes arrive asynchronously through
//! the ingress path, so the reader drains the fifo in a loop and parks on
//! the fifo's data notification between attempts instead of polling on a
//! fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::error::{BridgeError, BridgeResult};
use crate::fifo::ByteFifo;

/// Assembles exact byte counts from a [`ByteFifo`] under a deadline
///
/// Cheap to clone; each protocol client holds one over the device's rx
/// fifo. `read_exact` is the only suspending operation and is cancel-safe:
/// dropping the future mid-wait leaves the fifo indices consistent (bytes
/// already drained for the aborted attempt are gone, matching the
/// all-or-nothing discard on timeout).
#[derive(Clone)]
pub struct ExactReader {
    fifo: Arc<ByteFifo>,
}

impl ExactReader {
    /// Create a reader backed by the given fifo
    pub fn new(fifo: Arc<ByteFifo>) -> Self {
        Self { fifo }
    }

    /// Collect exactly `n` bytes within `timeout_ms` milliseconds
    ///
    /// The deadline is absolute, computed once up front; a `timeout_ms`
    /// that cannot be represented as a deadline fails with
    /// `InvalidArgument` before any waiting occurs. On success all `n`
    /// bytes are returned in arrival order. On timeout the partially
    /// accumulated bytes are discarded, not returned: the upstream framing
    /// is all-or-nothing, and a half frame is worthless to it.
    pub async fn read_exact(&self, n: usize, timeout_ms: u64) -> BridgeResult<Vec<u8>> {
        let deadline = Instant::now()
            .checked_add(Duration::from_millis(timeout_ms))
            .ok_or_else(|| {
                BridgeError::invalid_argument(format!(
                    "timeout {}ms overflows the deadline representation",
                    timeout_ms
                ))
            })?;

        let mut out: Vec<u8> = Vec::new();
        out.try_reserve_exact(n)
            .map_err(|_| BridgeError::out_of_memory(format!("{} byte response buffer", n)))?;
        out.resize(n, 0);

        let mut filled = 0usize;
        while filled < n {
            let got = self.fifo.read(&mut out[filled..]);
            filled += got;
            if filled == n {
                break;
            }

            if got == 0 {
                // Nothing buffered: park until the producer stores bytes or
                // the deadline expires.
                if timeout_at(deadline, self.fifo.wait_for_data()).await.is_err() {
                    return Err(BridgeError::timeout(
                        format!("read {} bytes (got {})", n, filled),
                        timeout_ms,
                    ));
                }
            } else if Instant::now() >= deadline {
                return Err(BridgeError::timeout(
                    format!("read {} bytes (got {})", n, filled),
                    timeout_ms,
                ));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn reader_with_fifo(capacity: usize) -> (ExactReader, Arc<ByteFifo>) {
        let fifo = Arc::new(ByteFifo::with_capacity(capacity).unwrap());
        (ExactReader::new(Arc::clone(&fifo)), fifo)
    }

    #[tokio::test]
    async fn test_read_exact_immediate() {
        let (reader, fifo) = reader_with_fifo(16);
        fifo.write(b"hello");

        let bytes = assert_ok!(reader.read_exact(5, 100).await);
        assert_eq!(bytes, b"hello");
        assert!(fifo.is_empty());
    }

    #[tokio::test]
    async fn test_zero_bytes_is_trivial() {
        let (reader, _fifo) = reader_with_fifo(16);
        let bytes = reader.read_exact(0, 10).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_honored_when_starved() {
        let (reader, _fifo) = reader_with_fifo(16);

        let started = Instant::now();
        let err = reader.read_exact(5, 100).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { timeout_ms: 100, .. }));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_met_by_late_bytes() {
        let (reader, fifo) = reader_with_fifo(16);

        let feeder = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fifo.write(b"ABCDE");
        });

        let bytes = assert_ok!(reader.read_exact(5, 100).await);
        assert_eq!(bytes, b"ABCDE");
        feeder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_bytes_trickle_in_across_waits() {
        let (reader, fifo) = reader_with_fifo(16);

        let feeder = tokio::spawn(async move {
            for chunk in [b"AB".as_slice(), b"CD", b"E"] {
                tokio::time::sleep(Duration::from_millis(10)).await;
                fifo.write(chunk);
            }
        });

        let bytes = reader.read_exact(5, 200).await.unwrap();
        assert_eq!(bytes, b"ABCDE");
        feeder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_bytes_discarded_on_timeout() {
        let (reader, fifo) = reader_with_fifo(16);
        fifo.write(b"ABC");

        let err = assert_err!(reader.read_exact(5, 50).await);
        assert!(matches!(err, BridgeError::Timeout { .. }));

        // The three buffered bytes were consumed and dropped with the
        // failed attempt; a later unrelated read does not see them.
        assert!(fifo.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_overflow_rejected() {
        let (reader, fifo) = reader_with_fifo(16);
        fifo.write(b"AB");

        let err = reader.read_exact(2, u64::MAX).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));
        // Rejected before waiting, and before consuming anything.
        assert_eq!(fifo.len(), 2);
    }
}
