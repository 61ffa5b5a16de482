use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;
use tracing::trace;

/// Default watermark at which inbound reading is suspended.
pub const DEFAULT_HIGH_WATERMARK: usize = 128 * 1024;

/// Default watermark at which inbound reading resumes.
pub const DEFAULT_LOW_WATERMARK: usize = 64 * 1024;

/// Connection-scoped accounting of currently buffered inbound bytes.
///
/// Every request stream on the connection increments the counter when a body
/// chunk is admitted into its pending buffer and decrements it when that chunk
/// is removed (consumed or discarded), so the counter tracks bytes *currently
/// buffered*, not bytes ever seen. The connection's read loop consults
/// [`is_suspended`](Self::is_suspended) before pulling more data off the
/// transport and parks on [`resumed`](Self::resumed) while the counter sits
/// above the high watermark.
///
/// Handles are cheap clones sharing one counter; the counter itself is atomic
/// because streams of other connections' tasks may share it in exotic setups,
/// even though a single connection only ever touches it from its own task.
#[derive(Debug, Clone)]
pub struct InboundTraffic {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    buffered: AtomicUsize,
    suspended: AtomicBool,
    high_watermark: usize,
    low_watermark: usize,
    resume: Notify,
}

impl InboundTraffic {
    /// Creates an accountant suspending reads at `high_watermark` buffered
    /// bytes and resuming them once drained to `low_watermark`.
    pub fn new(high_watermark: usize, low_watermark: usize) -> Self {
        debug_assert!(low_watermark <= high_watermark);
        Self {
            shared: Arc::new(Shared {
                buffered: AtomicUsize::new(0),
                suspended: AtomicBool::new(false),
                high_watermark,
                low_watermark,
                resume: Notify::new(),
            }),
        }
    }

    /// Records `len` bytes entering a stream's pending buffer.
    pub fn increment(&self, len: usize) {
        let buffered = self.shared.buffered.fetch_add(len, Ordering::AcqRel) + len;
        if buffered >= self.shared.high_watermark && !self.shared.suspended.swap(true, Ordering::AcqRel) {
            trace!(buffered, watermark = self.shared.high_watermark, "inbound traffic suspended");
        }
    }

    /// Records `len` bytes leaving a stream's pending buffer.
    pub fn decrement(&self, len: usize) {
        let mut current = self.shared.buffered.load(Ordering::Acquire);
        loop {
            let next = current.saturating_sub(len);
            match self.shared.buffered.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    current = next;
                    break;
                }
                Err(observed) => current = observed,
            }
        }

        if current <= self.shared.low_watermark && self.shared.suspended.swap(false, Ordering::AcqRel) {
            trace!(buffered = current, watermark = self.shared.low_watermark, "inbound traffic resumed");
            self.shared.resume.notify_waiters();
        }
    }

    /// Bytes currently buffered across all streams of the connection.
    pub fn buffered_bytes(&self) -> usize {
        self.shared.buffered.load(Ordering::Acquire)
    }

    /// Whether reads are currently suspended.
    pub fn is_suspended(&self) -> bool {
        self.shared.suspended.load(Ordering::Acquire)
    }

    /// Waits until reads are allowed again. Returns immediately when not
    /// suspended.
    pub async fn resumed(&self) {
        while self.is_suspended() {
            let notified = self.shared.resume.notified();
            if !self.is_suspended() {
                break;
            }
            notified.await;
        }
    }
}

impl Default for InboundTraffic {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_of_increments_and_decrements_cancel_out() {
        let traffic = InboundTraffic::default();

        traffic.increment(10);
        traffic.increment(20);
        traffic.increment(30);
        assert_eq!(traffic.buffered_bytes(), 60);

        traffic.decrement(20);
        assert_eq!(traffic.buffered_bytes(), 40);

        traffic.decrement(10);
        traffic.decrement(30);
        assert_eq!(traffic.buffered_bytes(), 0);
    }

    #[test]
    fn suspends_at_high_watermark_and_resumes_at_low() {
        let traffic = InboundTraffic::new(100, 50);

        traffic.increment(99);
        assert!(!traffic.is_suspended());

        traffic.increment(1);
        assert!(traffic.is_suspended());

        traffic.decrement(49);
        assert!(traffic.is_suspended());

        traffic.decrement(10);
        assert!(!traffic.is_suspended());
    }

    #[test]
    fn decrement_never_underflows() {
        let traffic = InboundTraffic::new(100, 50);
        traffic.increment(5);
        traffic.decrement(10);
        assert_eq!(traffic.buffered_bytes(), 0);
    }

    #[tokio::test]
    async fn resumed_returns_immediately_when_not_suspended() {
        let traffic = InboundTraffic::new(100, 50);
        traffic.resumed().await;

        traffic.increment(100);
        assert!(traffic.is_suspended());
        traffic.decrement(100);
        traffic.resumed().await;
    }
}
