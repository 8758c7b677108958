//! Acquisition workers and the state they share.
//!
//! One session runs at most three workers concurrently: the discovery probe
//! (on its own, outside collections), the handshake sender, and the ingest
//! listener. The latter two coordinate through [`AcquisitionShared`]: the
//! listener appends to the buffer and flips the acknowledgment flag on the
//! first valid record, which silences the handshake sender within one resend
//! interval.

pub mod buffer;
pub mod discovery;
pub mod handshake;
pub mod listener;

pub use buffer::CsiBuffer;
pub use discovery::{DiscoveryOutcome, DiscoveryProbe};

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// State shared between the ingest listener, the handshake sender, and the
/// session supervisor.
///
/// Workers only read flags or flip them through the methods here; state
/// machine transitions stay with the controller.
pub struct AcquisitionShared {
    /// Arrival-ordered raw records, drained once at commit time.
    pub buffer: CsiBuffer,
    acknowledged: AtomicBool,
    collecting: AtomicBool,
    ack_notify: Notify,
}

impl AcquisitionShared {
    pub fn new() -> Self {
        Self {
            buffer: CsiBuffer::new(),
            acknowledged: AtomicBool::new(false),
            collecting: AtomicBool::new(true),
            ack_notify: Notify::new(),
        }
    }

    /// Records the arrival of the first valid record.
    ///
    /// Idempotent: returns `true` only for the call that actually flipped the
    /// flag. That call also wakes the supervisor waiting in
    /// [`acknowledged_signal`](Self::acknowledged_signal).
    pub fn acknowledge(&self) -> bool {
        let first = self
            .acknowledged
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.ack_notify.notify_waiters();
        }
        first
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::Acquire)
    }

    /// Resolves once the acknowledgment flag has been set.
    pub async fn acknowledged_signal(&self) {
        let notified = self.ack_notify.notified();
        if self.is_acknowledged() {
            return;
        }
        notified.await;
    }

    /// True until shutdown has been requested. Receive errors observed after
    /// this flips are expected and swallowed by the listener.
    pub fn is_collecting(&self) -> bool {
        self.collecting.load(Ordering::Acquire)
    }

    pub fn end_collecting(&self) {
        self.collecting.store(false, Ordering::Release);
    }
}

impl Default for AcquisitionShared {
    fn default() -> Self {
        Self::new()
    }
}
