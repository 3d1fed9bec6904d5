use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request counter. A response is applied only when the call that
/// produced it is still the most recently started one.
#[derive(Debug, Default)]
pub struct RequestSeq(AtomicU64);

impl RequestSeq {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Starts a call and returns its ticket.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_latest(&self, ticket: u64) -> bool {
        self.0.load(Ordering::SeqCst) == ticket
    }
}
