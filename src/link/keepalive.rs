//! Fixed-cadence frame re-transmission.
//!
//! Tracks the next deadline on the monotonic clock and reports when the
//! current command frame is due again.  The cadence is independent of
//! measurement arrival: sending a fresh frame after a demand update does
//! not shift the next keepalive.  If the loop stalls past a whole
//! interval (a blocking broker connect), the frame goes out at once and
//! the cadence restarts from that point instead of bursting.

/// Keepalive scheduler, polled once per control tick.
#[derive(Debug, Clone)]
pub struct KeepaliveDriver {
    interval_ms: u64,
    next_due_ms: u64,
}

impl KeepaliveDriver {
    /// `interval_ms` is clamped to at least 1 ms.
    pub fn new(interval_ms: u32) -> Self {
        let interval_ms = u64::from(interval_ms.max(1));
        Self {
            interval_ms,
            next_due_ms: interval_ms,
        }
    }

    /// Anchor the cadence at `now_ms`.  The first frame is due one
    /// interval later.
    pub fn start(&mut self, now_ms: u64) {
        self.next_due_ms = now_ms + self.interval_ms;
    }

    /// Returns `true` when the frame must be re-sent.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_due_ms {
            return false;
        }
        self.next_due_ms += self.interval_ms;
        if self.next_due_ms <= now_ms {
            self.next_due_ms = now_ms + self.interval_ms;
        }
        true
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}
