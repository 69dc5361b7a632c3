//! Measurement liveness watchdog.
//!
//! Measures time on the monotonic clock since the last processed
//! measurement.  Once the configured timeout has fully elapsed the device
//! must restart: a stalled network stack, a silent broker and a dead
//! meter all look the same from here, and a reboot recovers each of them.
//!
//! The timer runs from boot, so a device that never receives a single
//! reading also restarts.  Safe-zero does not pause it, and neither does
//! time spent blocked inside a reconnect attempt.

pub struct LivenessWatchdog {
    timeout_ms: u64,
    last_feed_ms: u64,
}

impl LivenessWatchdog {
    /// `timeout_ms` is clamped to at least 1 ms.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms: timeout_ms.max(1),
            last_feed_ms: 0,
        }
    }

    /// Start the countdown at boot.
    pub fn start(&mut self, now_ms: u64) {
        self.last_feed_ms = now_ms;
    }

    /// Record a processed measurement.
    pub fn feed(&mut self, now_ms: u64) {
        self.last_feed_ms = now_ms;
    }

    /// `true` once the timeout has elapsed without a feed.  Stays `true`
    /// until fed.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.ms_since_feed(now_ms) >= self.timeout_ms
    }

    pub fn ms_since_feed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_feed_ms)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}
