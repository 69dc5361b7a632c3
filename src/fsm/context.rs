//! Shared mutable context threaded through every supervisor handler.
//!
//! `SupervisorContext` is the single struct that state handlers read
//! from and write to.  It holds the latest connectivity observation,
//! the commands the application service must carry out, and retry
//! deadlines on the monotonic clock.  Think of it as the "blackboard" in a blackboard architecture.

use crate::config::SystemConfig;

// ---------------------------------------------------------------------------
// Link snapshot (read-only to state handlers; written by the app service)
// ---------------------------------------------------------------------------

/// Outcome of the most recent broker session attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAttempt {
    /// Connected and subscribed.
    Succeeded,
    /// Connect or subscribe failed.
    Failed,
}

/// Point-in-time view of the network stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkSnapshot {
    /// WiFi station associated and holding an address.
    pub link_up: bool,
    /// Broker session currently established.
    pub session_connected: bool,
    /// Result of a session attempt made since the last tick.  Consumed
    /// by the `SessionConnecting` handler.
    pub session_attempt: Option<SessionAttempt>,
}

// ---------------------------------------------------------------------------
// Supervisor commands (written by state handlers; consumed by the service)
// ---------------------------------------------------------------------------

/// Requests from the supervisor to the application service.
///
/// `reconnect_link`, `open_session` and `close_session` are one-shot:
/// the service clears them once acted upon.  `safe_zero` and
/// `accept_measurements` are levels that hold for the whole state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupervisorCommands {
    pub reconnect_link: bool,
    pub open_session: bool,
    pub close_session: bool,
    /// Demand must be held at zero.
    pub safe_zero: bool,
    /// Inbound measurements may drive the demand.
    pub accept_measurements: bool,
}

impl SupervisorCommands {
    /// Fail-safe defaults: zero output, ignore measurements.
    pub fn safe() -> Self {
        Self {
            safe_zero: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// SupervisorContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct SupervisorContext {
    // -- Timing --
    /// Monotonic time of the current tick (ms since boot).
    pub now_ms: u64,
    /// Time spent in the current state.
    pub ms_in_state: u64,

    // -- Observed --
    pub link: LinkSnapshot,

    // -- Outputs --
    pub commands: SupervisorCommands,

    // -- Retry timing --
    /// Delay between WiFi reconnect requests.
    pub link_retry_ms: u64,
    /// Delay after a failed session attempt.
    pub broker_retry_ms: u64,
    /// How long `SessionDown` must hold before the next attempt.
    pub session_hold_ms: u64,
    /// When the last WiFi reconnect was requested.
    pub last_link_request_ms: u64,
}

impl SupervisorContext {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            now_ms: 0,
            ms_in_state: 0,
            link: LinkSnapshot::default(),
            commands: SupervisorCommands::safe(),
            link_retry_ms: u64::from(config.link_retry_interval_ms),
            broker_retry_ms: u64::from(config.broker_retry_interval_ms),
            session_hold_ms: 0,
            last_link_request_ms: 0,
        }
    }

    /// Take the pending session attempt result, if any.
    pub fn take_attempt(&mut self) -> Option<SessionAttempt> {
        self.link.session_attempt.take()
    }

    /// Ask for a WiFi reconnect and note when.
    pub fn request_link(&mut self) {
        self.commands.reconnect_link = true;
        self.last_link_request_ms = self.now_ms;
    }
}
