//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder).

use crate::fsm::SupervisorState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started (carries initial state).
    Started(SupervisorState),

    /// The connectivity supervisor transitioned between states.
    StateChanged {
        from: SupervisorState,
        to: SupervisorState,
    },

    /// A non-zero demand was dropped to zero on connectivity loss.
    SafeZeroForced { previous_w: u16 },

    /// A measurement was parsed and folded into the demand.
    MeasurementApplied { import_w: i32, demand_w: u16 },

    /// A command frame could not be written to the inverter link.
    LinkWriteFailed(crate::error::LinkError),

    /// No measurement within the liveness timeout; restart follows.
    WatchdogExpired { ms_since_feed: u64 },

    /// Periodic status summary.
    Status(StatusReport),
}

/// Link counters, reset only by restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames handed to the serial port successfully.
    pub frames_sent: u32,
    /// Frames the serial port rejected.
    pub write_errors: u32,
    /// Measurements folded into the demand.
    pub measurements: u32,
    /// Messages received outside `SessionConnected` and discarded.
    pub discarded: u32,
    /// Times a non-zero demand was forced to zero.
    pub safe_zero_events: u32,
    /// WiFi reconnect requests issued.
    pub link_attempts: u32,
    /// Broker session attempts made.
    pub session_attempts: u32,
    /// Broker session attempts that failed.
    pub session_failures: u32,
}

/// A point-in-time status snapshot suitable for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub state: SupervisorState,
    pub demand_w: u16,
    pub last_import_w: Option<i32>,
    pub wifi_rssi: Option<i8>,
    /// Monotonic time of the last tick.
    pub uptime_ms: u64,
    pub stats: LinkStats,
}
