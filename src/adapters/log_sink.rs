//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! Lines are `TAG | key=value` so they can be grepped from a serial capture.

use log::{Level, log};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// Render one event as its log level and `TAG | ...` line.
pub fn format_event(event: &AppEvent) -> (Level, String) {
    match event {
        AppEvent::Started(state) => (Level::Info, format!("START | initial_state={:?}", state)),
        AppEvent::StateChanged { from, to } => {
            (Level::Info, format!("STATE | {:?} -> {:?}", from, to))
        }
        AppEvent::SafeZeroForced { previous_w } => {
            (Level::Warn, format!("SAFE  | demand {}W -> 0W", previous_w))
        }
        AppEvent::MeasurementApplied { import_w, demand_w } => (
            Level::Info,
            format!("MEAS  | import={}W demand={}W", import_w, demand_w),
        ),
        AppEvent::LinkWriteFailed(e) => (Level::Warn, format!("LINK  | {}", e)),
        AppEvent::WatchdogExpired { ms_since_feed } => (
            Level::Warn,
            format!("WDOG  | no measurement for {} ms, restarting", ms_since_feed),
        ),
        AppEvent::Status(s) => (
            Level::Info,
            format!(
                "STAT  | up={}s | state={:?} | demand={}W | import={} | rssi={} | \
                 tx={} tx_err={} | meas={} dropped={} | safe_zero={} | \
                 wifi_tries={} mqtt_tries={} mqtt_fail={}",
                s.uptime_ms / 1000,
                s.state,
                s.demand_w,
                s.last_import_w.map_or_else(|| "-".into(), |w| format!("{w}W")),
                s.wifi_rssi.map_or_else(|| "-".into(), |r| format!("{r}dBm")),
                s.stats.frames_sent,
                s.stats.write_errors,
                s.stats.measurements,
                s.stats.discarded,
                s.stats.safe_zero_events,
                s.stats.link_attempts,
                s.stats.session_attempts,
                s.stats.session_failures,
            ),
        ),
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let (level, line) = format_event(event);
        log!(level, "{}", line);
    }
}
