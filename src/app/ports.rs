//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (WiFi, broker client, RS485 link, event sinks, storage)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! ## Blocking
//!
//! - [`NetworkPort::connect`] only *initiates* association; completion is
//!   observed through [`NetworkPort::is_connected`] on later ticks.
//! - [`BrokerPort::connect`] may block for a bounded time (a few seconds)
//!   while the broker handshake completes.  Everything else must return
//!   promptly.

use crate::config::SystemConfig;
use crate::error::{BrokerError, ConnectivityError, LinkError};
use crate::link::CommandFrame;

/// Largest measurement payload kept; longer payloads are truncated.
pub const MAX_PAYLOAD: usize = 32;

/// One inbound message body from the measurement topic.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// Copy `bytes` into a [`Payload`], truncating at [`MAX_PAYLOAD`].
pub fn payload_from(bytes: &[u8]) -> Payload {
    let take = bytes.len().min(MAX_PAYLOAD);
    let mut p = Payload::new();
    // Cannot fail: `take` never exceeds capacity.
    let _ = p.extend_from_slice(&bytes[..take]);
    p
}

// ───────────────────────────────────────────────────────────────
// Network port (WiFi station)
// ───────────────────────────────────────────────────────────────

pub trait NetworkPort {
    /// Start (or restart) association with the configured AP.
    fn connect(&mut self) -> Result<(), ConnectivityError>;

    fn disconnect(&mut self);

    /// Associated and holding an IP address.
    fn is_connected(&self) -> bool;

    /// Signal strength in dBm when connected.
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Broker port (MQTT session)
// ───────────────────────────────────────────────────────────────

pub trait BrokerPort {
    /// Establish a session.  May block up to the adapter's connect timeout.
    fn connect(&mut self) -> Result<(), BrokerError>;

    /// Subscribe to `topic`.  Must be repeated after every reconnect.
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Tear down the session and drop queued messages.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Next queued message on the subscribed topic, oldest first.
    fn poll_message(&mut self) -> Option<Payload>;
}

// ───────────────────────────────────────────────────────────────
// Serial port (RS485 inverter link)
// ───────────────────────────────────────────────────────────────

pub trait SerialPort {
    /// Transmit one frame completely, with the driver enabled only for
    /// the duration of the transmission.
    fn write_frame(&mut self, frame: &CommandFrame) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Restart port
// ───────────────────────────────────────────────────────────────

/// Unconditional device restart, requested on liveness expiry.
pub trait RestartPort {
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ConfigError::NotFound`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
