//! Unified error types for the limiter firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the boot path's error handling uniform.  All variants are `Copy` so
//! they can be passed through the supervisor and logged without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The WiFi station could not be configured or connected.
    Network(ConnectivityError),
    /// The broker session could not be established.
    Broker(BrokerError),
    /// The RS485 link to the inverter failed.
    Link(LinkError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Broker(e) => write!(f, "broker: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Network (WiFi) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    DriverFailed,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::DriverFailed => write!(f, "WiFi driver error"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Broker (MQTT) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// Client could not be created (bad URL, out of memory).
    ClientInit,
    /// Broker refused or did not answer within the connect timeout.
    ConnectFailed,
    /// Subscription request could not be queued.
    SubscribeFailed,
    /// Operation requires an established session.
    NotConnected,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientInit => write!(f, "MQTT client init failed"),
            Self::ConnectFailed => write!(f, "MQTT connect failed"),
            Self::SubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::NotConnected => write!(f, "MQTT session not connected"),
        }
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

// ---------------------------------------------------------------------------
// RS485 link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// UART driver rejected the write.
    WriteFailed,
    /// Fewer bytes than a full frame were queued.
    ShortWrite { written: usize },
    /// Transmit FIFO did not drain in time.
    TxTimeout,
    /// Driver-enable GPIO could not be toggled.
    DriverEnable,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "UART write failed"),
            Self::ShortWrite { written } => write!(f, "short UART write ({written} bytes)"),
            Self::TxTimeout => write!(f, "UART TX drain timeout"),
            Self::DriverEnable => write!(f, "RS485 DE pin error"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}
