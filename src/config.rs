//! System configuration parameters
//!
//! All tunable parameters for the limiter.  Values are fixed at startup:
//! they come from NVS when a blob is stored, otherwise from the defaults
//! below (network settings may be baked in at build time through the
//! `WIFI_SSID`, `WIFI_PASS`, `MQTT_URL`, `MQTT_USER` and `MQTT_PASS`
//! environment variables).

use heapless::String;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, ConfigPort};

/// Network and broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// WiFi SSID (1–32 printable ASCII bytes).
    pub wifi_ssid: String<32>,
    /// WPA2 passphrase, empty for an open network.
    pub wifi_password: String<64>,
    /// Broker URL, e.g. `mqtt://192.168.1.10:1883`.
    pub broker_url: String<96>,
    pub broker_username: String<32>,
    pub broker_password: String<64>,
    /// MQTT client identifier.
    pub client_id: String<32>,
    /// The single topic carrying the grid-import reading (ASCII watts).
    pub measurement_topic: String<64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: bounded(option_env!("WIFI_SSID").unwrap_or("")),
            wifi_password: bounded(option_env!("WIFI_PASS").unwrap_or("")),
            broker_url: bounded(option_env!("MQTT_URL").unwrap_or("mqtt://192.168.1.10:1883")),
            broker_username: bounded(option_env!("MQTT_USER").unwrap_or("")),
            broker_password: bounded(option_env!("MQTT_PASS").unwrap_or("")),
            client_id: bounded("zeroexport"),
            measurement_topic: bounded("home/grid/import_w"),
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Demand control ---
    /// Upper bound on the commanded inverter output (W).
    pub max_output_w: u16,
    /// Import margin the controller steers towards (W).
    pub import_buffer_w: i32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Command frame re-transmission cadence (milliseconds)
    pub keepalive_interval_ms: u32,
    /// Delay between WiFi reconnect attempts (milliseconds)
    pub link_retry_interval_ms: u32,
    /// Delay between broker session attempts after a failure (milliseconds)
    pub broker_retry_interval_ms: u32,
    /// Restart if no measurement is processed for this long (seconds)
    pub watchdog_timeout_secs: u32,
    /// Status summary interval (seconds)
    pub status_interval_secs: u32,

    // --- RS485 ---
    /// Inverter link baud rate.
    pub serial_baud: u32,

    // --- Network ---
    pub network: NetworkConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Demand control
            max_output_w: 900,
            import_buffer_w: 30,

            // Timing
            control_loop_interval_ms: 50,     // 20 Hz
            keepalive_interval_ms: 500,       // 2 Hz
            link_retry_interval_ms: 500,
            broker_retry_interval_ms: 5_000,
            watchdog_timeout_secs: 60,
            status_interval_secs: 60,

            // RS485
            serial_baud: 4_800,

            network: NetworkConfig::default(),
        }
    }
}

impl SystemConfig {
    pub fn watchdog_timeout_ms(&self) -> u64 {
        u64::from(self.watchdog_timeout_secs) * 1000
    }

    pub fn status_interval_ms(&self) -> u64 {
        u64::from(self.status_interval_secs) * 1000
    }
}

/// Load the stored configuration, provisioning defaults on first boot.
///
/// An empty store gets the defaults written back so later boots read the
/// same values.  A corrupt or out-of-range blob is left in place and the
/// defaults are used for this boot only.
pub fn load_or_provision(store: &impl ConfigPort) -> SystemConfig {
    match store.load() {
        Ok(cfg) => cfg,
        Err(ConfigError::NotFound) => {
            let cfg = SystemConfig::default();
            match store.save(&cfg) {
                Ok(()) => info!("Config: first boot, defaults persisted"),
                Err(e) => warn!("Config: could not persist defaults ({})", e),
            }
            cfg
        }
        Err(e) => {
            warn!("Config: stored config unusable ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}

/// Copy as much of `s` as fits into a fixed-capacity string.
fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
