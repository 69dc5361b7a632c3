//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`] — the hexagonal boundary for the network
//! link.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! The adapter never retries on its own.  `connect()` only starts
//! association; the supervisor calls it again at a fixed interval while
//! the link stays down.  No backoff.  A retry that lands while an earlier
//! association or DHCP lease is still in flight is a quiet no-op.

use log::{debug, info, warn};

use crate::app::ports::NetworkPort;
use crate::config::NetworkConfig;
use crate::error::ConnectivityError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(ConnectivityError::InvalidSsid);
    }
    if !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    /// Simulation: link state and AP reachability.
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_ap_reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
    /// Simulation: association takes until `sim_finish_association`.
    #[cfg(not(target_os = "espidf"))]
    sim_slow_association: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_associating: bool,
}

impl WifiAdapter {
    /// Configure and start the STA interface.  Association begins on the
    /// first [`NetworkPort::connect`].
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        config: &NetworkConfig,
    ) -> Result<Self, ConnectivityError> {
        let ssid = config.wifi_ssid.as_str();
        let password = config.wifi_password.as_str();
        if ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        validate_ssid(ssid)?;
        validate_password(password)?;

        let mut wifi = EspWifi::new(modem, sysloop, Some(nvs)).map_err(|e| {
            warn!("WiFi: driver init failed: {}", e);
            ConnectivityError::DriverFailed
        })?;

        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: password.try_into().map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::Client(client))
            .map_err(|_| ConnectivityError::DriverFailed)?;
        wifi.start().map_err(|_| ConnectivityError::DriverFailed)?;
        info!("WiFi: STA started for '{}'", ssid);

        Ok(Self {
            ssid: config.wifi_ssid.clone(),
            wifi,
        })
    }

    /// Simulation adapter.  The AP is reachable until told otherwise.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(config: &NetworkConfig) -> Result<Self, ConnectivityError> {
        let ssid = config.wifi_ssid.as_str();
        if !ssid.is_empty() {
            validate_ssid(ssid)?;
        }
        validate_password(config.wifi_password.as_str())?;
        Ok(Self {
            ssid: config.wifi_ssid.clone(),
            sim_link_up: false,
            sim_ap_reachable: true,
            sim_connect_counter: 0,
            sim_slow_association: false,
            sim_associating: false,
        })
    }

    /// Simulation: make the AP (un)reachable.  Dropping reachability
    /// also drops an established link.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_ap_reachable(&mut self, reachable: bool) {
        self.sim_ap_reachable = reachable;
        if !reachable && self.sim_link_up {
            warn!("WiFi(sim): link lost");
            self.sim_link_up = false;
        }
    }

    /// Simulation: leave the link down after `connect()` until
    /// [`sim_finish_association`](Self::sim_finish_association).
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_slow_association(&mut self, slow: bool) {
        self.sim_slow_association = slow;
    }

    /// Simulation: complete a pending association.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_finish_association(&mut self) {
        if self.sim_associating {
            self.sim_associating = false;
            self.sim_link_up = self.sim_ap_reachable;
        }
    }

    /// Simulation: number of association attempts so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect_attempts(&self) -> u32 {
        self.sim_connect_counter
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        match self.wifi.connect() {
            Ok(()) => Ok(()),
            // The driver is still mid-association from the previous request.
            Err(e) if e.code() == esp_idf_svc::sys::ESP_ERR_WIFI_STATE => {
                debug!("WiFi: association already in progress");
                Ok(())
            }
            Err(e) => {
                warn!("WiFi: connect request rejected: {}", e);
                Err(ConnectivityError::ConnectionFailed)
            }
        }
    }

    /// Associated with the AP but the interface is not up yet (DHCP).
    #[cfg(target_os = "espidf")]
    fn platform_association_pending(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && !self.platform_is_connected()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_association_pending(&self) -> bool {
        self.sim_associating
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
        if !self.sim_ap_reachable {
            warn!("WiFi(sim): AP unreachable (attempt {})", self.sim_connect_counter);
            return Err(ConnectivityError::ConnectionFailed);
        }
        if self.sim_slow_association {
            self.sim_associating = true;
        } else {
            self.sim_link_up = true;
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_link_up = false;
        self.sim_associating = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: `ap_info` is a valid, writable record for the duration of the call.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        // Oscillate between -66 and -55 dBm across attempts.
        let oscillation = ((self.sim_connect_counter % 12) as i8) - 6;
        Some(-60_i8.saturating_add(oscillation))
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.platform_is_connected() {
            return Err(ConnectivityError::AlreadyConnected);
        }
        if self.platform_association_pending() {
            debug!("WiFi: still associating with '{}'", self.ssid);
            return Ok(());
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        self.platform_connect()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn rssi(&self) -> Option<i8> {
        if self.platform_is_connected() {
            self.platform_rssi()
        } else {
            None
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
