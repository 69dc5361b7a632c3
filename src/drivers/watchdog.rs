//! Task Watchdog Timer (TWDT) and device restart.
//!
//! [`Watchdog`] wraps the ESP-IDF TWDT API to reset the device if the
//! control loop itself stalls.  The main loop must call `feed()` on every
//! iteration.  It is independent of the measurement liveness timer, which
//! restarts through [`SystemRestart`].

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::{info, warn};

use crate::app::ports::RestartPort;

/// Hardware watchdog timeout.  Must exceed the longest blocking call in
/// the loop (the broker connect wait).
pub const TWDT_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: TWDT_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", TWDT_TIMEOUT_MS);
                } else {
                    warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op");
            Self {}
        }
    }

    /// Feed the watchdog.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}

/// Software restart of the whole device.
#[derive(Default)]
pub struct SystemRestart {
    #[cfg(not(target_os = "espidf"))]
    requested: u32,
}

impl SystemRestart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation: how many restarts were requested.
    #[cfg(not(target_os = "espidf"))]
    pub fn requested(&self) -> u32 {
        self.requested
    }
}

impl RestartPort for SystemRestart {
    fn restart(&mut self) {
        warn!("Restarting device");
        #[cfg(target_os = "espidf")]
        esp_idf_svc::hal::reset::restart();

        #[cfg(not(target_os = "espidf"))]
        {
            self.requested += 1;
        }
    }
}
