//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`].  The ESP-IDF client delivers events on its
//! own task through a callback; received payloads are handed to the
//! control loop through a bounded [`embassy_sync`] channel and drained one
//! per tick with [`BrokerPort::poll_message`].
//!
//! ```text
//!  esp-mqtt task ──callback──▶ INBOUND (4 slots) ──poll_message──▶ AppService
//!                └──────────▶ CONNECTED flag ────is_connected───▶
//! ```
//!
//! When the channel is full the oldest reading is dropped: only the most
//! recent import value matters to the controller.
//!
//! On host targets the same channel lives inside the adapter and tests
//! inject payloads directly.

use log::{info, warn};

use crate::app::ports::{BrokerPort, Payload};
use crate::config::NetworkConfig;
use crate::error::BrokerError;

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};

#[cfg(not(target_os = "espidf"))]
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};

/// Queue depth between the client callback and the control loop.
pub const INBOUND_DEPTH: usize = 4;

/// How long `connect()` waits for the broker handshake.
pub const CONNECT_TIMEOUT_MS: u32 = 5_000;

#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 50;

#[cfg(target_os = "espidf")]
static INBOUND: Channel<CriticalSectionRawMutex, Payload, INBOUND_DEPTH> = Channel::new();

#[cfg(target_os = "espidf")]
static CONNECTED: AtomicBool = AtomicBool::new(false);

/// Push a payload, evicting the oldest entry when the queue is full.
fn enqueue_latest<M: embassy_sync::blocking_mutex::raw::RawMutex>(
    queue: &Channel<M, Payload, INBOUND_DEPTH>,
    payload: Payload,
) {
    if let Err(embassy_sync::channel::TrySendError::Full(payload)) = queue.try_send(payload) {
        let _ = queue.try_receive();
        let _ = queue.try_send(payload);
    }
}

fn drain<M: embassy_sync::blocking_mutex::raw::RawMutex>(queue: &Channel<M, Payload, INBOUND_DEPTH>) {
    while queue.try_receive().is_ok() {}
}

pub struct MqttAdapter {
    url: heapless::String<96>,
    client_id: heapless::String<32>,
    username: heapless::String<32>,
    password: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    inbound: Channel<NoopRawMutex, Payload, INBOUND_DEPTH>,
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_broker_reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_subscription: Option<heapless::String<64>>,
}

impl MqttAdapter {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            url: config.broker_url.clone(),
            client_id: config.client_id.clone(),
            username: config.broker_username.clone(),
            password: config.broker_password.clone(),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            inbound: Channel::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_broker_reachable: true,
            #[cfg(not(target_os = "espidf"))]
            sim_subscription: None,
        }
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Make the broker (un)reachable.  Dropping reachability drops an
    /// established session.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_broker_reachable(&mut self, reachable: bool) {
        self.sim_broker_reachable = reachable;
        if !reachable && self.sim_connected {
            warn!("MQTT(sim): session lost");
            self.sim_connected = false;
        }
    }

    /// Deliver a message as the broker would.  Returns `false` when no
    /// session is subscribed to `topic`.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_publish(&mut self, topic: &str, data: &[u8]) -> bool {
        let subscribed = self.sim_subscription.as_ref().is_some_and(|t| t.as_str() == topic);
        if !(self.sim_connected && subscribed) {
            return false;
        }
        enqueue_latest(&self.inbound, crate::app::ports::payload_from(data));
        true
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn create_client(&self) -> Result<EspMqttClient<'static>, BrokerError> {
        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            username: (!self.username.is_empty()).then_some(self.username.as_str()),
            password: (!self.password.is_empty()).then_some(self.password.as_str()),
            ..Default::default()
        };

        EspMqttClient::new_cb(self.url.as_str(), &conf, |event| match event.payload() {
            EventPayload::Connected(_) => {
                CONNECTED.store(true, Ordering::Release);
            }
            EventPayload::Disconnected => {
                CONNECTED.store(false, Ordering::Release);
            }
            EventPayload::Received { data, details, .. } => {
                // Only whole payloads; fragments of oversize messages are dropped.
                if matches!(details, Details::Complete) {
                    enqueue_latest(&INBOUND, crate::app::ports::payload_from(data));
                }
            }
            EventPayload::Error(e) => {
                warn!("MQTT: client error: {:?}", e);
            }
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            BrokerError::ClientInit
        })
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), BrokerError> {
        if self.client.is_none() {
            CONNECTED.store(false, Ordering::Release);
            self.client = Some(self.create_client()?);
        }

        let mut waited = 0;
        while !CONNECTED.load(Ordering::Acquire) {
            if waited >= CONNECT_TIMEOUT_MS {
                return Err(BrokerError::ConnectFailed);
            }
            esp_idf_svc::hal::delay::FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), BrokerError> {
        if !self.sim_broker_reachable {
            return Err(BrokerError::ConnectFailed);
        }
        self.sim_connected = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: subscribe '{}' failed: {}", topic, e);
                BrokerError::SubscribeFailed
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let mut t = heapless::String::new();
        t.push_str(topic).map_err(|_| BrokerError::SubscribeFailed)?;
        self.sim_subscription = Some(t);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client stops its task and closes the socket.
        self.client = None;
        CONNECTED.store(false, Ordering::Release);
        drain(&INBOUND);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_connected = false;
        self.sim_subscription = None;
        drain(&self.inbound);
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.client.is_some() && CONNECTED.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_poll(&mut self) -> Option<Payload> {
        INBOUND.try_receive().ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_poll(&mut self) -> Option<Payload> {
        self.inbound.try_receive().ok()
    }
}

// ───────────────────────────────────────────────────────────────
// BrokerPort
// ───────────────────────────────────────────────────────────────

impl BrokerPort for MqttAdapter {
    fn connect(&mut self) -> Result<(), BrokerError> {
        info!("MQTT: connecting to {} as '{}'", self.url, self.client_id);
        self.platform_connect()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.platform_is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.platform_subscribe(topic)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn poll_message(&mut self) -> Option<Payload> {
        self.platform_poll()
    }
}
