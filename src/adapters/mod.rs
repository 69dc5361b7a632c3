//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to               |
//! |------------|--------------|---------------------------|
//! | `wifi`     | NetworkPort  | ESP-IDF WiFi STA          |
//! | `mqtt`     | BrokerPort   | ESP-IDF MQTT client       |
//! | `log_sink` | EventSink    | Serial log output         |
//! | `nvs`      | ConfigPort   | NVS / in-memory store     |
//! | `time`     | —            | esp_timer / `Instant`     |
//!
//! The RS485 link ([`SerialPort`](crate::app::ports::SerialPort)) and
//! restart ([`RestartPort`](crate::app::ports::RestartPort)) live under
//! `drivers` with the other peripheral code.

pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
