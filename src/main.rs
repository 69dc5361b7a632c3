//! Zero-export limiter firmware — main entry point.
//!
//! Hexagonal architecture around a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter    MqttAdapter    Rs485Driver    LogEventSink     │
//! │  (NetworkPort)  (BrokerPort)   (SerialPort)   (EventSink)      │
//! │  NvsAdapter     SystemRestart  Watchdog (TWDT)  Esp32Time      │
//! │  (ConfigPort)   (RestartPort)                                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Supervisor FSM · Demand · Keepalive · Liveness        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use zeroexport::adapters::log_sink::LogEventSink;
use zeroexport::adapters::mqtt::MqttAdapter;
use zeroexport::adapters::nvs::NvsAdapter;
use zeroexport::adapters::time::Esp32TimeAdapter;
use zeroexport::adapters::wifi::WifiAdapter;
use zeroexport::app::ports::{RestartPort, SerialPort};
use zeroexport::app::service::{AppService, TickOutcome};
use zeroexport::config::{self, SystemConfig};
use zeroexport::drivers::rs485::Rs485Driver;
use zeroexport::drivers::watchdog::{SystemRestart, Watchdog};
use zeroexport::error::Error;
use zeroexport::link::CommandFrame;
use zeroexport::pins;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ZeroExport v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let watchdog = Watchdog::new();
    let clock = Esp32TimeAdapter::new();

    // ── 2. Load config from NVS (defaults persisted on first boot) ─
    let config = match NvsAdapter::new() {
        Ok(nvs) => config::load_or_provision(&nvs),
        Err(e) => {
            warn!("NVS unavailable ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    info!(
        "Config: max={}W buffer={}W loop={}ms keepalive={}ms watchdog={}s",
        config.max_output_w,
        config.import_buffer_w,
        config.control_loop_interval_ms,
        config.keepalive_interval_ms,
        config.watchdog_timeout_secs
    );

    // ── 3. RS485 link (safe-zero goes out before anything else) ─
    // SAFETY: DE GPIO is reserved for the RS485 driver in `pins`.
    let de_pin = unsafe { AnyOutputPin::new(pins::RS485_DE_GPIO) };
    let de = PinDriver::output(de_pin).map_err(|_| Error::Init("RS485 DE pin"))?;
    let mut serial =
        Rs485Driver::open(peripherals.uart1, config.serial_baud, de).map_err(Error::from)?;
    if let Err(e) = serial.write_frame(&CommandFrame::SAFE_ZERO) {
        warn!("RS485: initial safe-zero frame failed: {}", e);
    }

    // ── 4. Network adapters ───────────────────────────────────
    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, nvs_partition, &config.network)
        .map_err(Error::from)?;
    let mut broker = MqttAdapter::new(&config.network);
    let mut log_sink = LogEventSink::new();
    let mut restart = SystemRestart::new();

    // ── 5. Application service ────────────────────────────────
    let mut app = AppService::new(&config);
    app.start(clock.uptime_ms(), &mut log_sink);

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        FreeRtos::delay_ms(config.control_loop_interval_ms);

        let outcome = app.tick(
            clock.uptime_ms(),
            &mut wifi,
            &mut broker,
            &mut serial,
            &mut log_sink,
        );
        watchdog.feed();

        if outcome == TickOutcome::RestartRequested {
            restart.restart();
        }
    }
}
