//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the connectivity supervisor, the demand
//! controller, the keepalive driver and the liveness watchdog.  All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!   NetworkPort ──▶ ┌──────────────────────────────┐ ──▶ SerialPort
//!    BrokerPort ──▶ │          AppService          │ ──▶ EventSink
//!                   │ Supervisor · Demand · Keep-  │
//!                   │ alive · Liveness             │
//!                   └──────────────────────────────┘
//! ```

use heapless::String;
use log::{info, warn};

use crate::config::SystemConfig;
use crate::control::demand::DemandController;
use crate::control::measurement::parse_import_w;
use crate::fsm::context::{SessionAttempt, SupervisorContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, SupervisorState};
use crate::link::CommandFrame;
use crate::link::keepalive::KeepaliveDriver;
use crate::liveness::LivenessWatchdog;

use super::events::{AppEvent, LinkStats, StatusReport};
use super::ports::{BrokerPort, EventSink, NetworkPort, SerialPort};

/// What the caller must do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Liveness expired; restart the device.
    RestartRequested,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: SupervisorContext,
    controller: DemandController,
    keepalive: KeepaliveDriver,
    liveness: LivenessWatchdog,
    topic: String<64>,
    status_interval_ms: u64,
    last_status_ms: u64,
    now_ms: u64,
    last_import_w: Option<i32>,
    stats: LinkStats,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the supervisor — call [`start`](Self::start) next.
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), SupervisorState::LinkDown),
            ctx: SupervisorContext::new(config),
            controller: DemandController::from_config(config),
            keepalive: KeepaliveDriver::new(config.keepalive_interval_ms),
            liveness: LivenessWatchdog::new(config.watchdog_timeout_ms()),
            topic: config.network.measurement_topic.clone(),
            status_interval_ms: config.status_interval_ms(),
            last_status_ms: 0,
            now_ms: 0,
            last_import_w: None,
            stats: LinkStats::default(),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter the initial state (`LinkDown`, demand zero).  `now_ms` is
    /// the monotonic clock reading every deadline is anchored to.
    pub fn start(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.now_ms = now_ms;
        self.last_status_ms = now_ms;
        self.keepalive.start(now_ms);
        self.liveness.start(now_ms);
        self.ctx.now_ms = now_ms;
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!(
            "AppService started in {:?} (max {} W, topic '{}')",
            self.fsm.current_state(),
            self.controller.max_output_w(),
            self.topic
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle at monotonic time `now_ms`:
    /// observe → supervise → safe-zero → measurement → keepalive → liveness.
    ///
    /// Every deadline is compared against the clock, so time spent blocked
    /// inside a port call (a broker connect) counts against the keepalive,
    /// retry and liveness timers on the next tick.
    pub fn tick(
        &mut self,
        now_ms: u64,
        net: &mut impl NetworkPort,
        broker: &mut impl BrokerPort,
        serial: &mut impl SerialPort,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.now_ms = now_ms;
        self.ctx.now_ms = now_ms;
        let prev_state = self.fsm.current_state();

        // 1. Observe link and session health
        self.ctx.link.link_up = net.is_connected();
        self.ctx.link.session_connected = broker.is_connected();

        // 2. Supervisor step, then carry out its requests
        self.fsm.tick(&mut self.ctx);
        self.apply_commands(net, broker);

        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }

        // 3. Safe-zero override
        if self.ctx.commands.safe_zero && self.controller.demand() != 0 {
            let previous_w = self.controller.force_zero();
            self.stats.safe_zero_events += 1;
            warn!("Safe-zero: demand {} W -> 0 W", previous_w);
            sink.emit(&AppEvent::SafeZeroForced { previous_w });
            self.transmit(CommandFrame::SAFE_ZERO, serial, sink);
        }

        // 4. Inbound measurement dispatch
        if self.ctx.commands.accept_measurements {
            if let Some(payload) = broker.poll_message() {
                let import_w = parse_import_w(&payload);
                let demand_w = self.controller.update(import_w);
                self.liveness.feed(now_ms);
                self.last_import_w = Some(import_w);
                self.stats.measurements += 1;
                sink.emit(&AppEvent::MeasurementApplied { import_w, demand_w });
                self.transmit(self.controller.frame(), serial, sink);
            }
        } else {
            while broker.poll_message().is_some() {
                self.stats.discarded += 1;
            }
        }

        // 5. Keepalive
        if self.keepalive.poll(now_ms) {
            self.transmit(self.controller.frame(), serial, sink);
        }

        // 6. Periodic status
        if now_ms.saturating_sub(self.last_status_ms) >= self.status_interval_ms {
            self.last_status_ms = now_ms;
            sink.emit(&AppEvent::Status(self.status(net.rssi())));
        }

        // 7. Liveness
        if self.liveness.is_expired(now_ms) {
            sink.emit(&AppEvent::WatchdogExpired {
                ms_since_feed: self.liveness.ms_since_feed(now_ms),
            });
            return TickOutcome::RestartRequested;
        }

        TickOutcome::Continue
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a status snapshot.
    pub fn status(&self, wifi_rssi: Option<i8>) -> StatusReport {
        StatusReport {
            state: self.fsm.current_state(),
            demand_w: self.controller.demand(),
            last_import_w: self.last_import_w,
            wifi_rssi,
            uptime_ms: self.now_ms,
            stats: self.stats,
        }
    }

    /// Current supervisor state.
    pub fn state(&self) -> SupervisorState {
        self.fsm.current_state()
    }

    /// Currently commanded demand (W).
    pub fn demand(&self) -> u16 {
        self.controller.demand()
    }

    /// The frame the keepalive would send now.
    pub fn current_frame(&self) -> CommandFrame {
        self.controller.frame()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    // ── Internal ──────────────────────────────────────────────

    /// Translate supervisor requests into port calls.
    fn apply_commands(&mut self, net: &mut impl NetworkPort, broker: &mut impl BrokerPort) {
        let cmds = &mut self.ctx.commands;

        if core::mem::take(&mut cmds.close_session) {
            broker.disconnect();
        }

        if core::mem::take(&mut cmds.reconnect_link) {
            self.stats.link_attempts += 1;
            if let Err(e) = net.connect() {
                warn!("WiFi connect request failed: {}", e);
            }
        }

        if core::mem::take(&mut cmds.open_session) {
            self.stats.session_attempts += 1;
            let result = broker.connect().and_then(|()| broker.subscribe(&self.topic));
            let attempt = match result {
                Ok(()) => {
                    info!("Broker session up, subscribed to '{}'", self.topic);
                    SessionAttempt::Succeeded
                }
                Err(e) => {
                    warn!("Broker session attempt failed: {}", e);
                    self.stats.session_failures += 1;
                    broker.disconnect();
                    SessionAttempt::Failed
                }
            };
            self.ctx.link.session_attempt = Some(attempt);
        }
    }

    fn transmit(&mut self, frame: CommandFrame, serial: &mut impl SerialPort, sink: &mut impl EventSink) {
        debug_assert!(
            frame.demand() == 0 || self.fsm.current_state().is_connected(),
            "non-zero frame outside SessionConnected"
        );
        match serial.write_frame(&frame) {
            Ok(()) => self.stats.frames_sent += 1,
            Err(e) => {
                self.stats.write_errors += 1;
                warn!("RS485 write failed: {}", e);
                sink.emit(&AppEvent::LinkWriteFailed(e));
            }
        }
    }
}
