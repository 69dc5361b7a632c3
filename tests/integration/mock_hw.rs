//! Mock network, broker and serial adapters for integration tests.
//!
//! Every port call is recorded so tests can assert on the full history
//! without a radio or a UART.  All mocks share one [`FakeClock`], so a
//! mock can model a call that blocks by advancing it.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use zeroexport::app::events::AppEvent;
use zeroexport::app::ports::{
    BrokerPort, EventSink, NetworkPort, Payload, SerialPort, payload_from,
};
use zeroexport::app::service::{AppService, TickOutcome};
use zeroexport::config::SystemConfig;
use zeroexport::error::{BrokerError, ConnectivityError, LinkError};
use zeroexport::fsm::SupervisorState;
use zeroexport::link::CommandFrame;

// ── FakeClock ─────────────────────────────────────────────────

/// Monotonic milliseconds, advanced by the rig and by blocking mocks.
#[derive(Clone, Default)]
pub struct FakeClock(Rc<Cell<u64>>);

#[allow(dead_code)]
impl FakeClock {
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

// ── MockNetwork ───────────────────────────────────────────────

pub struct MockNetwork {
    pub up: bool,
    /// Whether a connect request brings the link up.
    pub reachable: bool,
    pub connect_calls: u32,
}

#[allow(dead_code)]
impl MockNetwork {
    pub fn new() -> Self {
        Self {
            up: false,
            reachable: true,
            connect_calls: 0,
        }
    }

    pub fn drop_link(&mut self) {
        self.up = false;
    }
}

impl NetworkPort for MockNetwork {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        self.connect_calls += 1;
        if self.reachable {
            self.up = true;
            Ok(())
        } else {
            Err(ConnectivityError::ConnectionFailed)
        }
    }

    fn disconnect(&mut self) {
        self.up = false;
    }

    fn is_connected(&self) -> bool {
        self.up
    }

    fn rssi(&self) -> Option<i8> {
        self.up.then_some(-58)
    }
}

// ── MockBroker ────────────────────────────────────────────────

pub struct MockBroker {
    pub connected: bool,
    pub reachable: bool,
    pub subscribe_fails: bool,
    pub connect_calls: u32,
    pub disconnect_calls: u32,
    pub subscriptions: Vec<String>,
    pub inbox: VecDeque<Payload>,
    /// How long `connect()` blocks before returning.
    pub connect_stall_ms: u64,
    clock: FakeClock,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            connected: false,
            reachable: true,
            subscribe_fails: false,
            connect_calls: 0,
            disconnect_calls: 0,
            subscriptions: Vec::new(),
            inbox: VecDeque::new(),
            connect_stall_ms: 0,
            clock,
        }
    }

    /// Queue a message as if the broker had delivered it.
    pub fn publish(&mut self, text: &str) {
        self.inbox.push_back(payload_from(text.as_bytes()));
    }

    pub fn drop_session(&mut self) {
        self.connected = false;
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self) -> Result<(), BrokerError> {
        self.connect_calls += 1;
        self.clock.advance(self.connect_stall_ms);
        if self.reachable {
            self.connected = true;
            Ok(())
        } else {
            Err(BrokerError::ConnectFailed)
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        if self.subscribe_fails {
            return Err(BrokerError::SubscribeFailed);
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn poll_message(&mut self) -> Option<Payload> {
        self.inbox.pop_front()
    }
}

// ── MockSerial ────────────────────────────────────────────────

pub struct MockSerial {
    pub frames: Vec<CommandFrame>,
    /// Clock reading at each successful write.
    pub sent_at: Vec<u64>,
    /// Number of upcoming writes that fail.
    pub fail_next: u32,
    clock: FakeClock,
}

#[allow(dead_code)]
impl MockSerial {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            frames: Vec::new(),
            sent_at: Vec::new(),
            fail_next: 0,
            clock,
        }
    }

    /// Longest silence between consecutive frames.
    pub fn max_gap_ms(&self) -> u64 {
        self.sent_at.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0)
    }

    pub fn last_demand(&self) -> Option<u16> {
        self.frames.last().map(CommandFrame::demand)
    }
}

impl SerialPort for MockSerial {
    fn write_frame(&mut self, frame: &CommandFrame) -> Result<(), LinkError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(LinkError::WriteFailed);
        }
        self.frames.push(*frame);
        self.sent_at.push(self.clock.now());
        Ok(())
    }
}

// ── LogSink ───────────────────────────────────────────────────

pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig: service + all mocks ──────────────────────────────────

pub struct Rig {
    pub clock: FakeClock,
    /// Control loop period the rig advances per tick.
    pub period_ms: u64,
    pub app: AppService,
    pub net: MockNetwork,
    pub broker: MockBroker,
    pub serial: MockSerial,
    pub sink: LogSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: &SystemConfig) -> Self {
        let clock = FakeClock::default();
        let mut sink = LogSink::new();
        let mut app = AppService::new(config);
        app.start(clock.now(), &mut sink);
        Self {
            period_ms: u64::from(config.control_loop_interval_ms),
            app,
            net: MockNetwork::new(),
            broker: MockBroker::new(clock.clone()),
            serial: MockSerial::new(clock.clone()),
            sink,
            clock,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&SystemConfig::default())
    }

    /// Wait one loop period, then run a tick.
    pub fn tick(&mut self) -> TickOutcome {
        self.clock.advance(self.period_ms);
        self.app.tick(
            self.clock.now(),
            &mut self.net,
            &mut self.broker,
            &mut self.serial,
            &mut self.sink,
        )
    }

    /// Loop periods covering `ms`.
    pub fn ticks_for(&self, ms: u64) -> usize {
        ms.div_ceil(self.period_ms) as usize
    }

    pub fn tick_n(&mut self, n: usize) {
        for _ in 0..n {
            assert_eq!(self.tick(), TickOutcome::Continue);
        }
    }

    /// Tick until the session is up.  Panics if it takes unreasonably long.
    pub fn bring_up(&mut self) {
        for _ in 0..20 {
            if self.app.state() == SupervisorState::SessionConnected {
                return;
            }
            self.tick();
        }
        panic!("session did not come up, state {:?}", self.app.state());
    }

    /// Publish a reading and process it.
    pub fn measure(&mut self, text: &str) -> u16 {
        self.broker.publish(text);
        self.tick();
        self.app.demand()
    }
}
