//! Liveness watchdog: restart when no measurement is processed within
//! the timeout, measured on the clock from boot or from the last reading.

use super::mock_hw::Rig;

use zeroexport::app::events::AppEvent;
use zeroexport::app::service::TickOutcome;
use zeroexport::config::SystemConfig;

fn short_timeout() -> SystemConfig {
    SystemConfig {
        watchdog_timeout_secs: 10,
        ..Default::default()
    }
}

fn last_expiry(rig: &Rig) -> Option<u64> {
    rig.sink.events.iter().rev().find_map(|e| match e {
        AppEvent::WatchdogExpired { ms_since_feed } => Some(*ms_since_feed),
        _ => None,
    })
}

#[test]
fn restarts_when_no_measurement_ever_arrives() {
    let mut rig = Rig::new(&short_timeout());
    rig.bring_up();

    let remaining = rig.ticks_for(short_timeout().watchdog_timeout_ms() - rig.clock.now());
    rig.tick_n(remaining - 1);
    assert_eq!(rig.tick(), TickOutcome::RestartRequested);
    assert_eq!(rig.clock.now(), 10_000);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::WatchdogExpired { .. })),
        1
    );
}

#[test]
fn restarts_even_without_network() {
    let mut rig = Rig::new(&short_timeout());
    rig.net.reachable = false;
    let ticks = rig.ticks_for(short_timeout().watchdog_timeout_ms());
    rig.tick_n(ticks - 1);
    assert_eq!(rig.tick(), TickOutcome::RestartRequested);
}

#[test]
fn steady_measurements_keep_it_alive() {
    let mut rig = Rig::new(&short_timeout());
    rig.bring_up();

    let period = rig.ticks_for(short_timeout().watchdog_timeout_ms()) / 2;
    for _ in 0..20 {
        rig.broker.publish("30");
        rig.tick_n(period);
    }
    assert_eq!(rig.app.stats().measurements, 20);
}

#[test]
fn expiry_comes_exactly_one_timeout_after_the_last_reading() {
    let mut rig = Rig::new(&short_timeout());
    rig.bring_up();
    rig.measure("100");
    let ticks = rig.ticks_for(short_timeout().watchdog_timeout_ms());

    // A reading processed on the deadline tick still counts.
    rig.tick_n(ticks - 1);
    rig.measure("100");
    let fed_at = rig.clock.now();

    rig.tick_n(ticks - 1);
    assert_eq!(rig.clock.now() - fed_at, 9_950);
    assert_eq!(rig.tick(), TickOutcome::RestartRequested);
    assert_eq!(last_expiry(&rig), Some(10_000));
}

#[test]
fn safe_zero_does_not_pause_the_timer() {
    let mut rig = Rig::new(&short_timeout());
    rig.bring_up();
    rig.measure("200");

    rig.broker.drop_session();
    rig.broker.reachable = false;
    let ticks = rig.ticks_for(short_timeout().watchdog_timeout_ms());
    rig.tick_n(ticks - 1);
    assert_eq!(rig.app.demand(), 0);
    assert_eq!(rig.tick(), TickOutcome::RestartRequested);
}

#[test]
fn discarded_messages_do_not_feed_the_timer() {
    let mut rig = Rig::new(&short_timeout());
    rig.broker.reachable = false;

    let mut outcome = TickOutcome::Continue;
    for _ in 0..rig.ticks_for(short_timeout().watchdog_timeout_ms()) {
        rig.broker.publish("100");
        outcome = rig.tick();
    }
    assert_eq!(outcome, TickOutcome::RestartRequested);
    assert_eq!(rig.app.stats().measurements, 0);
}

#[test]
fn blocking_broker_connect_does_not_stretch_the_timeout() {
    let cfg = SystemConfig {
        watchdog_timeout_secs: 10,
        keepalive_interval_ms: 500,
        broker_retry_interval_ms: 500,
        ..Default::default()
    };
    let mut rig = Rig::new(&cfg);
    rig.broker.reachable = false;
    rig.broker.connect_stall_ms = 500;

    let mut restarted = false;
    for _ in 0..1_000 {
        if rig.tick() == TickOutcome::RestartRequested {
            restarted = true;
            break;
        }
    }
    assert!(restarted);
    assert!(rig.broker.connect_calls > 1);

    let timeout = cfg.watchdog_timeout_ms();
    let slack = rig.broker.connect_stall_ms + rig.period_ms;
    let waited = last_expiry(&rig).unwrap();
    assert!(waited >= timeout);
    assert!(waited < timeout + slack, "restart after {waited} ms");
    assert!(rig.clock.now() < timeout + 2 * slack);

    // Keepalives slip by at most one blocking call.
    let gap = rig.serial.max_gap_ms();
    assert!(
        gap <= u64::from(cfg.keepalive_interval_ms) + slack,
        "keepalive gap {gap} ms"
    );
}
