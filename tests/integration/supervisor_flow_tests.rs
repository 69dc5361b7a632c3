//! Connectivity supervision end-to-end: link and session recovery,
//! fixed retry intervals and safe-zero on every loss path.

use super::mock_hw::Rig;

use zeroexport::app::events::AppEvent;
use zeroexport::config::SystemConfig;
use zeroexport::fsm::SupervisorState;

#[test]
fn boots_with_zero_demand_and_connects() {
    let mut rig = Rig::with_defaults();
    assert_eq!(rig.app.state(), SupervisorState::LinkDown);
    assert_eq!(rig.app.demand(), 0);

    rig.bring_up();
    assert_eq!(rig.broker.subscriptions, ["home/grid/import_w"]);
    assert!(matches!(
        rig.sink.events.first(),
        Some(AppEvent::Started(SupervisorState::LinkDown))
    ));
}

#[test]
fn link_retry_uses_fixed_interval_without_backoff() {
    let mut rig = Rig::with_defaults();
    rig.net.reachable = false;

    // First attempt is immediate.
    rig.tick_n(1);
    assert_eq!(rig.net.connect_calls, 1);

    // Then exactly one attempt per retry window, window after window.
    let window = rig.ticks_for(u64::from(SystemConfig::default().link_retry_interval_ms));
    for round in 1..=20 {
        rig.tick_n(window);
        assert_eq!(rig.net.connect_calls, 1 + round);
    }
    assert_eq!(rig.app.state(), SupervisorState::LinkDown);
    assert_eq!(rig.app.stats().link_attempts, 21);
}

#[test]
fn failed_broker_attempt_waits_retry_interval() {
    let mut rig = Rig::with_defaults();
    rig.broker.reachable = false;

    rig.tick_n(3); // link up, first session attempt
    assert_eq!(rig.broker.connect_calls, 1);
    rig.tick_n(1); // attempt result consumed → SessionDown
    assert_eq!(rig.app.state(), SupervisorState::SessionDown);

    let retry = rig.ticks_for(u64::from(SystemConfig::default().broker_retry_interval_ms));
    rig.tick_n(retry - 1);
    assert_eq!(rig.broker.connect_calls, 1, "no attempt before the interval");
    rig.tick_n(1);
    assert_eq!(rig.broker.connect_calls, 2);

    rig.broker.reachable = true;
    rig.tick_n(retry + 2);
    assert_eq!(rig.broker.connect_calls, 3);
    assert_eq!(rig.app.state(), SupervisorState::SessionConnected);
    assert_eq!(rig.app.stats().session_failures, 2);
}

#[test]
fn subscribe_failure_counts_as_failed_attempt() {
    let mut rig = Rig::with_defaults();
    rig.broker.subscribe_fails = true;

    rig.tick_n(10);
    assert_ne!(rig.app.state(), SupervisorState::SessionConnected);
    assert!(!rig.broker.connected, "half-open session must be torn down");
    assert_eq!(rig.app.stats().session_failures, 1);
}

#[test]
fn resubscribes_after_session_drop() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();

    rig.broker.drop_session();
    rig.tick();
    assert_eq!(rig.app.state(), SupervisorState::SessionDown);

    rig.bring_up();
    assert_eq!(rig.broker.subscriptions.len(), 2);
}

#[test]
fn link_loss_tears_down_session() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();
    let before = rig.broker.disconnect_calls;

    rig.net.drop_link();
    rig.net.reachable = false;
    rig.tick();
    assert_eq!(rig.app.state(), SupervisorState::LinkDown);
    assert_eq!(rig.broker.disconnect_calls, before + 1);
    assert!(!rig.broker.connected);
}

#[test]
fn session_drop_forces_zero_and_restarts_integration() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();

    assert_eq!(rig.measure("330"), 300);
    assert_eq!(rig.serial.last_demand(), Some(300));

    rig.broker.drop_session();
    rig.tick();
    assert_eq!(rig.app.demand(), 0);
    assert_eq!(rig.serial.last_demand(), Some(0), "zero frame goes out immediately");
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::SafeZeroForced { previous_w: 300 })),
        1
    );

    rig.bring_up();
    assert_eq!(rig.measure("130"), 100, "integrator resumes from zero");
}

#[test]
fn link_drop_forces_zero() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();
    rig.measure("530");

    rig.net.drop_link();
    rig.net.reachable = false;
    rig.tick();
    assert_eq!(rig.app.demand(), 0);
    assert_eq!(rig.serial.last_demand(), Some(0));
}

#[test]
fn messages_received_while_disconnected_are_discarded() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();

    rig.broker.drop_session();
    rig.broker.publish("400");
    rig.broker.publish("400");
    rig.tick();
    assert_eq!(rig.app.state(), SupervisorState::SessionDown);
    assert_eq!(rig.app.stats().discarded, 2);

    rig.bring_up();
    rig.tick_n(3);
    assert_eq!(rig.app.demand(), 0, "stale readings never reach the controller");
}

#[test]
fn at_most_one_measurement_per_tick() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();

    rig.broker.publish("130");
    rig.broker.publish("130");
    rig.tick();
    assert_eq!(rig.app.demand(), 100);
    rig.tick();
    assert_eq!(rig.app.demand(), 200);
    assert_eq!(rig.app.stats().measurements, 2);
}

#[test]
fn no_nonzero_frame_outside_connected_state() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();
    rig.measure("630");

    for cycle in 0..5 {
        let sent_before = rig.serial.frames.len();
        if cycle % 2 == 0 {
            rig.broker.drop_session();
        } else {
            rig.net.drop_link();
        }
        rig.tick();
        assert!(rig.serial.frames[sent_before..].iter().all(|f| f.demand() == 0));

        rig.bring_up();
        rig.measure("630");
    }
}

#[test]
fn state_changes_are_reported() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();
    let transitions: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        [
            (SupervisorState::LinkDown, SupervisorState::SessionDown),
            (SupervisorState::SessionDown, SupervisorState::SessionConnecting),
            (SupervisorState::SessionConnecting, SupervisorState::SessionConnected),
        ]
    );
}
