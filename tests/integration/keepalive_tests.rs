//! Keepalive cadence: identical frames on a fixed schedule, whether or
//! not measurements arrive and whether or not the session is up.

use super::mock_hw::Rig;

use zeroexport::app::events::AppEvent;
use zeroexport::config::SystemConfig;
use zeroexport::link::CommandFrame;

fn interval() -> usize {
    let cfg = SystemConfig::default();
    (cfg.keepalive_interval_ms / cfg.control_loop_interval_ms) as usize
}

#[test]
fn repeats_current_frame_at_fixed_cadence() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();
    rig.measure("330");
    let expected = rig.app.current_frame();
    rig.serial.frames.clear();

    rig.tick_n(interval() * 5);
    assert_eq!(rig.serial.frames.len(), 5);
    assert!(rig.serial.frames.iter().all(|f| *f == expected));
    assert_eq!(expected.as_bytes(), &[0x24, 0x56, 0x00, 0x21, 0x01, 0x2C, 0x80, 0xDB]);
}

#[test]
fn keeps_sending_zero_while_disconnected() {
    let mut rig = Rig::with_defaults();
    rig.net.reachable = false;

    rig.tick_n(interval() * 3);
    assert_eq!(rig.serial.frames.len(), 3);
    assert!(rig.serial.frames.iter().all(|f| *f == CommandFrame::SAFE_ZERO));
}

#[test]
fn measurement_does_not_shift_the_cadence() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();
    rig.serial.frames.clear();

    // Two full intervals with one reading in the middle: two keepalives
    // plus the immediate frame for the reading.
    let n = interval();
    rig.tick_n(n);
    rig.broker.publish("80");
    rig.tick_n(n);
    assert_eq!(rig.serial.frames.len(), 3);
    assert_eq!(rig.serial.last_demand(), Some(50));
}

#[test]
fn write_failure_is_reported_and_next_keepalive_retries() {
    let mut rig = Rig::with_defaults();
    rig.bring_up();
    rig.measure("130");
    rig.serial.frames.clear();
    rig.serial.fail_next = 1;

    rig.tick_n(interval());
    assert!(rig.serial.frames.is_empty());
    assert_eq!(rig.app.stats().write_errors, 1);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::LinkWriteFailed(_))), 1);

    rig.tick_n(interval());
    assert_eq!(rig.serial.last_demand(), Some(100));
}
