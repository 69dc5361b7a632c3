//! Fuzz target: measurement payload → demand controller
//!
//! Splits the input on `\n` into broker payloads, parses each one and
//! feeds it to the controller.  Demand must stay within `[0, max]` and
//! the emitted frame must always decode to the held demand.
//!
//! cargo fuzz run fuzz_measurement_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use zeroexport::app::ports::payload_from;
use zeroexport::control::demand::DemandController;
use zeroexport::control::measurement::parse_import_w;
use zeroexport::link::frame::decode;

const MAX_OUTPUT_W: u16 = 900;

fuzz_target!(|data: &[u8]| {
    let mut ctl = DemandController::new(MAX_OUTPUT_W, 30);

    for chunk in data.split(|&b| b == b'\n') {
        let payload = payload_from(chunk);
        let demand = ctl.update(parse_import_w(&payload));
        assert!(demand <= MAX_OUTPUT_W, "demand {demand} above limit");
        assert_eq!(decode(ctl.frame().as_bytes()), Ok(demand));
    }

    ctl.force_zero();
    assert_eq!(ctl.demand(), 0);
});
