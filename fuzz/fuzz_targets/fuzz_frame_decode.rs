//! Fuzz target: `link::frame::decode`
//!
//! Feeds arbitrary byte strings to the frame decoder.  It must never
//! panic, and anything it accepts must re-encode to the same bytes.
//!
//! cargo fuzz run fuzz_frame_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use zeroexport::link::frame::{decode, encode};

fuzz_target!(|data: &[u8]| {
    if let Ok(demand) = decode(data) {
        assert_eq!(encode(demand).as_bytes().as_slice(), data);
    }
});
