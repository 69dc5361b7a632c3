//! RS485 inverter link — command frame codec and keepalive cadence.
//!
//! The inverter treats silence on the bus as link loss and drops its
//! output on its own.  Every accepted demand update is sent at once, and
//! the [`keepalive`] driver repeats the current frame on a fixed cadence
//! so the commanded value stays authoritative between measurements.

pub mod frame;
pub mod keepalive;

pub use frame::{CommandFrame, FRAME_LEN};
