//! Peripheral drivers: the RS485 inverter link, the task watchdog and
//! device restart.

pub mod rs485;
pub mod watchdog;
