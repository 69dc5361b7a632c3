//! Demand control — the integrator that turns grid-import readings into
//! an inverter power command, and the parser for the inbound reading.

pub mod demand;
pub mod measurement;
