//! Integral demand controller.
//!
//! Each measurement adds its deviation from the import target to the
//! running demand:
//!
//! ```text
//! adjusted = import_w - import_buffer_w
//! demand   = clamp(demand + adjusted, 0, max_output_w)
//! ```
//!
//! Pure accumulator: no proportional or derivative term and no ramp
//! limiting (the inverter smooths its own output).  The clamp saturates,
//! so the stored value is always the true state and there is no hidden
//! windup.

use crate::config::SystemConfig;
use crate::link::frame::{self, CommandFrame};

/// One integrator step.  Arbitrary `import_w` is accepted; the result is
/// always within `0..=max_output_w`.
pub fn integrate(demand_w: u16, import_w: i32, import_buffer_w: i32, max_output_w: u16) -> u16 {
    let adjusted = i64::from(import_w) - i64::from(import_buffer_w);
    let raw = i64::from(demand_w) + adjusted;
    raw.clamp(0, i64::from(max_output_w)) as u16
}

/// Demand controller state.
#[derive(Debug, Clone)]
pub struct DemandController {
    max_output_w: u16,
    import_buffer_w: i32,
    demand_w: u16,
}

impl DemandController {
    /// Start at zero demand.
    pub fn new(max_output_w: u16, import_buffer_w: i32) -> Self {
        Self {
            max_output_w,
            import_buffer_w,
            demand_w: 0,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(config.max_output_w, config.import_buffer_w)
    }

    /// Fold one grid-import reading into the demand and return it.
    pub fn update(&mut self, import_w: i32) -> u16 {
        self.demand_w = integrate(
            self.demand_w,
            import_w,
            self.import_buffer_w,
            self.max_output_w,
        );
        self.demand_w
    }

    /// Safe-zero override.  Returns the demand that was discarded.
    pub fn force_zero(&mut self) -> u16 {
        core::mem::take(&mut self.demand_w)
    }

    /// Current demand (W).
    pub fn demand(&self) -> u16 {
        self.demand_w
    }

    /// Frame encoding the current demand.
    pub fn frame(&self) -> CommandFrame {
        frame::encode(self.demand_w)
    }

    pub fn max_output_w(&self) -> u16 {
        self.max_output_w
    }
}
