//! Connectivity supervisor — function-pointer finite state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌───────────────────┬───────────┬──────────┬──────────────────┐ │
//! │  │ SupervisorState   │ on_enter  │ on_exit  │ on_update        │ │
//! │  ├───────────────────┼───────────┼──────────┼──────────────────┤ │
//! │  │ LinkDown          │ fn(ctx)   │ -        │ fn(ctx)->Option  │ │
//! │  │ SessionDown       │ fn(ctx)   │ -        │ fn(ctx)->Option  │ │
//! │  │ SessionConnecting │ fn(ctx)   │ -        │ fn(ctx)->Option  │ │
//! │  │ SessionConnected  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option  │ │
//! │  └───────────────────┴───────────┴──────────┴──────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  Handlers never touch the network themselves: they
//! read the observed [`LinkSnapshot`](context::LinkSnapshot) and write
//! [`SupervisorCommands`](context::SupervisorCommands), which the
//! application service carries out against the ports.

pub mod context;
pub mod states;

use context::SupervisorContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all supervisor states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SupervisorState {
    /// WiFi link down.
    LinkDown = 0,
    /// Link up, no broker session.
    SessionDown = 1,
    /// Link up, broker session attempt in flight.
    SessionConnecting = 2,
    /// Link up, session established and subscribed.
    SessionConnected = 3,
}

impl SupervisorState {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert a table index back to a state.  Panics on out-of-range in
    /// debug builds; returns `LinkDown` in release (safe fallback: it
    /// forces zero demand and restarts recovery).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::LinkDown,
            1 => Self::SessionDown,
            2 => Self::SessionConnecting,
            3 => Self::SessionConnected,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::LinkDown
            }
        }
    }

    /// Whether the network link is up in this state.
    pub fn link_up(self) -> bool {
        self != Self::LinkDown
    }

    /// Whether inbound measurements may drive the demand.
    pub fn is_connected(self) -> bool {
        self == Self::SessionConnected
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut SupervisorContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut SupervisorContext) -> Option<SupervisorState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single supervisor state.
pub struct StateDescriptor {
    pub id: SupervisorState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `SupervisorState as usize`.
    table: [StateDescriptor; SupervisorState::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonic time at which the current state was entered.
    state_entry_ms: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; SupervisorState::COUNT], initial: SupervisorState) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table rows out of order"
        );
        Self {
            table,
            current: initial as usize,
            state_entry_ms: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state at `ctx.now_ms`.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut SupervisorContext) {
        info!("Supervisor starting in state: {}", self.table[self.current].name);
        self.state_entry_ms = ctx.now_ms;
        ctx.ms_in_state = 0;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM to `ctx.now_ms`.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut SupervisorContext) {
        ctx.ms_in_state = ctx.now_ms.saturating_sub(self.state_entry_ms);

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> SupervisorState {
        SupervisorState::from_index(self.current)
    }

    /// Time spent in the current state as of `now_ms`.
    pub fn ms_in_current_state(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.state_entry_ms)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: SupervisorState, ctx: &mut SupervisorContext) {
        let next_idx = next_id as usize;

        info!(
            "Supervisor transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_ms = ctx.now_ms;
        ctx.ms_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::context::{SessionAttempt, SupervisorContext};
    use super::*;
    use crate::config::SystemConfig;

    const STEP_MS: u64 = 50;

    fn started() -> (Fsm, SupervisorContext) {
        let mut fsm = Fsm::new(states::build_state_table(), SupervisorState::LinkDown);
        let mut ctx = SupervisorContext::new(&SystemConfig::default());
        fsm.start(&mut ctx);
        (fsm, ctx)
    }

    /// One control period later.
    fn step(fsm: &mut Fsm, ctx: &mut SupervisorContext) {
        ctx.now_ms += STEP_MS;
        fsm.tick(ctx);
    }

    /// Drive the FSM from boot to `SessionConnected`.
    fn connected() -> (Fsm, SupervisorContext) {
        let (mut fsm, mut ctx) = started();
        ctx.link.link_up = true;
        step(&mut fsm, &mut ctx); // → SessionDown
        step(&mut fsm, &mut ctx); // → SessionConnecting
        ctx.link.session_connected = true;
        ctx.link.session_attempt = Some(SessionAttempt::Succeeded);
        step(&mut fsm, &mut ctx); // → SessionConnected
        assert_eq!(fsm.current_state(), SupervisorState::SessionConnected);
        (fsm, ctx)
    }

    #[test]
    fn boots_in_link_down_with_safe_zero() {
        let (fsm, ctx) = started();
        assert_eq!(fsm.current_state(), SupervisorState::LinkDown);
        assert!(ctx.commands.safe_zero);
        assert!(!ctx.commands.accept_measurements);
        assert!(ctx.commands.reconnect_link, "first link attempt is immediate");
    }

    #[test]
    fn time_in_state_follows_the_clock() {
        let (mut fsm, mut ctx) = started();
        step(&mut fsm, &mut ctx);
        assert_eq!(fsm.ms_in_current_state(ctx.now_ms), STEP_MS);
        ctx.now_ms += 5_000;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.ms_in_state, 5_000 + STEP_MS);
    }

    #[test]
    fn link_retry_uses_fixed_interval() {
        let (mut fsm, mut ctx) = started();
        ctx.commands.reconnect_link = false;
        let retry = ctx.link_retry_ms;

        let mut requests = 0;
        for _ in 0..(retry / STEP_MS) * 4 {
            step(&mut fsm, &mut ctx);
            if ctx.commands.reconnect_link {
                requests += 1;
                ctx.commands.reconnect_link = false;
            }
        }
        assert_eq!(requests, 4);
        assert_eq!(fsm.current_state(), SupervisorState::LinkDown);
    }

    #[test]
    fn link_retry_fires_once_after_a_stall() {
        let (mut fsm, mut ctx) = started();
        ctx.commands.reconnect_link = false;
        ctx.now_ms += ctx.link_retry_ms * 10;
        fsm.tick(&mut ctx);
        assert!(ctx.commands.reconnect_link);
        ctx.commands.reconnect_link = false;
        step(&mut fsm, &mut ctx);
        assert!(!ctx.commands.reconnect_link);
    }

    #[test]
    fn link_up_moves_to_session_down_then_connecting() {
        let (mut fsm, mut ctx) = started();
        ctx.link.link_up = true;
        step(&mut fsm, &mut ctx);
        assert_eq!(fsm.current_state(), SupervisorState::SessionDown);
        step(&mut fsm, &mut ctx);
        assert_eq!(fsm.current_state(), SupervisorState::SessionConnecting);
        assert!(ctx.commands.open_session);
    }

    #[test]
    fn failed_attempt_waits_retry_interval() {
        let (mut fsm, mut ctx) = started();
        ctx.link.link_up = true;
        step(&mut fsm, &mut ctx);
        step(&mut fsm, &mut ctx);
        ctx.commands.open_session = false;
        ctx.link.session_attempt = Some(SessionAttempt::Failed);
        step(&mut fsm, &mut ctx);
        assert_eq!(fsm.current_state(), SupervisorState::SessionDown);

        let steps = ctx.broker_retry_ms / STEP_MS;
        for _ in 0..steps - 1 {
            step(&mut fsm, &mut ctx);
            assert_eq!(fsm.current_state(), SupervisorState::SessionDown);
        }
        step(&mut fsm, &mut ctx);
        assert_eq!(fsm.current_state(), SupervisorState::SessionConnecting);
    }

    #[test]
    fn connected_accepts_measurements() {
        let (_fsm, ctx) = connected();
        assert!(ctx.commands.accept_measurements);
        assert!(!ctx.commands.safe_zero);
    }

    #[test]
    fn session_drop_forces_safe_zero() {
        let (mut fsm, mut ctx) = connected();
        ctx.link.session_connected = false;
        step(&mut fsm, &mut ctx);
        assert_eq!(fsm.current_state(), SupervisorState::SessionDown);
        assert!(ctx.commands.safe_zero);
        assert!(!ctx.commands.accept_measurements);
    }

    #[test]
    fn session_drop_retries_without_waiting() {
        let (mut fsm, mut ctx) = connected();
        ctx.link.session_connected = false;
        step(&mut fsm, &mut ctx);
        step(&mut fsm, &mut ctx);
        assert_eq!(fsm.current_state(), SupervisorState::SessionConnecting);
    }

    #[test]
    fn link_loss_from_any_state_goes_to_link_down() {
        for steps_to_advance in 0..3 {
            let (mut fsm, mut ctx) = started();
            ctx.link.link_up = true;
            ctx.link.session_connected = true;
            ctx.link.session_attempt = Some(SessionAttempt::Succeeded);
            for _ in 0..steps_to_advance {
                step(&mut fsm, &mut ctx);
            }
            ctx.link.link_up = false;
            step(&mut fsm, &mut ctx);
            assert_eq!(fsm.current_state(), SupervisorState::LinkDown);
            assert!(ctx.commands.safe_zero);
            assert!(ctx.commands.close_session);
        }
    }

    #[test]
    fn state_id_from_index_roundtrip() {
        for i in 0..SupervisorState::COUNT {
            let id = SupervisorState::from_index(i);
            assert_eq!(id as usize, i);
        }
    }

    #[test]
    fn table_rows_match_state_ids() {
        for (i, row) in states::build_state_table().iter().enumerate() {
            assert_eq!(row.id, SupervisorState::from_index(i));
        }
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn state_id_from_invalid_index_returns_link_down() {
        assert_eq!(SupervisorState::from_index(99), SupervisorState::LinkDown);
    }
}
