//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.
//!
//! ```text
//!  LINK_DOWN ──[link up]──▶ SESSION_DOWN ──[hold elapsed]──▶ SESSION_CONNECTING
//!      ▲                        ▲    ▲                           │        │
//!      │                        │    └────────[attempt failed]───┘        │
//!      │                        │                                  [subscribed]
//!      │                        └──────[session dropped]──── SESSION_CONNECTED ◀┘
//!      │
//!  Any state ──[link lost]──▶ LINK_DOWN
//! ```

use super::SupervisorState;
use super::context::{SessionAttempt, SupervisorContext};
use super::StateDescriptor;
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; SupervisorState::COUNT] {
    [
        // Index 0 — LinkDown
        StateDescriptor {
            id: SupervisorState::LinkDown,
            name: "LinkDown",
            on_enter: Some(link_down_enter),
            on_exit: None,
            on_update: link_down_update,
        },
        // Index 1 — SessionDown
        StateDescriptor {
            id: SupervisorState::SessionDown,
            name: "SessionDown",
            on_enter: Some(session_down_enter),
            on_exit: None,
            on_update: session_down_update,
        },
        // Index 2 — SessionConnecting
        StateDescriptor {
            id: SupervisorState::SessionConnecting,
            name: "SessionConnecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_update: connecting_update,
        },
        // Index 3 — SessionConnected
        StateDescriptor {
            id: SupervisorState::SessionConnected,
            name: "SessionConnected",
            on_enter: Some(connected_enter),
            on_exit: Some(connected_exit),
            on_update: connected_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  LINK_DOWN — no WiFi, output forced to zero
// ═══════════════════════════════════════════════════════════════════════════

fn link_down_enter(ctx: &mut SupervisorContext) {
    ctx.commands.safe_zero = true;
    ctx.commands.accept_measurements = false;
    ctx.commands.close_session = true;
    ctx.request_link();
    ctx.session_hold_ms = 0;
    warn!("LINK_DOWN: output forced to zero, reconnecting WiFi");
}

fn link_down_update(ctx: &mut SupervisorContext) -> Option<SupervisorState> {
    if ctx.link.link_up {
        return Some(SupervisorState::SessionDown);
    }

    if ctx.now_ms.saturating_sub(ctx.last_link_request_ms) >= ctx.link_retry_ms {
        ctx.request_link();
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SESSION_DOWN — WiFi up, waiting before the next broker attempt
// ═══════════════════════════════════════════════════════════════════════════

fn session_down_enter(ctx: &mut SupervisorContext) {
    ctx.commands.safe_zero = true;
    ctx.commands.accept_measurements = false;
    if ctx.session_hold_ms > 0 {
        info!("SESSION_DOWN: next broker attempt in {} ms", ctx.session_hold_ms);
    }
}

fn session_down_update(ctx: &mut SupervisorContext) -> Option<SupervisorState> {
    if !ctx.link.link_up {
        return Some(SupervisorState::LinkDown);
    }

    if ctx.ms_in_state >= ctx.session_hold_ms {
        return Some(SupervisorState::SessionConnecting);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SESSION_CONNECTING — broker connect + subscribe requested
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut SupervisorContext) {
    ctx.link.session_attempt = None;
    ctx.commands.open_session = true;
    info!("SESSION_CONNECTING: opening broker session");
}

fn connecting_update(ctx: &mut SupervisorContext) -> Option<SupervisorState> {
    if !ctx.link.link_up {
        return Some(SupervisorState::LinkDown);
    }

    match ctx.take_attempt() {
        Some(SessionAttempt::Succeeded) if ctx.link.session_connected => {
            Some(SupervisorState::SessionConnected)
        }
        Some(_) => {
            ctx.session_hold_ms = ctx.broker_retry_ms;
            warn!("SESSION_CONNECTING: attempt failed");
            Some(SupervisorState::SessionDown)
        }
        None => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SESSION_CONNECTED — measurements drive the demand
// ═══════════════════════════════════════════════════════════════════════════

fn connected_enter(ctx: &mut SupervisorContext) {
    ctx.commands.safe_zero = false;
    ctx.commands.accept_measurements = true;
    info!("SESSION_CONNECTED: accepting measurements");
}

fn connected_exit(ctx: &mut SupervisorContext) {
    ctx.commands.safe_zero = true;
    ctx.commands.accept_measurements = false;
}

fn connected_update(ctx: &mut SupervisorContext) -> Option<SupervisorState> {
    if !ctx.link.link_up {
        return Some(SupervisorState::LinkDown);
    }

    if !ctx.link.session_connected {
        warn!("SESSION_CONNECTED: broker session lost");
        ctx.session_hold_ms = 0;
        return Some(SupervisorState::SessionDown);
    }

    None
}
