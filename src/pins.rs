//! GPIO / peripheral pin assignments for the limiter board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// RS485 transceiver (MAX3485, half duplex) → inverter
// ---------------------------------------------------------------------------

/// UART peripheral carrying the inverter link.
pub const RS485_UART_NUM: u32 = 1;
/// UART1 TXD → transceiver DI.
pub const RS485_TX_GPIO: i32 = 17;
/// UART1 RXD ← transceiver RO.  Unused by the protocol but wired for loopback checks.
pub const RS485_RX_GPIO: i32 = 18;
/// Driver enable (DE and /RE tied): HIGH while transmitting.
pub const RS485_DE_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// Compile-time sanity
// ---------------------------------------------------------------------------

const _: () = {
    assert!(RS485_TX_GPIO != RS485_RX_GPIO);
    assert!(RS485_DE_GPIO != RS485_TX_GPIO);
    assert!(RS485_DE_GPIO != RS485_RX_GPIO);
};
