//! Inverter command frame codec.
//!
//! Wire format (8 bytes, sent verbatim on the RS485 link):
//! ```text
//! ┌────┬────┬────┬────┬─────────┬─────────┬────┬──────────┐
//! │ 24 │ 56 │ 00 │ 21 │ demand  │ demand  │ 80 │ checksum │
//! │    │    │    │    │  high   │  low    │    │          │
//! └────┴────┴────┴────┴─────────┴─────────┴────┴──────────┘
//! ```
//!
//! `demand = high * 256 + low` in watts.  The checksum is
//! `264 - high - low`; results above 256 are replaced by the fixed
//! fallback `8` instead of being wrapped.  The guard is `> 256`, so a
//! raw value of exactly 256 goes out as `0x00`.  Inverters in the field
//! accept this exact arithmetic, so it is reproduced bit for bit.

use core::fmt;

/// Total frame length on the wire.
pub const FRAME_LEN: usize = 8;

/// Constant frame preamble.
pub const HEADER: [u8; 4] = [0x24, 0x56, 0x00, 0x21];

/// Constant byte between the demand and the checksum.
pub const TRAILER: u8 = 0x80;

/// Replacement checksum when the raw value leaves the guarded range.
pub const CHECKSUM_FALLBACK: u8 = 8;

const CHECKSUM_BASE: i32 = 264;
const CHECKSUM_LIMIT: i32 = 256;

const DEMAND_HIGH: usize = 4;
const DEMAND_LOW: usize = 5;
const TRAILER_POS: usize = 6;
const CHECKSUM_POS: usize = 7;

/// One fully encoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// The fail-safe frame commanding zero output.
    pub const SAFE_ZERO: Self = encode(0);

    /// Raw bytes, ready for the UART.
    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Demand (W) carried by this frame.
    pub const fn demand(&self) -> u16 {
        u16::from_be_bytes([self.0[DEMAND_HIGH], self.0[DEMAND_LOW]])
    }

    pub const fn checksum(&self) -> u8 {
        self.0[CHECKSUM_POS]
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Checksum over the two demand bytes.
pub const fn checksum(high: u8, low: u8) -> u8 {
    let raw = CHECKSUM_BASE - high as i32 - low as i32;
    if raw > CHECKSUM_LIMIT {
        CHECKSUM_FALLBACK
    } else {
        raw.rem_euclid(256) as u8
    }
}

/// Encode `demand_w` into a command frame.
///
/// The caller clamps `demand_w` to the configured output limit first;
/// the codec carries any `u16` but only values up to a few kW keep the
/// checksum in its positive range.
pub const fn encode(demand_w: u16) -> CommandFrame {
    let [high, low] = demand_w.to_be_bytes();
    CommandFrame([
        HEADER[0],
        HEADER[1],
        HEADER[2],
        HEADER[3],
        high,
        low,
        TRAILER,
        checksum(high, low),
    ])
}

// ───────────────────────────────────────────────────────────────
// Decoding (loopback verification, fuzzing)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    WrongLength(usize),
    BadHeader,
    BadTrailer,
    BadChecksum { expected: u8, actual: u8 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength(n) => write!(f, "expected {FRAME_LEN} bytes, got {n}"),
            Self::BadHeader => write!(f, "header mismatch"),
            Self::BadTrailer => write!(f, "trailer mismatch"),
            Self::BadChecksum { expected, actual } => {
                write!(f, "checksum 0x{actual:02X}, expected 0x{expected:02X}")
            }
        }
    }
}

/// Parse a received frame back into its demand value.
pub fn decode(bytes: &[u8]) -> Result<u16, FrameError> {
    let raw: &[u8; FRAME_LEN] = bytes
        .try_into()
        .map_err(|_| FrameError::WrongLength(bytes.len()))?;

    if raw[..HEADER.len()] != HEADER {
        return Err(FrameError::BadHeader);
    }
    if raw[TRAILER_POS] != TRAILER {
        return Err(FrameError::BadTrailer);
    }

    let expected = checksum(raw[DEMAND_HIGH], raw[DEMAND_LOW]);
    let actual = raw[CHECKSUM_POS];
    if expected != actual {
        return Err(FrameError::BadChecksum { expected, actual });
    }

    Ok(u16::from_be_bytes([raw[DEMAND_HIGH], raw[DEMAND_LOW]]))
}
