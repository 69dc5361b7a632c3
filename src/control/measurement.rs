//! Grid-import payload parsing.
//!
//! The broker delivers the reading as ASCII text.  Parsing follows C
//! `atol` semantics: leading whitespace is skipped, an optional sign and
//! the leading run of digits are read, and anything else is ignored.  A
//! payload with no leading number reads as 0.  Values past the `i32`
//! range saturate.  No plausibility check is applied to the result.

/// Parse a measurement payload into watts.
pub fn parse_import_w(payload: &[u8]) -> i32 {
    let mut bytes = payload
        .iter()
        .copied()
        .skip_while(u8::is_ascii_whitespace)
        .peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let mut magnitude: i64 = 0;
    for b in bytes.take_while(u8::is_ascii_digit) {
        magnitude = (magnitude * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }

    let value = if negative { -magnitude } else { magnitude };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
