//! Price decoders for the two feed encodings
//!
//! Both produce an `f64` parsed from a decimal literal, so the result is the
//! correctly rounded double nearest the exact encoded value.

use crate::{DecodeError, DecodeResult};

/// Number of trailing digits that form the fraction in fixed-point prices
pub const FIXED_POINT_DECIMALS: usize = 8;

/// Decode a fixed-point digit string whose last 8 digits are the fraction.
///
/// `"123456789012"` decodes to `1234.56789012`.
pub fn decode_fixed_point_price(raw: &str) -> DecodeResult<f64> {
    let raw = raw.trim();
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::NotDigits(raw.to_string()));
    }
    if raw.len() <= FIXED_POINT_DECIMALS {
        return Err(DecodeError::TooShort {
            len: raw.len(),
            min: FIXED_POINT_DECIMALS + 1,
        });
    }

    let (whole, fraction) = raw.split_at(raw.len() - FIXED_POINT_DECIMALS);
    format!("{whole}.{fraction}")
        .parse::<f64>()
        .map_err(|e| DecodeError::OutOfRange(e.to_string()))
}

/// Decode `mantissa * 10^exponent`.
pub fn decode_exponent_price(mantissa: i64, exponent: i32) -> f64 {
    // Rust float parsing is correctly rounded and saturates to inf/0.
    format!("{mantissa}e{exponent}").parse::<f64>().unwrap_or(f64::NAN)
}
