//! Fixed-point arithmetic helpers.
//!
//! Token amounts are normalized to a single 1e18 base (WAD) before any pool
//! math; USD prices are fixed-point at 1e8. Intermediate products use
//! 256-bit limb arithmetic so `mul_div` never overflows silently.

use crate::error::{Error, ValidationError};
use crate::Result;

/// 1.0 in the common amount base (18 decimals).
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// 1.0 USD in price fixed-point (8 decimals).
pub const PRICE_SCALE: u128 = 100_000_000;

/// Basis-point denominator (10000 = 100%).
pub const BPS_DENOM: u128 = 10_000;

const MASK64: u128 = (1u128 << 64) - 1;

pub fn pow10(exp: u8) -> u128 {
    10u128.pow(exp as u32)
}

/// Scale a raw token amount (native decimal count) up to WAD.
pub fn to_wad(amount: u128, decimals: u8) -> Result<u128> {
    debug_assert!(decimals <= 18);
    amount
        .checked_mul(pow10(18 - decimals))
        .ok_or(Error::Validation(ValidationError::NumericOverflow))
}

/// Scale a WAD amount back down to a raw token amount (floor).
pub fn from_wad(amount_wad: u128, decimals: u8) -> u128 {
    debug_assert!(decimals <= 18);
    amount_wad / pow10(18 - decimals)
}

/// Full 128x128 -> 256 bit multiply, returned as (hi, lo).
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    let (a_hi, a_lo) = (a >> 64, a & MASK64);
    let (b_hi, b_lo) = (b >> 64, b & MASK64);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK64) + (hl & MASK64);
    let lo = (mid << 64) | (ll & MASK64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// Restoring long division of a 256-bit value by a 128-bit divisor.
/// Returns `None` when the divisor is zero or the quotient exceeds 128 bits.
fn div_wide(hi: u128, lo: u128, divisor: u128) -> Option<u128> {
    if divisor == 0 || hi >= divisor {
        return None;
    }
    if hi == 0 {
        return Some(lo / divisor);
    }

    let mut rem: u128 = 0;
    let mut quo: u128 = 0;
    for i in (0..256).rev() {
        let bit = if i >= 128 {
            (hi >> (i - 128)) & 1
        } else {
            (lo >> i) & 1
        };
        // Track the bit shifted out of `rem`; `rem < divisor <= u128::MAX`
        // so a set carry always means `rem*2 + bit >= divisor`.
        let carry = rem >> 127;
        rem = (rem << 1) | bit;
        quo <<= 1;
        if carry == 1 || rem >= divisor {
            rem = rem.wrapping_sub(divisor);
            quo |= 1;
        }
    }
    Some(quo)
}

/// `a * b / d` with a 256-bit intermediate, flooring.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128> {
    let (hi, lo) = mul_wide(a, b);
    div_wide(hi, lo, d).ok_or(Error::Validation(ValidationError::NumericOverflow))
}

/// Integer square root (Newton's method).
pub fn isqrt(x: u128) -> u128 {
    if x == 0 {
        return 0;
    }
    let mut guess = x / 2 + 1;
    let mut next = (guess + x / guess) / 2;
    while next < guess {
        guess = next;
        next = (guess + x / guess) / 2;
    }
    guess
}

/// `part * 10000 / whole`, flooring. Zero whole yields zero.
pub fn share_bps(part: u128, whole: u128) -> Result<u128> {
    if whole == 0 {
        return Ok(0);
    }
    mul_div(part, BPS_DENOM, whole)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_small_values() {
        assert_eq!(mul_div(6, 7, 3).unwrap(), 14);
        assert_eq!(mul_div(10, 10, 3).unwrap(), 33);
        assert_eq!(mul_div(0, u128::MAX, 5).unwrap(), 0);
    }

    #[test]
    fn mul_div_wide_intermediate() {
        // (2^127) * 4 / 2^127 would overflow u128 in the middle
        let big = 1u128 << 127;
        assert_eq!(mul_div(big, 4, big).unwrap(), 4);
        assert_eq!(mul_div(big, big, big).unwrap(), big);
        // Quotient over 128 bits must error, not wrap
        assert!(mul_div(big, 4, 1).is_err());
    }

    #[test]
    fn mul_div_zero_divisor_errors() {
        assert!(mul_div(1, 1, 0).is_err());
    }

    #[test]
    fn wad_roundtrip_by_decimals() {
        // 1.0 of a 6-decimal token
        let wad = to_wad(1_000_000, 6).unwrap();
        assert_eq!(wad, WAD);
        assert_eq!(from_wad(wad, 6), 1_000_000);
        // 18-decimal tokens pass through
        assert_eq!(to_wad(123, 18).unwrap(), 123);
    }

    #[test]
    fn isqrt_exact_and_floor() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(WAD * WAD), WAD);
    }

    #[test]
    fn share_bps_handles_zero_total() {
        assert_eq!(share_bps(5, 0).unwrap(), 0);
        assert_eq!(share_bps(1, 4).unwrap(), 2500);
    }
}
