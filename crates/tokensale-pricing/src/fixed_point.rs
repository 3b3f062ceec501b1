//! WAD fixed-point arithmetic on `u128`.
//!
//! A WAD value `x` represents the real number `x / 10^18`. Helpers round
//! toward zero (except [`mul_wad_ceil`]) and return `None` instead of
//! overflowing, so callers can surface a typed error rather than panic.
//!
//! # Precision
//! `mul_wad` is exact up to one unit of the last place. The series used by
//! [`ln1p_wad`] and [`exp_wad`] run until the next term truncates to zero,
//! so each contributes at most a few units of `10^-18` error per term.
//! [`growth_factor`] therefore stays within `1e-15` relative error of the
//! true continuous value for any factor that fits, well inside the
//! `1e-6` absolute bound the price tests assert.

use tokensale_types::constants::{BPS_DENOMINATOR, WAD};

/// Series terms are capped so a pathological input cannot loop for long.
const MAX_SERIES_TERMS: u128 = 256;

/// `a * b / WAD` without a 256-bit intermediate.
#[must_use]
pub fn mul_wad(a: u128, b: u128) -> Option<u128> {
    let (a_int, a_frac) = (a / WAD, a % WAD);
    let (b_int, b_frac) = (b / WAD, b % WAD);
    // a*b/WAD = a_int*b + a_frac*b_int + a_frac*b_frac/WAD
    let high = a_int.checked_mul(b)?;
    let mid = a_frac.checked_mul(b_int)?;
    let low = a_frac * b_frac / WAD; // both < 10^18, product < 10^36
    high.checked_add(mid)?.checked_add(low)
}

/// `a * b / WAD` rounded up: any product with a non-zero remainder
/// costs one more base unit.
#[must_use]
pub fn mul_wad_ceil(a: u128, b: u128) -> Option<u128> {
    let floor = mul_wad(a, b)?;
    // The remainder of a*b mod WAD only comes from the fractional parts.
    if (a % WAD) * (b % WAD) % WAD == 0 {
        Some(floor)
    } else {
        floor.checked_add(1)
    }
}

/// `a * WAD / b`.
#[must_use]
pub fn div_wad(a: u128, b: u128) -> Option<u128> {
    if b == 0 {
        return None;
    }
    let whole = (a / b).checked_mul(WAD)?;
    let rem = (a % b).checked_mul(WAD)? / b;
    whole.checked_add(rem)
}

/// `amount * bps / 10_000`, exact floor, never overflows.
#[must_use]
pub fn apply_bps(amount: u128, bps: u32) -> u128 {
    let den = u128::from(BPS_DENOMINATOR);
    let bps = u128::from(bps.min(BPS_DENOMINATOR));
    (amount / den) * bps + (amount % den) * bps / den
}

/// `base^exp` for a WAD base and integer exponent, by repeated squaring.
#[must_use]
pub fn pow_wad(base: u128, mut exp: u64) -> Option<u128> {
    let mut result = WAD;
    let mut square = base;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_wad(result, square)?;
        }
        exp >>= 1;
        if exp > 0 {
            square = mul_wad(square, square)?;
        }
    }
    Some(result)
}

/// Natural log of `1 + x` for WAD `x >= 0`.
///
/// Uses `ln(1+x) = 2·atanh(z)` with `z = x / (2 + x)`, which lies in
/// `[0, 1)` for every non-negative `x`, so the odd power series converges
/// for all inputs (fast for the small rates a sale produces).
#[must_use]
pub fn ln1p_wad(x: u128) -> Option<u128> {
    if x == 0 {
        return Some(0);
    }
    let z = div_wad(x, WAD.checked_mul(2)?.checked_add(x)?)?;
    let z_sq = mul_wad(z, z)?;
    let mut power = z;
    let mut sum = z;
    let mut k: u128 = 3;
    while k < 2 * MAX_SERIES_TERMS {
        power = mul_wad(power, z_sq)?;
        let term = power / k;
        if term == 0 {
            break;
        }
        sum = sum.checked_add(term)?;
        k += 2;
    }
    sum.checked_mul(2)
}

/// `e^y` for WAD `y >= 0`, by Taylor series.
#[must_use]
pub fn exp_wad(y: u128) -> Option<u128> {
    let mut term = WAD;
    let mut sum = WAD;
    for k in 1..=MAX_SERIES_TERMS {
        term = mul_wad(term, y)? / k;
        if term == 0 {
            break;
        }
        sum = sum.checked_add(term)?;
    }
    Some(sum)
}

/// `(1 + rate)^days` for WAD `rate` and WAD `days`.
///
/// The whole-day part is compounded by repeated squaring; the fractional
/// remainder uses `exp(f · ln(1 + rate))`, so price moves continuously
/// within a day instead of stepping at day boundaries.
#[must_use]
pub fn growth_factor(rate: u128, days: u128) -> Option<u128> {
    if rate == 0 || days == 0 {
        return Some(WAD);
    }
    let whole_days = u64::try_from(days / WAD).ok()?;
    let frac_days = days % WAD;
    let whole = pow_wad(WAD.checked_add(rate)?, whole_days)?;
    if frac_days == 0 {
        return Some(whole);
    }
    let exponent = mul_wad(frac_days, ln1p_wad(rate)?)?;
    mul_wad(whole, exp_wad(exponent)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn to_f64(wad: u128) -> f64 {
        wad as f64 / WAD as f64
    }

    #[test]
    fn mul_wad_basic() {
        assert_eq!(mul_wad(2 * WAD, 3 * WAD), Some(6 * WAD));
        assert_eq!(mul_wad(WAD / 2, WAD / 2), Some(WAD / 4));
        assert_eq!(mul_wad(0, u128::MAX), Some(0));
    }

    #[test]
    fn mul_wad_large_operands() {
        // 10^12 whole units times 10^6 whole units: intermediate exceeds u128.
        let a = 1_000_000_000_000 * WAD;
        let b = 1_000_000 * WAD;
        assert_eq!(mul_wad(a, b), Some(1_000_000_000_000_000_000 * WAD));
    }

    #[test]
    fn mul_wad_overflow_is_none() {
        assert_eq!(mul_wad(u128::MAX, 2 * WAD), None);
    }

    #[test]
    fn mul_wad_ceil_rounds_remainders_up() {
        let cent = WAD / 100;
        // 99 base units at 0.01 floors to nothing.
        assert_eq!(mul_wad(99, cent), Some(0));
        assert_eq!(mul_wad_ceil(99, cent), Some(1));
        // Exact products are unchanged.
        assert_eq!(mul_wad_ceil(3 * WAD, cent), Some(3 * cent));
        assert_eq!(mul_wad_ceil(WAD / 2, WAD / 2), Some(WAD / 4));
        assert_eq!(mul_wad_ceil(0, cent), Some(0));
    }

    #[test]
    fn div_wad_basic() {
        assert_eq!(div_wad(WAD, 4 * WAD), Some(WAD / 4));
        assert_eq!(div_wad(3, 0), None);
    }

    #[test]
    fn apply_bps_exact() {
        assert_eq!(apply_bps(1000 * WAD, 2_500), 250 * WAD);
        assert_eq!(apply_bps(u128::MAX, 10_000), u128::MAX);
        assert_eq!(apply_bps(9_999, 5_000), 4_999);
    }

    #[test]
    fn pow_wad_integer_powers() {
        assert_eq!(pow_wad(2 * WAD, 10), Some(1024 * WAD));
        assert_eq!(pow_wad(5 * WAD, 0), Some(WAD));
        assert_eq!(pow_wad(u128::MAX / 2, 3), None);
    }

    #[test]
    fn ln1p_matches_reference() {
        for x in [1e-8_f64, 0.01, 0.5, 1.0, 3.0] {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let wad = (x * 1e18) as u128;
            let got = to_f64(ln1p_wad(wad).unwrap());
            assert!((got - x.ln_1p()).abs() < 1e-12, "ln1p({x}) = {got}");
        }
    }

    #[test]
    fn exp_matches_reference() {
        for y in [0.0_f64, 1e-6, 0.25, 1.0, 4.0] {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let wad = (y * 1e18) as u128;
            let got = to_f64(exp_wad(wad).unwrap());
            let want = y.exp();
            assert!((got - want).abs() / want < 1e-12, "exp({y}) = {got}");
        }
    }

    #[test]
    fn growth_factor_whole_days_exact() {
        // rate 5e-8 per day for one day: factor is exactly 1.00000005.
        let rate = 50_000_000_000;
        assert_eq!(growth_factor(rate, WAD), Some(WAD + rate));
    }

    #[test]
    fn growth_factor_fractional_days() {
        // (1.01)^0.5
        let rate = WAD / 100;
        let got = to_f64(growth_factor(rate, WAD / 2).unwrap());
        assert!((got - 1.01_f64.sqrt()).abs() < 1e-12, "got {got}");

        // (1.01)^365.25
        let got = to_f64(growth_factor(rate, 365 * WAD + WAD / 4).unwrap());
        let want = 1.01_f64.powf(365.25);
        assert!((got - want).abs() / want < 1e-10, "got {got}, want {want}");
    }

    #[test]
    fn growth_factor_monotonic_in_days() {
        let rate = WAD / 1_000;
        let mut last = 0;
        for hours in 0..96u128 {
            let f = growth_factor(rate, hours * WAD / 24).unwrap();
            assert!(f >= last, "factor decreased at hour {hours}");
            last = f;
        }
    }

    #[test]
    fn growth_factor_identity_cases() {
        assert_eq!(growth_factor(0, 10 * WAD), Some(WAD));
        assert_eq!(growth_factor(WAD, 0), Some(WAD));
    }
}
