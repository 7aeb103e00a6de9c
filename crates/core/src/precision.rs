//! Decimal precision helpers
//!
//! All amounts are `rust_decimal::Decimal` and every intermediate result is
//! truncated toward zero, so compounding three conversions can never round
//! a cycle into a false profit.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for amounts, prices and percentages
pub const AMOUNT_SCALE: u32 = 12;

/// Truncate toward zero at [`AMOUNT_SCALE`]
pub fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToZero)
}

/// `1 - fee_rate`, the share of output kept after a taker fee
pub fn fee_multiplier(fee_rate: Decimal) -> Decimal {
    truncate(Decimal::ONE - fee_rate)
}

/// `numerator / denominator`, truncated; `None` on a zero denominator
pub fn checked_ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    numerator.checked_div(denominator).map(truncate)
}

/// `(value - base) / base * 100`, truncated; zero when `base` is zero
pub fn percent_change(base: Decimal, value: Decimal) -> Decimal {
    checked_ratio((value - base) * Decimal::ONE_HUNDRED, base).unwrap_or(Decimal::ZERO)
}

/// Absolute relative deviation of `actual` from `reference`, in percent
pub fn deviation_pct(reference: Decimal, actual: Decimal) -> Decimal {
    percent_change(reference, actual).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_truncate_never_rounds_up() {
        assert_eq!(truncate(dec!(0.9999999999999999)), dec!(0.999999999999));
        assert_eq!(truncate(dec!(1.0000000000009)), dec!(1.000000000000));
    }

    #[test]
    fn test_fee_multiplier() {
        assert_eq!(fee_multiplier(dec!(0.001)), dec!(0.999));
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(dec!(1000), dec!(1001)), dec!(0.1));
        assert_eq!(percent_change(dec!(1000), dec!(990)), dec!(-1));
        assert_eq!(percent_change(Decimal::ZERO, dec!(5)), Decimal::ZERO);
    }

    #[test]
    fn test_checked_ratio_zero_denominator() {
        assert!(checked_ratio(dec!(1), Decimal::ZERO).is_none());
        assert_eq!(checked_ratio(dec!(1), dec!(3)), Some(dec!(0.333333333333)));
    }

    #[test]
    fn test_deviation_is_absolute() {
        assert_eq!(deviation_pct(dec!(100), dec!(101)), dec!(1));
        assert_eq!(deviation_pct(dec!(100), dec!(99)), dec!(1));
    }
}
