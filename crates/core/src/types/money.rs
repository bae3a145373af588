//! Money helpers.
//!
//! Amounts are `rust_decimal::Decimal` in rupees with two decimal places.
//! Razorpay works in paise, so conversions in both directions live here.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Currency used for every amount in the marketplace.
pub const CURRENCY: &str = "INR";

/// Round to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a rupee amount to paise.
///
/// Returns `None` for negative amounts or amounts that overflow `i64`.
#[must_use]
pub fn to_paise(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }
    (round_money(amount) * Decimal::ONE_HUNDRED).to_i64()
}

/// Convert paise to a rupee amount.
#[must_use]
pub fn from_paise(paise: i64) -> Decimal {
    Decimal::new(paise, 2)
}

/// `percent` of `amount`, rounded to two decimal places.
#[must_use]
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_paise() {
        assert_eq!(to_paise(d("499.00")), Some(49_900));
        assert_eq!(to_paise(d("0.5")), Some(50));
        assert_eq!(to_paise(d("10.005")), Some(1001));
        assert_eq!(to_paise(d("-1")), None);
    }

    #[test]
    fn test_from_paise() {
        assert_eq!(from_paise(49_900), d("499.00"));
        assert_eq!(from_paise(1), d("0.01"));
    }

    #[test]
    fn test_percent_of_rounds_half_away_from_zero() {
        assert_eq!(percent_of(d("1000"), d("10")), d("100.00"));
        assert_eq!(percent_of(d("0.25"), d("10")), d("0.03"));
        assert_eq!(percent_of(d("333.33"), d("12.5")), d("41.67"));
    }
}
