//! Merchant settlement arithmetic.
//!
//! A settlement covers the store's delivered, paid orders in a period. The
//! merchant is owed the item subtotal minus the platform commission; the
//! delivery fee stays with the platform and is not part of the payout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, percent_of, round_money};

/// One order's contribution to a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementLine {
    pub order_id: OrderId,
    pub subtotal: Decimal,
}

/// Totals for a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTotals {
    pub order_count: i64,
    pub gross_amount: Decimal,
    pub commission_amount: Decimal,
    pub net_amount: Decimal,
}

/// Compute the payout for `lines` at `commission_percent`.
///
/// Commission is taken on the summed gross, not per order, so rounding
/// happens once.
#[must_use]
pub fn compute(lines: &[SettlementLine], commission_percent: Decimal) -> SettlementTotals {
    let gross_amount = round_money(lines.iter().map(|l| l.subtotal).sum());
    let commission_amount = percent_of(gross_amount, commission_percent);
    let order_count = i64::try_from(lines.len()).unwrap_or(i64::MAX);

    SettlementTotals {
        order_count,
        gross_amount,
        commission_amount,
        net_amount: gross_amount - commission_amount,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn line(id: i64, subtotal: &str) -> SettlementLine {
        SettlementLine {
            order_id: OrderId::new(id),
            subtotal: Decimal::from_str(subtotal).unwrap(),
        }
    }

    #[test]
    fn test_empty_settlement_is_zero() {
        let totals = compute(&[], Decimal::TEN);
        assert_eq!(totals.order_count, 0);
        assert_eq!(totals.gross_amount, Decimal::ZERO);
        assert_eq!(totals.net_amount, Decimal::ZERO);
    }

    #[test]
    fn test_commission_on_summed_gross() {
        let lines = [line(1, "199.99"), line(2, "0.01"), line(3, "300.00")];
        let totals = compute(&lines, Decimal::from_str("12.5").unwrap());

        assert_eq!(totals.order_count, 3);
        assert_eq!(totals.gross_amount, Decimal::from_str("500.00").unwrap());
        assert_eq!(totals.commission_amount, Decimal::from_str("62.50").unwrap());
        assert_eq!(totals.net_amount, Decimal::from_str("437.50").unwrap());
    }

    #[test]
    fn test_net_plus_commission_equals_gross() {
        let lines = [line(1, "333.33"), line(2, "333.33"), line(3, "333.34")];
        let totals = compute(&lines, Decimal::from_str("7.5").unwrap());
        assert_eq!(
            totals.net_amount + totals.commission_amount,
            totals.gross_amount
        );
    }
}
