//! Quantity invariants and sale pricing
//!
//! Every mutation of a batch or allocation quantity in the engine goes through
//! [`checked_withdraw`] or [`checked_deposit`], so a quantity can never be
//! written below zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AllocationDetail, PricedLine};
use crate::types::AllocationId;

/// Length of the random suffix of a sale group id
const SALE_GROUP_SUFFIX_LEN: usize = 9;

/// Largest money amount a price or total column holds (`NUMERIC(14, 2)`)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity must be positive, got {0}")]
    NonPositive(i32),

    #[error("requested {requested} but only {available} available")]
    Insufficient { available: i32, requested: i32 },

    #[error("quantity overflow")]
    Overflow,

    #[error("amount exceeds {}", MAX_AMOUNT)]
    AmountOverflow,
}

/// Remaining quantity after taking `requested` out of `available`
pub fn checked_withdraw(available: i32, requested: i32) -> Result<i32, QuantityError> {
    if requested <= 0 {
        return Err(QuantityError::NonPositive(requested));
    }
    if requested > available {
        return Err(QuantityError::Insufficient {
            available,
            requested,
        });
    }
    Ok(available - requested)
}

/// Quantity after putting `amount` back into `current`
pub fn checked_deposit(current: i32, amount: i32) -> Result<i32, QuantityError> {
    if amount <= 0 {
        return Err(QuantityError::NonPositive(amount));
    }
    current.checked_add(amount).ok_or(QuantityError::Overflow)
}

/// Sum requested quantities per allocation, so that two lines drawing on the
/// same allocation are checked against its stock together.
pub fn requested_per_allocation(
    lines: &[(AllocationId, i32)],
) -> Result<BTreeMap<AllocationId, i32>, QuantityError> {
    let mut totals = BTreeMap::new();
    for &(allocation_id, quantity) in lines {
        let entry = totals.entry(allocation_id).or_insert(0i32);
        *entry = entry.checked_add(quantity).ok_or(QuantityError::Overflow)?;
    }
    Ok(totals)
}

/// Reject amounts a money column cannot store
pub fn bounded_amount(amount: Decimal) -> Result<Decimal, QuantityError> {
    if amount.abs() > MAX_AMOUNT {
        return Err(QuantityError::AmountOverflow);
    }
    Ok(amount)
}

/// Line total rounded to cents
pub fn line_total(unit_price: Decimal, quantity: i32) -> Result<Decimal, QuantityError> {
    let total = unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or(QuantityError::AmountOverflow)?;
    bounded_amount(total.round_dp(2))
}

/// Price one line: the custom price wins over the batch price
pub fn price_line(
    detail: &AllocationDetail,
    quantity: i32,
    custom_price: Option<Decimal>,
) -> Result<PricedLine, QuantityError> {
    let unit_price = custom_price.unwrap_or(detail.unit_price);
    Ok(PricedLine {
        allocation_id: detail.id(),
        product_name: detail.product_name.clone(),
        quantity,
        unit_price,
        line_total: line_total(unit_price, quantity)?,
    })
}

/// Sum of line totals, bounded like a single amount
pub fn checked_total(
    totals: impl IntoIterator<Item = Decimal>,
) -> Result<Decimal, QuantityError> {
    totals.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount)
            .ok_or(QuantityError::AmountOverflow)
            .and_then(bounded_amount)
    })
}

/// Total of a checkout
pub fn sale_total<'a>(
    lines: impl IntoIterator<Item = &'a PricedLine>,
) -> Result<Decimal, QuantityError> {
    checked_total(lines.into_iter().map(|l| l.line_total))
}

/// Unit price of a batch: dollar cost times the exchange rate, in cents
pub fn batch_unit_price(
    unit_cost_usd: Decimal,
    exchange_rate: Decimal,
) -> Result<Decimal, QuantityError> {
    let price = unit_cost_usd
        .checked_mul(exchange_rate)
        .ok_or(QuantityError::AmountOverflow)?;
    bounded_amount(price.round_dp(2))
}

/// Build a sale group id of the form `sale_<unix seconds>_<9 alphanumerics>`
pub fn generate_sale_group_id(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SALE_GROUP_SUFFIX_LEN)
        .collect();
    format!("sale_{}_{}", now.timestamp(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Allocation;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn detail(id: AllocationId, price: &str) -> AllocationDetail {
        let now = Utc::now();
        AllocationDetail {
            allocation: Allocation {
                id,
                batch_id: 1,
                agent_id: Some(10),
                quantity: 5,
                active: true,
                agent_name: Some("Ana".to_string()),
                created_at: now,
                updated_at: now,
            },
            product_name: "AirPods Pro".to_string(),
            unit_price: dec(price),
            description: None,
            color: None,
            serial_number: None,
            barcode: None,
        }
    }

    #[test]
    fn test_withdraw_within_stock() {
        assert_eq!(checked_withdraw(5, 3), Ok(2));
        assert_eq!(checked_withdraw(5, 5), Ok(0));
    }

    #[test]
    fn test_withdraw_more_than_available() {
        assert_eq!(
            checked_withdraw(5, 6),
            Err(QuantityError::Insufficient {
                available: 5,
                requested: 6
            })
        );
    }

    #[test]
    fn test_withdraw_rejects_non_positive() {
        assert_eq!(checked_withdraw(5, 0), Err(QuantityError::NonPositive(0)));
        assert_eq!(checked_withdraw(5, -2), Err(QuantityError::NonPositive(-2)));
    }

    #[test]
    fn test_deposit() {
        assert_eq!(checked_deposit(3, 2), Ok(5));
        assert_eq!(checked_deposit(0, 0), Err(QuantityError::NonPositive(0)));
        assert_eq!(checked_deposit(i32::MAX, 1), Err(QuantityError::Overflow));
    }

    #[test]
    fn test_requested_per_allocation_sums_duplicates() {
        let totals = requested_per_allocation(&[(7, 2), (3, 1), (7, 3)]).unwrap();
        assert_eq!(totals.get(&7), Some(&5));
        assert_eq!(totals.get(&3), Some(&1));
        // Ordered by allocation id, which is also the lock order
        assert_eq!(totals.keys().copied().collect::<Vec<_>>(), vec![3, 7]);
    }

    #[test]
    fn test_price_line_uses_batch_price_by_default() {
        let line = price_line(&detail(1, "199.90"), 2, None).unwrap();
        assert_eq!(line.unit_price, dec("199.90"));
        assert_eq!(line.line_total, dec("399.80"));
    }

    #[test]
    fn test_price_line_custom_price_overrides() {
        let line = price_line(&detail(1, "199.90"), 3, Some(dec("150"))).unwrap();
        assert_eq!(line.unit_price, dec("150"));
        assert_eq!(line.line_total, dec("450.00"));
    }

    #[test]
    fn test_sale_total_sums_lines() {
        let lines = vec![
            price_line(&detail(1, "10.00"), 2, None).unwrap(),
            price_line(&detail(2, "5.50"), 1, None).unwrap(),
        ];
        assert_eq!(sale_total(&lines), Ok(dec("25.50")));
    }

    #[test]
    fn test_batch_unit_price() {
        assert_eq!(batch_unit_price(dec("500"), dec("5.2345")), Ok(dec("2617.25")));
    }

    #[test]
    fn test_max_amount_matches_column_precision() {
        assert_eq!(MAX_AMOUNT, dec("999999999999.99"));
    }

    #[test]
    fn test_line_total_beyond_decimal_range() {
        assert_eq!(
            line_total(Decimal::MAX, 2),
            Err(QuantityError::AmountOverflow)
        );
        assert!(price_line(&detail(1, "10.00"), 2, Some(Decimal::MAX)).is_err());
    }

    #[test]
    fn test_line_total_beyond_column_precision() {
        assert_eq!(line_total(MAX_AMOUNT, 1), Ok(MAX_AMOUNT));
        assert_eq!(line_total(MAX_AMOUNT, 2), Err(QuantityError::AmountOverflow));
    }

    #[test]
    fn test_sale_total_overflow() {
        let lines = vec![
            price_line(&detail(1, "10.00"), 1, Some(MAX_AMOUNT)).unwrap(),
            price_line(&detail(2, "10.00"), 1, None).unwrap(),
        ];
        assert_eq!(sale_total(&lines), Err(QuantityError::AmountOverflow));
        assert_eq!(
            checked_total([Decimal::MAX, Decimal::MAX]),
            Err(QuantityError::AmountOverflow)
        );
    }

    #[test]
    fn test_batch_unit_price_overflow() {
        assert_eq!(
            batch_unit_price(Decimal::MAX, dec("5.25")),
            Err(QuantityError::AmountOverflow)
        );
        assert_eq!(
            batch_unit_price(dec("999999999999"), dec("5.25")),
            Err(QuantityError::AmountOverflow)
        );
    }

    #[test]
    fn test_sale_group_id_format() {
        let now = Utc::now();
        let id = generate_sale_group_id(now);
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "sale");
        assert_eq!(parts[1], now.timestamp().to_string());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_sale_group_ids_are_unique() {
        let now = Utc::now();
        let a = generate_sale_group_id(now);
        let b = generate_sale_group_id(now);
        assert_ne!(a, b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Withdraw never produces a negative quantity
        #[test]
        fn prop_withdraw_never_negative(available in 0i32..1000, requested in -10i32..1200) {
            match checked_withdraw(available, requested) {
                Ok(left) => {
                    prop_assert!(left >= 0);
                    prop_assert_eq!(left + requested, available);
                }
                Err(_) => prop_assert!(requested <= 0 || requested > available),
            }
        }

        /// Withdraw then deposit of the same amount restores the quantity
        #[test]
        fn prop_withdraw_deposit_restores(available in 1i32..1000, requested in 1i32..1000) {
            prop_assume!(requested <= available);
            let left = checked_withdraw(available, requested).unwrap();
            prop_assert_eq!(checked_deposit(left, requested).unwrap(), available);
        }
    }
}
