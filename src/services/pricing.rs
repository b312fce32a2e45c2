//! Order price calculation: volume discount, regional tax and shipping, and
//! the deposit payment split.

use crate::{
    config::{DiscountTier, PricingConfig},
    entities::types::{PaymentModel, Region},
    errors::ServiceError,
};
use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Upper bound accepted for a unit price or unit cost.
pub const MAX_UNIT_PRICE: Decimal = dec!(1000000);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceLine {
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub discounted_subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub payment_model: PaymentModel,
    pub deposit_amount: Decimal,
    pub balance_due: Decimal,
    pub balance_due_date: Option<NaiveDate>,
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `quantity × unit_price`, rejecting values the decimal type cannot hold.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Result<Decimal, ServiceError> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| ServiceError::ValidationError("line total is out of range".to_string()))
}

/// Percent of the highest tier whose threshold the subtotal reaches.
pub fn discount_percent(subtotal: Decimal, tiers: &[DiscountTier]) -> Decimal {
    tiers
        .iter()
        .filter(|tier| subtotal >= tier.min_subtotal)
        .max_by(|a, b| a.min_subtotal.cmp(&b.min_subtotal))
        .map(|tier| tier.percent)
        .unwrap_or(Decimal::ZERO)
}

pub fn calculate_pricing(
    lines: &[PriceLine],
    region: Region,
    payment_model: PaymentModel,
    config: &PricingConfig,
    today: NaiveDate,
) -> Result<PriceBreakdown, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "an order needs at least one item".to_string(),
        ));
    }
    for line in lines {
        if line.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "item quantity must be positive".to_string(),
            ));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit price must not be negative".to_string(),
            ));
        }
        if line.unit_price > MAX_UNIT_PRICE {
            return Err(ServiceError::ValidationError(format!(
                "unit price must not exceed {}",
                MAX_UNIT_PRICE
            )));
        }
    }

    let mut subtotal = Decimal::ZERO;
    for line in lines {
        subtotal = subtotal
            .checked_add(line_total(line.quantity, line.unit_price)?)
            .ok_or_else(|| ServiceError::ValidationError("order subtotal is out of range".to_string()))?;
    }
    let subtotal = money(subtotal);
    let discount_percent = discount_percent(subtotal, &config.discount_tiers);
    let discount_amount = money(subtotal * discount_percent / Decimal::ONE_HUNDRED);
    let discounted_subtotal = subtotal - discount_amount;

    let tax_rate = region.tax_rate();
    let tax_amount = money(discounted_subtotal * tax_rate);
    let shipping_amount = if discounted_subtotal >= config.free_shipping_threshold {
        Decimal::ZERO
    } else {
        region.shipping_fee()
    };
    let total = discounted_subtotal + tax_amount + shipping_amount;

    let (deposit_amount, balance_due, balance_due_date) = match payment_model {
        PaymentModel::Full => (total, Decimal::ZERO, None),
        PaymentModel::Deposit => {
            let deposit = money(total * config.deposit_percent / Decimal::ONE_HUNDRED);
            (
                deposit,
                total - deposit,
                Some(today + Duration::days(config.balance_terms_days)),
            )
        }
    };

    Ok(PriceBreakdown {
        subtotal,
        discount_percent,
        discount_amount,
        discounted_subtotal,
        tax_rate,
        tax_amount,
        shipping_amount,
        total,
        currency: region.currency().to_string(),
        payment_model,
        deposit_amount,
        balance_due,
        balance_due_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_discount_tiers;
    use proptest::prelude::*;
    use rstest::rstest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[rstest]
    #[case(dec!(0), dec!(0))]
    #[case(dec!(999.99), dec!(0))]
    #[case(dec!(1000), dec!(10))]
    #[case(dec!(2499.99), dec!(10))]
    #[case(dec!(2500), dec!(15))]
    #[case(dec!(4999.99), dec!(15))]
    #[case(dec!(5000), dec!(20))]
    #[case(dec!(250000), dec!(20))]
    fn default_discount_steps(#[case] subtotal: Decimal, #[case] expected: Decimal) {
        assert_eq!(discount_percent(subtotal, &default_discount_tiers()), expected);
    }

    #[test]
    fn us_west_deposit_order() {
        let lines = vec![
            PriceLine {
                quantity: 10,
                unit_price: dec!(149.00),
            },
            PriceLine {
                quantity: 4,
                unit_price: dec!(95.00),
            },
        ];
        let price = calculate_pricing(
            &lines,
            Region::UsWest,
            PaymentModel::Deposit,
            &PricingConfig::default(),
            day(),
        )
        .unwrap();

        assert_eq!(price.subtotal, dec!(1870.00));
        assert_eq!(price.discount_percent, dec!(10));
        assert_eq!(price.discount_amount, dec!(187.00));
        assert_eq!(price.discounted_subtotal, dec!(1683.00));
        assert_eq!(price.tax_amount, dec!(147.26));
        assert_eq!(price.shipping_amount, Decimal::ZERO);
        assert_eq!(price.total, dec!(1830.26));
        assert_eq!(price.deposit_amount, dec!(183.03));
        assert_eq!(price.balance_due, dec!(1647.23));
        assert_eq!(price.balance_due_date, NaiveDate::from_ymd_opt(2025, 3, 31));
        assert_eq!(price.currency, "USD");
    }

    #[test]
    fn small_order_pays_regional_shipping() {
        let lines = vec![PriceLine {
            quantity: 2,
            unit_price: dec!(99.00),
        }];
        let price = calculate_pricing(
            &lines,
            Region::EuGermany,
            PaymentModel::Full,
            &PricingConfig::default(),
            day(),
        )
        .unwrap();

        assert_eq!(price.discount_percent, Decimal::ZERO);
        assert_eq!(price.tax_amount, dec!(37.62));
        assert_eq!(price.shipping_amount, dec!(35.00));
        assert_eq!(price.total, dec!(270.62));
        assert_eq!(price.deposit_amount, price.total);
        assert_eq!(price.balance_due, Decimal::ZERO);
        assert_eq!(price.balance_due_date, None);
    }

    #[test]
    fn rejects_invalid_lines() {
        let config = PricingConfig::default();
        assert!(calculate_pricing(&[], Region::Japan, PaymentModel::Full, &config, day()).is_err());
        let zero = [PriceLine {
            quantity: 0,
            unit_price: dec!(10),
        }];
        assert!(calculate_pricing(&zero, Region::Japan, PaymentModel::Full, &config, day()).is_err());
        let negative = [PriceLine {
            quantity: 1,
            unit_price: dec!(-1),
        }];
        assert!(
            calculate_pricing(&negative, Region::Japan, PaymentModel::Full, &config, day()).is_err()
        );
    }

    #[test]
    fn oversized_unit_price_is_a_validation_error() {
        let config = PricingConfig::default();
        for unit_price in [Decimal::MAX, MAX_UNIT_PRICE + dec!(0.01)] {
            let lines = [PriceLine { quantity: 2, unit_price }];
            let result =
                calculate_pricing(&lines, Region::UsWest, PaymentModel::Full, &config, day());
            assert!(matches!(result, Err(ServiceError::ValidationError(_))));
        }
    }

    #[test]
    fn largest_allowed_order_prices_without_overflow() {
        let lines = [
            PriceLine { quantity: i32::MAX, unit_price: MAX_UNIT_PRICE },
            PriceLine { quantity: i32::MAX, unit_price: MAX_UNIT_PRICE },
        ];
        let price = calculate_pricing(
            &lines,
            Region::EuGermany,
            PaymentModel::Deposit,
            &PricingConfig::default(),
            day(),
        )
        .unwrap();
        assert_eq!(price.discount_percent, dec!(20));
        assert_eq!(price.deposit_amount + price.balance_due, price.total);
    }

    #[test]
    fn line_total_rejects_overflow() {
        assert!(matches!(
            line_total(3, Decimal::MAX),
            Err(ServiceError::ValidationError(_))
        ));
        assert_eq!(line_total(4, dec!(2.50)).unwrap(), dec!(10.00));
    }

    proptest! {
        #[test]
        fn discount_is_step_function_of_subtotal(cents in 0i64..2_000_000) {
            let subtotal = Decimal::new(cents, 2);
            let expected = if subtotal >= dec!(5000) {
                dec!(20)
            } else if subtotal >= dec!(2500) {
                dec!(15)
            } else if subtotal >= dec!(1000) {
                dec!(10)
            } else {
                dec!(0)
            };
            prop_assert_eq!(discount_percent(subtotal, &default_discount_tiers()), expected);
        }

        #[test]
        fn deposit_and_balance_sum_to_total(qty in 1i32..500, cents in 0i64..100_000) {
            let lines = [PriceLine { quantity: qty, unit_price: Decimal::new(cents, 2) }];
            let price = calculate_pricing(
                &lines,
                Region::Australia,
                PaymentModel::Deposit,
                &PricingConfig::default(),
                day(),
            ).unwrap();
            prop_assert_eq!(price.deposit_amount + price.balance_due, price.total);
            prop_assert!(price.deposit_amount <= price.total);
        }
    }
}
