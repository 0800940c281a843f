//! Shipping and tax computation.

use common::Money;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Pricing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingConfig {
    /// Subtotals at or above this ship free.
    pub free_shipping_threshold: Money,
    pub standard_shipping_fee: Money,
    /// Flat tax rate applied to the items subtotal (0.10 = 10%).
    pub tax_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::new(500_000),
            standard_shipping_fee: Money::new(30_000),
            tax_rate: Decimal::new(10, 2),
        }
    }
}

/// Price components of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub items: Money,
    pub shipping: Money,
    pub tax: Money,
}

impl PriceBreakdown {
    pub fn new(items: Money, shipping: Money, tax: Money) -> Self {
        Self {
            items,
            shipping,
            tax,
        }
    }

    /// Returns `items + shipping + tax`, or `None` if it overflows.
    pub fn total(&self) -> Option<Money> {
        Money::checked_sum([self.items, self.shipping, self.tax])
    }
}

/// Pure shipping and tax calculator.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Returns the shipping fee for an items subtotal.
    pub fn shipping_fee(&self, subtotal: Money) -> Money {
        if subtotal >= self.config.free_shipping_threshold {
            Money::zero()
        } else {
            self.config.standard_shipping_fee
        }
    }

    /// Returns the tax on an items subtotal, rounded half away from zero to
    /// whole minor units.
    pub fn tax(&self, subtotal: Money) -> Money {
        let tax = (Decimal::from(subtotal.minor_units()) * self.config.tax_rate)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Money::new(tax.to_i64().unwrap_or(i64::MAX))
    }

    /// Prices an items subtotal.
    pub fn quote(&self, subtotal: Money) -> PriceBreakdown {
        PriceBreakdown::new(subtotal, self.shipping_fee(subtotal), self.tax(subtotal))
    }
}
