//! Pricing resolver seam.
//!
//! The ledger never decides pricing policy: the order workflow asks a
//! [`PricingResolver`] for a unit price and treats the answer as
//! authoritative. [`DiscountTable`] is the implementation backed by
//! `pricing.toml`.

use crate::{
    config::pricing::{PlanConfig, PricingConfig},
    entities::{OrderType, PricingGroup},
    errors::Result,
    ledger::round2,
};

/// Inputs available when pricing one package of an order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuery<'a> {
    /// Group chosen at checkout
    pub group: Option<PricingGroup>,
    /// Plan chosen at checkout
    pub plan_id: Option<&'a str>,
    /// Kind of sale
    pub order_type: OrderType,
    /// Product's base price per package
    pub base_price: f64,
}

/// Resolves the unit price of an order.
///
/// Implementations must be deterministic and return a finite, non-negative
/// price.
pub trait PricingResolver: Send + Sync {
    /// Price of one package for `query`.
    fn resolve_unit_price(&self, query: &PriceQuery<'_>) -> Result<f64>;
}

/// Discount multipliers per group and per named plan.
#[derive(Debug, Clone, Default)]
pub struct DiscountTable {
    config: PricingConfig,
}

impl DiscountTable {
    /// Wraps an already validated configuration.
    #[must_use]
    pub const fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Configured plans.
    #[must_use]
    pub fn plans(&self) -> &[PlanConfig] {
        &self.config.plans
    }

    /// Multiplier applied to the base price.
    ///
    /// An explicit plan id wins; then the first plan of the group; then the
    /// group default. The group is inferred from the order type when absent.
    /// Gifts with no group are free and everything else pays full price.
    #[must_use]
    pub fn discount_for(&self, query: &PriceQuery<'_>) -> f64 {
        if let Some(plan) = query
            .plan_id
            .and_then(|id| self.config.plans.iter().find(|plan| plan.id == id))
        {
            return plan.discount;
        }

        let group = query
            .group
            .or_else(|| PricingGroup::for_order_type(query.order_type));
        match group {
            Some(group) => self
                .config
                .plans
                .iter()
                .find(|plan| plan.group == group)
                .map_or_else(|| self.group_default(group), |plan| plan.discount),
            None if query.order_type == OrderType::Gift => 0.0,
            None => 1.0,
        }
    }

    const fn group_default(&self, group: PricingGroup) -> f64 {
        match group {
            PricingGroup::SelfUse => self.config.defaults.self_use,
            PricingGroup::Vip => self.config.defaults.vip,
            PricingGroup::Temp => self.config.defaults.temp,
        }
    }
}

impl PricingResolver for DiscountTable {
    fn resolve_unit_price(&self, query: &PriceQuery<'_>) -> Result<f64> {
        Ok(round2(query.base_price * self.discount_for(query)))
    }
}
