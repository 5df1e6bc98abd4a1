//! Order business logic - Quoting and committing sales.
//!
//! A sale consumes finished goods first and falls back to the product recipe
//! for the remainder. [`validate_order`] runs the read-only half (availability
//! and price) and [`create_order`] runs the same checks inside a write
//! transaction before deducting anything.

use crate::{
    entities::{Order, OrderType, Payment, PricingGroup, RefType, order, product, recipe_line},
    errors::{Error, Result},
    ledger::{
        Ledger,
        movement::Cause,
        pricing::{PriceQuery, PricingResolver},
        round2,
        stock::{MaterialRequirements, check_requirements, deduct_finished_goods, deduct_material},
        store::{find_product, recipe_for},
    },
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Input for [`validate_order`] and [`create_order`].
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    /// Kind of sale, `retail` unless set
    pub order_type: OrderType,
    /// Product sold
    pub product_id: i64,
    /// Packages sold
    pub qty: i32,
    /// Person picking up the order
    pub person: String,
    /// Payment channel
    pub payment: Option<Payment>,
    /// Pricing group chosen at checkout
    pub pricing_group: Option<PricingGroup>,
    /// Pricing plan chosen at checkout
    pub pricing_plan_id: Option<String>,
    /// Free-form note
    pub remark: Option<String>,
    /// Amount to persist instead of the computed receivable
    pub receivable_override: Option<f64>,
    /// Why the override was applied
    pub override_reason: Option<String>,
}

/// Price and stock split of an order that has not been committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderQuote {
    /// `round2(unit × qty)`
    pub receivable: f64,
    /// Resolved unit price
    pub per_pack_price: f64,
    /// Packages that would come from finished goods
    pub used_finished: i32,
    /// Packages that would be made from materials
    pub used_from_raw: i32,
}

/// Returned by [`create_order`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    /// Id of the new order
    pub id: i64,
    /// Amount computed from pricing, returned even when an override applies
    pub receivable: f64,
    /// Amount persisted on the order, equal to `receivable` without an override
    pub persisted_receivable: f64,
    /// Commit time
    pub created_at: DateTime<Utc>,
}

struct Plan {
    product: product::Model,
    recipe: Vec<recipe_line::Model>,
    quote: OrderQuote,
}

/// Runs every check of an order and prices it.
async fn plan_order<C>(db: &C, pricing: &dyn PricingResolver, new: &NewOrder) -> Result<Plan>
where
    C: ConnectionTrait,
{
    if new.qty <= 0 {
        return Err(Error::validation("qty must be greater than 0"));
    }
    let product = find_product(db, new.product_id).await?;

    let used_finished = product.stock.clamp(0, new.qty);
    let used_from_raw = new.qty - used_finished;

    let mut recipe = Vec::new();
    if used_from_raw > 0 {
        recipe = recipe_for(db, product.id).await?;
        let mut requirements = MaterialRequirements::new();
        requirements.add_recipe(&recipe, used_from_raw);
        check_requirements(db, &requirements).await?;
    }

    let unit = pricing.resolve_unit_price(&PriceQuery {
        group: new.pricing_group,
        plan_id: new.pricing_plan_id.as_deref(),
        order_type: new.order_type,
        base_price: product.price_base,
    })?;
    if !unit.is_finite() || unit < 0.0 {
        return Err(Error::Internal {
            message: format!("pricing resolver returned invalid unit price {unit}"),
        });
    }

    Ok(Plan {
        quote: OrderQuote {
            receivable: round2(unit * f64::from(new.qty)),
            per_pack_price: unit,
            used_finished,
            used_from_raw,
        },
        product,
        recipe,
    })
}

/// Prices an order and checks availability without changing anything.
#[instrument(skip(ledger))]
pub async fn validate_order(ledger: &Ledger, new: &NewOrder) -> Result<OrderQuote> {
    let plan = plan_order(ledger.db(), ledger.pricing(), new).await?;
    Ok(plan.quote)
}

/// Commits an order stamped with the current time.
pub async fn create_order(ledger: &Ledger, new: NewOrder) -> Result<OrderReceipt> {
    create_order_at(ledger, new, Utc::now()).await
}

/// Commits an order stamped with `now`.
///
/// Finished goods are deducted first, then each recipe material for the
/// remaining packages. Any failure rolls the whole order back.
#[instrument(skip(ledger, new), fields(product_id = new.product_id, qty = new.qty))]
pub async fn create_order_at(
    ledger: &Ledger,
    new: NewOrder,
    now: DateTime<Utc>,
) -> Result<OrderReceipt> {
    let override_amount = match new.receivable_override {
        Some(amount) if amount.is_finite() && amount >= 0.0 => Some(round2(amount)),
        Some(amount) => {
            return Err(Error::validation(format!(
                "receivable override must be non-negative, got {amount}"
            )));
        }
        None => None,
    };

    let txn = ledger.begin_write().await?;
    let db = txn.conn();
    let plan = match plan_order(db, ledger.pricing(), &new).await {
        Ok(plan) => plan,
        Err(err) => {
            warn!(error = %err, "Order rejected");
            return Err(err);
        }
    };
    let quote = plan.quote;
    let receivable = override_amount.unwrap_or(quote.receivable);

    let created = order::ActiveModel {
        order_type: Set(new.order_type),
        product_id: Set(plan.product.id),
        qty: Set(new.qty),
        used_finished: Set((quote.used_finished > 0).then_some(quote.used_finished)),
        person: Set(new.person.trim().to_string()),
        receivable: Set(receivable),
        payment: Set(new.payment),
        created_at: Set(now),
        pricing_group: Set(new.pricing_group),
        pricing_plan_id: Set(new.pricing_plan_id),
        per_pack_price: Set(Some(quote.per_pack_price)),
        remark: Set(new.remark),
        computed_receivable: Set(override_amount.map(|_| quote.receivable)),
        override_reason: Set(override_amount.and(new.override_reason)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let cause = Cause::new(RefType::Order, created.id)
        .by(Some(&created.person))
        .at(now);
    if quote.used_finished > 0 {
        deduct_finished_goods(db, plan.product.id, quote.used_finished, &cause).await?;
    }
    if quote.used_from_raw > 0 {
        for line in &plan.recipe {
            let grams = line.grams * f64::from(quote.used_from_raw);
            deduct_material(db, line.material_id, grams, &cause).await?;
        }
    }
    txn.commit().await?;

    info!(
        order_id = created.id,
        receivable,
        used_finished = quote.used_finished,
        "Order committed"
    );
    Ok(OrderReceipt {
        id: created.id,
        receivable: quote.receivable,
        persisted_receivable: receivable,
        created_at: created.created_at,
    })
}

/// Orders newest first, optionally for one product.
pub async fn list_orders(ledger: &Ledger, product_id: Option<i64>) -> Result<Vec<order::Model>> {
    let mut query = Order::find();
    if let Some(product_id) = product_id {
        query = query.filter(order::Column::ProductId.eq(product_id));
    }
    query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(ledger.db())
        .await
        .map_err(Into::into)
}
