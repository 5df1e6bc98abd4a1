//! Movement log - append, query and replay.
//!
//! The log is append-only: rows are inserted by [`append_movement`] (called
//! only from the stock mutator) and never updated or deleted. Replaying it per
//! item must reproduce every live counter, which [`reconcile`] verifies.

use crate::{
    entities::{
        ItemKind, Material, Movement, MovementKind, Product, RefType, StockItem, movement,
    },
    errors::{Error, Result},
    ledger::{Ledger, round2},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, Set, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// Default page size for [`query_movements`].
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// Largest page size [`query_movements`] will serve.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Why a stock change happened, attached to the movement it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Cause {
    /// Business cause
    pub ref_type: RefType,
    /// Id of the causing record
    pub ref_id: i64,
    /// Display name of the operator, opaque to the ledger
    pub operator: Option<String>,
    /// Movement being compensated, for reversals
    pub reversal_of: Option<i64>,
    /// Timestamp written on the movement
    pub at: DateTime<Utc>,
}

impl Cause {
    /// A cause stamped with the current time.
    #[must_use]
    pub fn new(ref_type: RefType, ref_id: i64) -> Self {
        Self {
            ref_type,
            ref_id,
            operator: None,
            reversal_of: None,
            at: Utc::now(),
        }
    }

    /// Attaches an operator name; blank names are dropped.
    #[must_use]
    pub fn by(mut self, operator: Option<&str>) -> Self {
        self.operator = operator
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string);
        self
    }

    /// Marks the movement as the compensation of `movement_id`.
    #[must_use]
    pub const fn reversing(mut self, movement_id: i64) -> Self {
        self.reversal_of = Some(movement_id);
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub const fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Appends one movement row. Only the stock mutator calls this, always in the
/// same transaction as the counter update it records.
pub(crate) async fn append_movement<C>(
    db: &C,
    kind: MovementKind,
    item: StockItem,
    cause: &Cause,
) -> Result<movement::Model>
where
    C: ConnectionTrait,
{
    let (item_kind, item_id) = item.key();
    let row = movement::ActiveModel {
        kind: Set(kind),
        item: Set(item_kind),
        item_id: Set(item_id),
        quantity: Set(item.quantity()),
        ref_type: Set(cause.ref_type),
        ref_id: Set(cause.ref_id),
        reversal_of: Set(cause.reversal_of),
        operator: Set(cause.operator.clone()),
        created_at: Set(cause.at),
        ..Default::default()
    };
    let inserted = row.insert(db).await?;
    debug!(
        movement_id = inserted.id,
        ?kind,
        ?item_kind,
        item_id,
        "Movement appended"
    );
    Ok(inserted)
}

/// Finds the movement that compensates `movement_id`, if one exists.
pub async fn find_reversal<C>(db: &C, movement_id: i64) -> Result<Option<movement::Model>>
where
    C: ConnectionTrait,
{
    Movement::find()
        .filter(movement::Column::ReversalOf.eq(movement_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Every movement caused by one record, oldest first.
pub async fn movements_for<C>(
    db: &C,
    ref_type: RefType,
    ref_id: i64,
) -> Result<Vec<movement::Model>>
where
    C: ConnectionTrait,
{
    Movement::find()
        .filter(movement::Column::RefType.eq(ref_type))
        .filter(movement::Column::RefId.eq(ref_id))
        .order_by_asc(movement::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Filters accepted by [`query_movements`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    /// Direction
    pub kind: Option<MovementKind>,
    /// Counter kind
    pub item: Option<ItemKind>,
    /// Material or product id
    pub item_id: Option<i64>,
    /// Business cause
    pub ref_type: Option<RefType>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
    /// 1-based page number, defaults to 1
    pub page: Option<u64>,
    /// Rows per page, clamped to `1..=100`, defaults to 20
    pub page_size: Option<u64>,
}

/// One page of movement history.
#[derive(Debug, Clone, Serialize)]
pub struct MovementPage {
    /// Rows matching the filter across all pages
    pub total: u64,
    /// Page served, 1-based
    pub page: u64,
    /// Rows per page
    pub page_size: u64,
    /// Rows on this page, newest first
    pub data: Vec<movement::Model>,
}

/// Lists movements newest first with filtering and pagination.
#[instrument(skip(ledger))]
pub async fn query_movements(ledger: &Ledger, filter: MovementFilter) -> Result<MovementPage> {
    let page = filter.page.unwrap_or(1).max(1);
    let page_size = filter
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut query = Movement::find();
    if let Some(kind) = filter.kind {
        query = query.filter(movement::Column::Kind.eq(kind));
    }
    if let Some(item) = filter.item {
        query = query.filter(movement::Column::Item.eq(item));
    }
    if let Some(item_id) = filter.item_id {
        query = query.filter(movement::Column::ItemId.eq(item_id));
    }
    if let Some(ref_type) = filter.ref_type {
        query = query.filter(movement::Column::RefType.eq(ref_type));
    }
    if let Some(from) = filter.from {
        query = query.filter(movement::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(movement::Column::CreatedAt.lte(to));
    }

    let paginator = query
        .order_by_desc(movement::Column::CreatedAt)
        .order_by_desc(movement::Column::Id)
        .paginate(ledger.db(), page_size);
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page - 1).await?;

    Ok(MovementPage {
        total,
        page,
        page_size,
        data,
    })
}

/// An item whose live counter disagrees with the replayed movement log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    /// Counter kind
    pub item: ItemKind,
    /// Material or product id
    pub item_id: i64,
    /// Value stored on the material or product
    pub live: f64,
    /// Value obtained by summing the log
    pub replayed: f64,
}

/// Sums the log into a signed net change per item.
#[must_use]
pub fn replay(movements: &[movement::Model]) -> BTreeMap<(ItemKind, i64), f64> {
    let mut totals: BTreeMap<(ItemKind, i64), f64> = BTreeMap::new();
    for row in movements {
        *totals.entry(row.item().key()).or_default() += row.signed_quantity();
    }
    totals
}

/// Replays the whole movement log and compares it with every live counter.
///
/// Items start at zero stock, so the replayed sum must equal the live value.
/// Differences above half a hundredth are reported.
#[instrument(skip(ledger))]
pub async fn reconcile(ledger: &Ledger) -> Result<Vec<Discrepancy>> {
    let db = ledger.db();
    let movements = Movement::find()
        .order_by_asc(movement::Column::Id)
        .all(db)
        .await?;
    let mut totals = replay(&movements);

    let mut live: Vec<(ItemKind, i64, f64)> = Vec::new();
    for material in Material::find().all(db).await? {
        live.push((ItemKind::Material, material.id, material.stock));
    }
    for product in Product::find().all(db).await? {
        live.push((ItemKind::Product, product.id, f64::from(product.stock)));
    }

    let mut discrepancies = Vec::new();
    for (item, item_id, value) in live {
        let replayed = round2(totals.remove(&(item, item_id)).unwrap_or(0.0));
        if (value - replayed).abs() > 0.005 {
            discrepancies.push(Discrepancy {
                item,
                item_id,
                live: value,
                replayed,
            });
        }
    }
    // Movements pointing at items that no longer exist.
    for ((item, item_id), replayed) in totals {
        discrepancies.push(Discrepancy {
            item,
            item_id,
            live: 0.0,
            replayed: round2(replayed),
        });
    }

    if !discrepancies.is_empty() {
        warn!(count = discrepancies.len(), "Movement log does not reconcile");
    }
    Ok(discrepancies)
}

/// Rejects quantities that are zero, negative or not finite.
pub(crate) fn ensure_positive(label: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::validation(format!("{label} must be greater than 0")))
    }
}

/// Rounds a gram quantity to hundredths and checks it is still positive.
///
/// Counters are kept at hundredths, so every quantity that reaches a counter,
/// a movement or a stored record goes through here first.
pub(crate) fn normalize_grams(label: &str, grams: f64) -> Result<f64> {
    ensure_positive(label, grams)?;
    let grams = round2(grams);
    ensure_positive(label, grams)?;
    Ok(grams)
}
