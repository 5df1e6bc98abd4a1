//! Stock mutator - The only code that writes stock counters.
//!
//! Each primitive reads the current counter, applies the change, writes it back
//! and appends exactly one movement, all on the caller's connection. Workflows
//! call them inside a [`crate::ledger::WriteTxn`], so the counter update and
//! its movement commit or roll back together.
//!
//! Requirement checks are split in two halves: [`find_shortages`] is a pure
//! report over known stock levels, [`check_requirements`] loads the stock and
//! turns a non-empty report into [`Error::InsufficientStock`].

use crate::{
    entities::{MovementKind, StockItem, material, movement, product, recipe_line},
    errors::{Error, Result, Shortage},
    ledger::{
        movement::{Cause, append_movement, normalize_grams},
        round2,
        store::{find_material, find_product},
    },
};
use sea_orm::{ConnectionTrait, Set, prelude::*};
use std::collections::BTreeMap;
use tracing::debug;

/// Result of one primitive: the new counter value and the movement written.
#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    /// Counter value after the change
    pub stock: f64,
    /// Movement recording the change
    pub movement: movement::Model,
}

/// Removes `grams` from a material.
///
/// Fails with [`Error::InsufficientStock`] when the material holds less than
/// `grams`; nothing is written in that case.
pub async fn deduct_material<C>(
    db: &C,
    material_id: i64,
    grams: f64,
    cause: &Cause,
) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    let grams = normalize_grams("grams", grams)?;
    let material = find_material(db, material_id).await?;
    if material.stock < grams {
        return Err(Error::InsufficientStock {
            shortages: vec![Shortage {
                id: material_id,
                need: grams,
                stock: material.stock,
            }],
        });
    }
    let stock = round2(material.stock - grams);
    write_material(db, material, stock).await?;
    let movement = append_movement(
        db,
        MovementKind::Out,
        StockItem::Material { material_id, grams },
        cause,
    )
    .await?;
    Ok(StockChange { stock, movement })
}

/// Adds `grams` to a material.
pub async fn credit_material<C>(
    db: &C,
    material_id: i64,
    grams: f64,
    cause: &Cause,
) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    let grams = normalize_grams("grams", grams)?;
    let material = find_material(db, material_id).await?;
    let stock = round2(material.stock + grams);
    write_material(db, material, stock).await?;
    let movement = append_movement(
        db,
        MovementKind::In,
        StockItem::Material { material_id, grams },
        cause,
    )
    .await?;
    Ok(StockChange { stock, movement })
}

/// Removes finished packages from a product.
pub async fn deduct_finished_goods<C>(
    db: &C,
    product_id: i64,
    packages: i32,
    cause: &Cause,
) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    ensure_positive_packages(packages)?;
    let product = find_product(db, product_id).await?;
    if product.stock < packages {
        return Err(Error::InsufficientStock {
            shortages: vec![Shortage {
                id: product_id,
                need: f64::from(packages),
                stock: f64::from(product.stock),
            }],
        });
    }
    let stock = product.stock - packages;
    write_product(db, product, stock).await?;
    let movement = append_movement(
        db,
        MovementKind::Out,
        StockItem::Product {
            product_id,
            packages,
        },
        cause,
    )
    .await?;
    Ok(StockChange {
        stock: f64::from(stock),
        movement,
    })
}

/// Adds finished packages to a product.
pub async fn credit_finished_goods<C>(
    db: &C,
    product_id: i64,
    packages: i32,
    cause: &Cause,
) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    ensure_positive_packages(packages)?;
    let product = find_product(db, product_id).await?;
    let stock = product
        .stock
        .checked_add(packages)
        .ok_or_else(|| Error::validation("finished goods stock would overflow"))?;
    write_product(db, product, stock).await?;
    let movement = append_movement(
        db,
        MovementKind::In,
        StockItem::Product {
            product_id,
            packages,
        },
        cause,
    )
    .await?;
    Ok(StockChange {
        stock: f64::from(stock),
        movement,
    })
}

/// Applies a [`StockItem`] in the given direction by dispatching to the
/// matching primitive.
pub async fn apply<C>(
    db: &C,
    kind: MovementKind,
    item: StockItem,
    cause: &Cause,
) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    match (kind, item) {
        (MovementKind::In, StockItem::Material { material_id, grams }) => {
            credit_material(db, material_id, grams, cause).await
        }
        (MovementKind::Out, StockItem::Material { material_id, grams }) => {
            deduct_material(db, material_id, grams, cause).await
        }
        (
            MovementKind::In,
            StockItem::Product {
                product_id,
                packages,
            },
        ) => credit_finished_goods(db, product_id, packages, cause).await,
        (
            MovementKind::Out,
            StockItem::Product {
                product_id,
                packages,
            },
        ) => deduct_finished_goods(db, product_id, packages, cause).await,
    }
}

async fn write_material<C>(db: &C, material: material::Model, stock: f64) -> Result<()>
where
    C: ConnectionTrait,
{
    let material_id = material.id;
    let mut active: material::ActiveModel = material.into();
    active.stock = Set(stock);
    active.update(db).await?;
    debug!(material_id, stock, "Material stock written");
    Ok(())
}

async fn write_product<C>(db: &C, product: product::Model, stock: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    let product_id = product.id;
    let mut active: product::ActiveModel = product.into();
    active.stock = Set(stock);
    active.update(db).await?;
    debug!(product_id, stock, "Product stock written");
    Ok(())
}

fn ensure_positive_packages(packages: i32) -> Result<()> {
    if packages > 0 {
        Ok(())
    } else {
        Err(Error::validation("packages must be greater than 0"))
    }
}

/// Grams needed per material, summed across every recipe added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialRequirements {
    grams: BTreeMap<i64, f64>,
}

impl MaterialRequirements {
    /// Empty requirement set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `grams` of one material.
    pub fn add(&mut self, material_id: i64, grams: f64) {
        *self.grams.entry(material_id).or_default() += grams;
    }

    /// Adds a recipe scaled by `units`. Materials shared with earlier recipes
    /// are summed.
    pub fn add_recipe(&mut self, recipe: &[recipe_line::Model], units: i32) {
        for line in recipe {
            self.add(line.material_id, line.grams * f64::from(units));
        }
    }

    /// True when nothing is needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grams.is_empty()
    }

    /// Needed grams per material, ordered by material id.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.grams.iter().map(|(&id, &grams)| (id, grams))
    }
}

/// Lists every material whose stock cannot cover the requirement.
///
/// Materials missing from `stocks` are treated as holding zero grams.
#[must_use]
pub fn find_shortages(
    requirements: &MaterialRequirements,
    stocks: &BTreeMap<i64, f64>,
) -> Vec<Shortage> {
    requirements
        .iter()
        .filter_map(|(id, need)| {
            let stock = stocks.get(&id).copied().unwrap_or(0.0);
            (stock < need).then_some(Shortage {
                id,
                need: round2(need),
                stock,
            })
        })
        .collect()
}

/// Loads current stock for every required material and fails with the full
/// shortage list if any of them is short.
///
/// A required material that no longer exists is reported as `NotFound`.
pub async fn check_requirements<C>(db: &C, requirements: &MaterialRequirements) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut stocks = BTreeMap::new();
    for (material_id, _) in requirements.iter() {
        let material = find_material(db, material_id).await?;
        stocks.insert(material_id, material.stock);
    }
    let shortages = find_shortages(requirements, &stocks);
    if shortages.is_empty() {
        Ok(())
    } else {
        Err(Error::InsufficientStock { shortages })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    #![allow(clippy::panic)]
    use super::*;
    use crate::{entities::RefType, ledger::store, test_utils::*};
    use proptest::prelude::*;

    fn line(material_id: i64, grams: f64) -> recipe_line::Model {
        recipe_line::Model {
            id: 0,
            product_id: 1,
            material_id,
            grams,
        }
    }

    #[tokio::test]
    async fn test_deduct_and_credit_material_write_one_movement_each() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let material = create_test_material(&ledger, "Ginseng").await?;
        let cause = Cause::new(RefType::Adjust, material.id);

        let txn = ledger.begin_write().await?;
        let credited = credit_material(txn.conn(), material.id, 30.5, &cause).await?;
        let deducted = deduct_material(txn.conn(), material.id, 10.25, &cause).await?;
        txn.commit().await?;

        assert_eq!(credited.stock, 30.5);
        assert_eq!(credited.movement.kind, MovementKind::In);
        assert_eq!(deducted.stock, 20.25);
        assert_eq!(deducted.movement.kind, MovementKind::Out);
        assert_eq!(deducted.movement.quantity, 10.25);

        let reloaded = store::find_material(ledger.db(), material.id).await?;
        assert_eq!(reloaded.stock, 20.25);
        assert_eq!(count_movements(&ledger).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_deduct_material_refuses_to_go_negative() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let material = create_test_material(&ledger, "Ginseng").await?;
        stock_material(&ledger, material.id, 5.0).await?;

        let txn = ledger.begin_write().await?;
        let result = deduct_material(
            txn.conn(),
            material.id,
            5.01,
            &Cause::new(RefType::Adjust, material.id),
        )
        .await;
        drop(txn);

        match result {
            Err(Error::InsufficientStock { shortages }) => {
                assert_eq!(
                    shortages,
                    vec![Shortage {
                        id: material.id,
                        need: 5.01,
                        stock: 5.0
                    }]
                );
            }
            other => panic!("expected shortage, got {other:?}"),
        }
        let reloaded = store::find_material(ledger.db(), material.id).await?;
        assert_eq!(reloaded.stock, 5.0);
        // only the seeding purchase
        assert_eq!(count_movements(&ledger).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_finished_goods_primitives() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let material = create_test_material(&ledger, "Ginseng").await?;
        let product = create_test_product(&ledger, "Tea", &[(material.id, 2.0)]).await?;
        let cause = Cause::new(RefType::Produce, product.id);

        let txn = ledger.begin_write().await?;
        credit_finished_goods(txn.conn(), product.id, 4, &cause).await?;
        let change = deduct_finished_goods(txn.conn(), product.id, 3, &cause).await?;
        let too_many = deduct_finished_goods(txn.conn(), product.id, 2, &cause).await;
        txn.commit().await?;

        assert_eq!(change.stock, 1.0);
        assert!(matches!(too_many, Err(Error::InsufficientStock { .. })));
        assert_eq!(store::find_product(ledger.db(), product.id).await?.stock, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_positive_quantities_rejected() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let material = create_test_material(&ledger, "Ginseng").await?;
        let cause = Cause::new(RefType::Adjust, material.id);

        let txn = ledger.begin_write().await?;
        assert!(matches!(
            credit_material(txn.conn(), material.id, 0.0, &cause).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            credit_finished_goods(txn.conn(), 1, -1, &cause).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            credit_material(txn.conn(), 404, 1.0, &cause).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_check_requirements_reports_every_shortage() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let a = create_test_material(&ledger, "A").await?;
        let b = create_test_material(&ledger, "B").await?;
        let c = create_test_material(&ledger, "C").await?;
        stock_material(&ledger, a.id, 1.0).await?;
        stock_material(&ledger, b.id, 1.0).await?;
        stock_material(&ledger, c.id, 100.0).await?;

        let mut requirements = MaterialRequirements::new();
        requirements.add(a.id, 2.0);
        requirements.add(b.id, 3.0);
        requirements.add(c.id, 50.0);

        match check_requirements(ledger.db(), &requirements).await {
            Err(Error::InsufficientStock { shortages }) => {
                let ids: Vec<i64> = shortages.iter().map(|s| s.id).collect();
                assert_eq!(ids, vec![a.id, b.id]);
            }
            other => panic!("expected shortages, got {other:?}"),
        }

        requirements.add(404, 1.0);
        assert!(matches!(
            check_requirements(ledger.db(), &requirements).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_add_recipe_sums_shared_materials() {
        let mut requirements = MaterialRequirements::new();
        requirements.add_recipe(&[line(1, 10.0), line(2, 1.5)], 2);
        requirements.add_recipe(&[line(1, 5.0)], 1);

        let collected: Vec<(i64, f64)> = requirements.iter().collect();
        assert_eq!(collected, vec![(1, 25.0), (2, 3.0)]);
    }

    #[test]
    fn test_find_shortages_missing_stock_counts_as_zero() {
        let mut requirements = MaterialRequirements::new();
        requirements.add(9, 1.0);
        let shortages = find_shortages(&requirements, &BTreeMap::new());
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].stock, 0.0);
    }

    proptest! {
        #[test]
        fn prop_shortages_are_exactly_the_uncovered_materials(
            lines in prop::collection::btree_map(1i64..20, (0.01f64..500.0, 0.0f64..500.0), 0..12)
        ) {
            let mut requirements = MaterialRequirements::new();
            let mut stocks = BTreeMap::new();
            for (&id, &(need, stock)) in &lines {
                requirements.add(id, need);
                stocks.insert(id, stock);
            }

            let shortages = find_shortages(&requirements, &stocks);
            let expected: Vec<i64> = lines
                .iter()
                .filter(|(_, (need, stock))| stock < need)
                .map(|(&id, _)| id)
                .collect();
            let reported: Vec<i64> = shortages.iter().map(|s| s.id).collect();
            prop_assert_eq!(reported, expected);
            for shortage in &shortages {
                prop_assert!(shortage.stock < shortage.need + 0.005);
            }
        }
    }
}
