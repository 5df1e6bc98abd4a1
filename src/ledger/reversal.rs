//! Reversal engine - Compensating orders, purchases and single movements.
//!
//! Every compensation is a new movement; nothing in the log is edited. A
//! compensation points at the movement it undoes through `reversal_of`, and
//! the unique index on that column means a movement can be undone once.
//!
//! - Order cancellation is allowed for [`CANCELLATION_WINDOW_MINUTES`] after
//!   the order was committed. It credits back exactly what the order's own
//!   movements took and deletes the order.
//! - Purchase revocation is unbounded in time but refuses to drive the
//!   material negative. It deletes the purchase.
//! - Any other movement (`produce`, `adjust`) is undone by applying the
//!   opposite change under the same non-negative guard.

use crate::{
    entities::{MovementKind, RefType, movement},
    errors::{Error, Result},
    ledger::{
        Ledger,
        movement::{Cause, find_reversal, movements_for},
        stock::{apply, deduct_material},
        store::{find_material, find_movement, find_order, find_product, find_purchase},
    },
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, ModelTrait};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Minutes after commit during which an order may still be cancelled.
pub const CANCELLATION_WINDOW_MINUTES: i64 = 5;

/// What a revocation undid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Revocation {
    /// An order was cancelled and deleted
    OrderCancelled {
        /// Cancelled order
        order_id: i64,
        /// Compensating movements written
        movements: Vec<movement::Model>,
    },
    /// A purchase was revoked and deleted
    PurchaseRevoked {
        /// Revoked purchase
        purchase_id: i64,
        /// Compensating movement written
        movement: movement::Model,
    },
    /// A single movement was compensated
    MovementReversed {
        /// Movement that was undone
        original_id: i64,
        /// Compensating movement written
        movement: movement::Model,
    },
}

/// Cancels an order, measured against the current time.
pub async fn cancel_order(ledger: &Ledger, order_id: i64) -> Result<Revocation> {
    cancel_order_at(ledger, order_id, Utc::now()).await
}

/// Cancels an order as if the current time were `now`.
#[instrument(skip(ledger))]
pub async fn cancel_order_at(
    ledger: &Ledger,
    order_id: i64,
    now: DateTime<Utc>,
) -> Result<Revocation> {
    let txn = ledger.begin_write().await?;
    let revocation = cancel_order_in(txn.conn(), order_id, now).await?;
    txn.commit().await?;
    info!(order_id, "Order cancelled");
    Ok(revocation)
}

async fn cancel_order_in<C>(db: &C, order_id: i64, now: DateTime<Utc>) -> Result<Revocation>
where
    C: ConnectionTrait,
{
    let order = find_order(db, order_id).await?;
    if now - order.created_at > Duration::minutes(CANCELLATION_WINDOW_MINUTES) {
        warn!(order_id, "Cancellation window expired");
        return Err(Error::validation("cancellation window expired"));
    }
    find_product(db, order.product_id).await?;

    let cause = Cause::new(RefType::Order, order.id)
        .by(Some(&order.person))
        .at(now);
    let mut movements = Vec::new();
    for original in movements_for(db, RefType::Order, order.id).await? {
        if original.kind != MovementKind::Out || original.reversal_of.is_some() {
            continue;
        }
        if find_reversal(db, original.id).await?.is_some() {
            continue;
        }
        let change = apply(
            db,
            MovementKind::In,
            original.item(),
            &cause.clone().reversing(original.id),
        )
        .await?;
        movements.push(change.movement);
    }

    order.delete(db).await?;
    Ok(Revocation::OrderCancelled { order_id, movements })
}

/// Revokes a purchase: removes its grams from the material and deletes it.
///
/// Fails when the material no longer holds the purchased grams.
#[instrument(skip(ledger))]
pub async fn revoke_purchase(
    ledger: &Ledger,
    purchase_id: i64,
    operator: Option<&str>,
) -> Result<Revocation> {
    let txn = ledger.begin_write().await?;
    let revocation = revoke_purchase_in(txn.conn(), purchase_id, operator).await?;
    txn.commit().await?;
    info!(purchase_id, "Purchase revoked");
    Ok(revocation)
}

async fn revoke_purchase_in<C>(
    db: &C,
    purchase_id: i64,
    operator: Option<&str>,
) -> Result<Revocation>
where
    C: ConnectionTrait,
{
    let purchase = find_purchase(db, purchase_id).await?;
    let material = find_material(db, purchase.material_id).await?;
    if material.stock < purchase.grams {
        warn!(
            purchase_id,
            stock = material.stock,
            grams = purchase.grams,
            "Purchase grams already consumed"
        );
        return Err(Error::validation("insufficient stock to revoke"));
    }

    let inbound = movements_for(db, RefType::Purchase, purchase.id)
        .await?
        .into_iter()
        .find(|m| m.kind == MovementKind::In);
    let mut cause = Cause::new(RefType::Adjust, purchase.id).by(operator);
    if let Some(inbound) = inbound {
        if find_reversal(db, inbound.id).await?.is_some() {
            return Err(Error::validation("already revoked"));
        }
        cause = cause.reversing(inbound.id);
    }

    let change = deduct_material(db, purchase.material_id, purchase.grams, &cause).await?;
    purchase.delete(db).await?;
    Ok(Revocation::PurchaseRevoked {
        purchase_id,
        movement: change.movement,
    })
}

/// Revokes one movement.
///
/// Order movements cancel their order and purchase movements revoke their
/// purchase. Production and adjustment movements are compensated directly;
/// a second attempt fails with "already revoked". Compensation movements
/// themselves are never revoked.
#[instrument(skip(ledger))]
pub async fn revoke_movement(
    ledger: &Ledger,
    movement_id: i64,
    operator: Option<&str>,
) -> Result<Revocation> {
    let txn = ledger.begin_write().await?;
    let db = txn.conn();
    let original = find_movement(db, movement_id).await?;
    if original.reversal_of.is_some() {
        return Err(Error::validation("compensation movements cannot be revoked"));
    }

    let revocation = match original.ref_type {
        RefType::Order => cancel_order_in(db, original.ref_id, Utc::now()).await?,
        RefType::Purchase => revoke_purchase_in(db, original.ref_id, operator).await?,
        RefType::Produce | RefType::Adjust => reverse_movement_in(db, &original, operator).await?,
    };
    txn.commit().await?;

    info!(movement_id, "Movement revoked");
    Ok(revocation)
}

async fn reverse_movement_in<C>(
    db: &C,
    original: &movement::Model,
    operator: Option<&str>,
) -> Result<Revocation>
where
    C: ConnectionTrait,
{
    if find_reversal(db, original.id).await?.is_some() {
        warn!(movement_id = original.id, "Movement already revoked");
        return Err(Error::validation("already revoked"));
    }

    let cause = Cause::new(RefType::Adjust, original.id)
        .by(operator)
        .reversing(original.id);
    let change = apply(db, original.kind.opposite(), original.item(), &cause)
        .await
        .map_err(|err| match err {
            Error::InsufficientStock { .. } => Error::validation("insufficient stock to revoke"),
            other => other,
        })?;

    Ok(Revocation::MovementReversed {
        original_id: original.id,
        movement: change.movement,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    #![allow(clippy::panic)]
    use super::*;
    use crate::{
        entities::Payment,
        ledger::{
            movement::reconcile,
            order::{NewOrder, create_order_at},
            production::{ProductionItem, produce, write_off_finished_goods},
            purchase::{NewPurchase, record_purchase},
            store,
        },
        test_utils::*,
    };

    fn order(product_id: i64, qty: i32) -> NewOrder {
        NewOrder {
            product_id,
            qty,
            person: "Ana".to_string(),
            payment: Some(Payment::Wechat),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_order_round_trip_restores_both_counters() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let m2 = create_test_material(&ledger, "M2").await?;
        let product =
            create_test_product(&ledger, "Tea", &[(m1.id, 2.5), (m2.id, 0.33)]).await?;
        stock_material(&ledger, m1.id, 100.0).await?;
        stock_material(&ledger, m2.id, 10.0).await?;
        stock_finished_goods(&ledger, product.id, 2).await?;

        let now = Utc::now();
        let receipt = create_order_at(&ledger, order(product.id, 5), now).await?;
        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 92.5);

        let revocation =
            cancel_order_at(&ledger, receipt.id, now + Duration::minutes(1)).await?;
        match revocation {
            Revocation::OrderCancelled { movements, .. } => assert_eq!(movements.len(), 3),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 100.0);
        assert_eq!(store::find_material(ledger.db(), m2.id).await?.stock, 10.0);
        assert_eq!(store::find_product(ledger.db(), product.id).await?.stock, 2);
        assert!(matches!(
            store::find_order(ledger.db(), receipt.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(reconcile(&ledger).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancellation_window_boundary() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let product = create_test_product(&ledger, "Tea", &[(m1.id, 1.0)]).await?;
        stock_material(&ledger, m1.id, 10.0).await?;

        let now = Utc::now();
        let early = create_order_at(
            &ledger,
            order(product.id, 1),
            now - Duration::seconds(4 * 60 + 59),
        )
        .await?;
        let late = create_order_at(
            &ledger,
            order(product.id, 1),
            now - Duration::seconds(5 * 60 + 1),
        )
        .await?;

        cancel_order_at(&ledger, early.id, now).await?;
        let err = cancel_order_at(&ledger, late.id, now).await.unwrap_err();
        assert!(
            matches!(&err, Error::Validation { message } if message == "cancellation window expired")
        );
        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 9.0);
        assert!(store::find_order(ledger.db(), late.id).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_missing_order() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        assert!(matches!(
            cancel_order(&ledger, 404).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_purchase_revoke_guard() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let product = create_test_product(&ledger, "Tea", &[(m1.id, 60.0)]).await?;
        let purchase = record_purchase(
            &ledger,
            NewPurchase {
                material_id: m1.id,
                grams: 100.0,
                cost: 80.0,
                operator: "Mei".to_string(),
            },
        )
        .await?;
        create_order_at(&ledger, order(product.id, 1), Utc::now()).await?;

        let err = revoke_purchase(&ledger, purchase.id, Some("Mei"))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::Validation { message } if message == "insufficient stock to revoke")
        );
        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 40.0);
        assert!(store::find_purchase(ledger.db(), purchase.id).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_fractional_purchase_can_be_revoked_untouched() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let purchase = stock_material(&ledger, m1.id, 10.004).await?;
        assert_eq!(purchase.grams, 10.0);
        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 10.0);

        revoke_purchase(&ledger, purchase.id, Some("Mei")).await?;

        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 0.0);
        assert!(reconcile(&ledger).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_purchase_revoke_deducts_and_deletes() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let purchase = stock_material(&ledger, m1.id, 100.0).await?;

        let revocation = revoke_purchase(&ledger, purchase.id, Some("Mei")).await?;
        let Revocation::PurchaseRevoked { movement, .. } = revocation else {
            panic!("unexpected revocation");
        };
        assert_eq!(movement.ref_type, RefType::Adjust);
        assert_eq!(movement.kind, MovementKind::Out);
        assert!(movement.reversal_of.is_some());

        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 0.0);
        assert!(matches!(
            revoke_purchase(&ledger, purchase.id, None).await,
            Err(Error::NotFound { .. })
        ));
        assert!(reconcile(&ledger).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_compensation_movements_cannot_be_revoked() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let purchase = stock_material(&ledger, m1.id, 100.0).await?;

        let Revocation::PurchaseRevoked { movement, .. } =
            revoke_purchase(&ledger, purchase.id, Some("Mei")).await?
        else {
            panic!("unexpected revocation");
        };

        let err = revoke_movement(&ledger, movement.id, Some("Mei"))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::Validation { message } if message == "compensation movements cannot be revoked")
        );
        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 0.0);
        assert!(reconcile(&ledger).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_revoking_a_movement_twice_fails_the_second_time() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let product = create_test_product(&ledger, "Tea", &[(m1.id, 4.0)]).await?;
        stock_material(&ledger, m1.id, 20.0).await?;
        produce(
            &ledger,
            vec![ProductionItem {
                product_id: product.id,
                qty: 2,
                operator: None,
            }],
        )
        .await?;

        let produced = movements_for(ledger.db(), RefType::Produce, product.id).await?;
        let material_out = produced
            .iter()
            .find(|m| m.kind == MovementKind::Out)
            .unwrap();

        revoke_movement(&ledger, material_out.id, Some("Lin")).await?;
        let after_first = store::find_material(ledger.db(), m1.id).await?.stock;
        assert_eq!(after_first, 20.0);

        let err = revoke_movement(&ledger, material_out.id, Some("Lin"))
            .await
            .unwrap_err();
        assert!(matches!(&err, Error::Validation { message } if message == "already revoked"));
        assert_eq!(
            store::find_material(ledger.db(), m1.id).await?.stock,
            after_first
        );
        assert!(reconcile(&ledger).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_revoking_product_credit_respects_stock() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let product = create_test_product(&ledger, "Tea", &[(m1.id, 1.0)]).await?;
        stock_material(&ledger, m1.id, 10.0).await?;
        produce(
            &ledger,
            vec![ProductionItem {
                product_id: product.id,
                qty: 3,
                operator: None,
            }],
        )
        .await?;
        write_off_finished_goods(&ledger, product.id, 2, Some("Lin")).await?;

        let credit = movements_for(ledger.db(), RefType::Produce, product.id)
            .await?
            .into_iter()
            .find(|m| m.kind == MovementKind::In)
            .unwrap();
        let err = revoke_movement(&ledger, credit.id, None).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(store::find_product(ledger.db(), product.id).await?.stock, 1);

        // the write-off itself can be undone
        let write_off = movements_for(ledger.db(), RefType::Adjust, product.id)
            .await?
            .pop()
            .unwrap();
        revoke_movement(&ledger, write_off.id, None).await?;
        assert_eq!(store::find_product(ledger.db(), product.id).await?.stock, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_revoke_movement_dispatches_orders_and_purchases() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let m1 = create_test_material(&ledger, "M1").await?;
        let product = create_test_product(&ledger, "Tea", &[(m1.id, 1.0)]).await?;
        let purchase = stock_material(&ledger, m1.id, 10.0).await?;
        let receipt = create_order_at(&ledger, order(product.id, 2), Utc::now()).await?;

        let order_movement = movements_for(ledger.db(), RefType::Order, receipt.id)
            .await?
            .pop()
            .unwrap();
        assert!(matches!(
            revoke_movement(&ledger, order_movement.id, None).await?,
            Revocation::OrderCancelled { .. }
        ));
        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 10.0);

        let purchase_movement = movements_for(ledger.db(), RefType::Purchase, purchase.id)
            .await?
            .pop()
            .unwrap();
        assert!(matches!(
            revoke_movement(&ledger, purchase_movement.id, None).await?,
            Revocation::PurchaseRevoked { .. }
        ));
        assert_eq!(store::find_material(ledger.db(), m1.id).await?.stock, 0.0);
        assert!(matches!(
            revoke_movement(&ledger, 9_999, None).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }
}
