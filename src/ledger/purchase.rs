//! Purchase business logic - Material inbound.

use crate::{
    entities::{Purchase, RefType, purchase},
    errors::{Error, Result},
    ledger::{
        Ledger,
        movement::{Cause, normalize_grams},
        stock::credit_material,
        store::find_material,
    },
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Input for [`record_purchase`].
#[derive(Debug, Clone)]
pub struct NewPurchase {
    /// Material received
    pub material_id: i64,
    /// Grams received
    pub grams: f64,
    /// Total cost paid
    pub cost: f64,
    /// Display name of the operator
    pub operator: String,
}

impl NewPurchase {
    /// Checks the line and rounds its grams to the counter resolution, so the
    /// stored purchase matches the movement it produces.
    fn validate(mut self) -> Result<Self> {
        self.grams = normalize_grams("grams", self.grams)?;
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(Error::validation("cost must be non-negative"));
        }
        Ok(self)
    }
}

/// Books one purchase and credits its material.
#[instrument(skip(ledger))]
pub async fn record_purchase(ledger: &Ledger, new: NewPurchase) -> Result<purchase::Model> {
    let new = new.validate()?;
    let txn = ledger.begin_write().await?;
    find_material(txn.conn(), new.material_id).await?;
    let recorded = insert_and_credit(txn.conn(), new).await?;
    txn.commit().await?;

    info!(
        purchase_id = recorded.id,
        material_id = recorded.material_id,
        grams = recorded.grams,
        "Purchase recorded"
    );
    Ok(recorded)
}

/// Books several purchases at once. Every line is validated before the first
/// one is written; any failure leaves the ledger untouched.
#[instrument(skip(ledger, batch), fields(lines = batch.len()))]
pub async fn record_purchases(
    ledger: &Ledger,
    batch: Vec<NewPurchase>,
) -> Result<Vec<purchase::Model>> {
    if batch.is_empty() {
        return Err(Error::validation("purchase batch must not be empty"));
    }
    let batch = batch
        .into_iter()
        .map(NewPurchase::validate)
        .collect::<Result<Vec<_>>>()?;

    let txn = ledger.begin_write().await?;
    for line in &batch {
        find_material(txn.conn(), line.material_id).await?;
    }
    let mut recorded = Vec::with_capacity(batch.len());
    for line in batch {
        recorded.push(insert_and_credit(txn.conn(), line).await?);
    }
    txn.commit().await?;

    info!(count = recorded.len(), "Purchase batch recorded");
    Ok(recorded)
}

async fn insert_and_credit<C>(db: &C, new: NewPurchase) -> Result<purchase::Model>
where
    C: ConnectionTrait,
{
    let created = purchase::ActiveModel {
        material_id: Set(new.material_id),
        grams: Set(new.grams),
        cost: Set(new.cost),
        operator: Set(new.operator.trim().to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let cause = Cause::new(RefType::Purchase, created.id)
        .by(Some(&created.operator))
        .at(created.created_at);
    credit_material(db, created.material_id, created.grams, &cause).await?;
    Ok(created)
}

/// Purchases newest first, optionally for one material.
pub async fn list_purchases(
    ledger: &Ledger,
    material_id: Option<i64>,
) -> Result<Vec<purchase::Model>> {
    let mut query = Purchase::find();
    if let Some(material_id) = material_id {
        query = query.filter(purchase::Column::MaterialId.eq(material_id));
    }
    query
        .order_by_desc(purchase::Column::CreatedAt)
        .order_by_desc(purchase::Column::Id)
        .all(ledger.db())
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        entities::MovementKind,
        ledger::{movement::movements_for, store},
        test_utils::*,
    };

    fn line(material_id: i64, grams: f64) -> NewPurchase {
        NewPurchase {
            material_id,
            grams,
            cost: 12.5,
            operator: "Mei".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_purchase_credits_and_logs() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let material = create_test_material(&ledger, "Ginseng").await?;

        let purchase = record_purchase(&ledger, line(material.id, 250.0)).await?;

        assert_eq!(
            store::find_material(ledger.db(), material.id).await?.stock,
            250.0
        );
        let movements = movements_for(ledger.db(), RefType::Purchase, purchase.id).await?;
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::In);
        assert_eq!(movements[0].quantity, 250.0);
        assert_eq!(movements[0].operator.as_deref(), Some("Mei"));
        Ok(())
    }

    #[tokio::test]
    async fn test_record_purchase_validation() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let material = create_test_material(&ledger, "Ginseng").await?;

        assert!(matches!(
            record_purchase(&ledger, line(material.id, 0.0)).await,
            Err(Error::Validation { .. })
        ));
        let mut negative_cost = line(material.id, 1.0);
        negative_cost.cost = -3.0;
        assert!(matches!(
            record_purchase(&ledger, negative_cost).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            record_purchase(&ledger, line(404, 1.0)).await,
            Err(Error::NotFound { .. })
        ));
        assert!(list_purchases(&ledger, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let a = create_test_material(&ledger, "A").await?;
        let b = create_test_material(&ledger, "B").await?;

        let result = record_purchases(&ledger, vec![line(a.id, 10.0), line(404, 5.0)]).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert_eq!(store::find_material(ledger.db(), a.id).await?.stock, 0.0);
        assert_eq!(count_movements(&ledger).await?, 0);

        let recorded =
            record_purchases(&ledger, vec![line(a.id, 10.0), line(b.id, 5.0), line(a.id, 1.0)])
                .await?;
        assert_eq!(recorded.len(), 3);
        assert_eq!(store::find_material(ledger.db(), a.id).await?.stock, 11.0);
        assert_eq!(list_purchases(&ledger, Some(a.id)).await?.len(), 2);
        assert!(matches!(
            record_purchases(&ledger, Vec::new()).await,
            Err(Error::Validation { .. })
        ));
        Ok(())
    }
}
