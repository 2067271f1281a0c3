//! # Stock Ledger
//!
//! Material balances, the append-only stock record trail and low-stock
//! alerts.
//!
//! ## Mutation Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    lock_for_update(material)   ← first write, takes the SQLite lock     │
//! │    read balance                                                         │
//! │    compute stock_after (floored at zero for outflows)                   │
//! │    set_stock + insert record   ← same transaction, always together      │
//! │    alert check                                                          │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every record satisfies `stock_after = stock_before + quantity` (a CHECK
//! constraint), so a material's balance can always be rebuilt from its
//! records; [`StockLedger::verify_balance`] does exactly that.
//!
//! ## Alert Rules
//! - Raised when an active material is at or below its threshold and has no
//!   open alert (at most one open alert per material).
//! - `stock_in` resolves the open alert once stock is strictly above the
//!   threshold. `adjust_stock` and `waste` only ever raise.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use pearl_core::validation::{
    stock_after_receipt, validate_movement_quantity, validate_new_material, validate_stock_level,
};
use pearl_core::{
    BalanceCheck, Clock, Material, MaterialAlert, MaterialStatusSummary, NewMaterial, Order,
    Quantity, Recipe, StockChangeKind, StockChangeRecord, StockRecordFilter,
};
use pearl_db::repository::alert::AlertRepository;
use pearl_db::repository::material::MaterialRepository;
use pearl_db::repository::recipe::RecipeRepository;
use pearl_db::repository::stock_record::StockRecordRepository;
use pearl_db::Database;

/// Optional context attached to a manual stock movement.
#[derive(Debug, Clone, Default)]
pub struct MovementNote {
    pub note: Option<String>,
    pub operator_id: Option<String>,
}

impl MovementNote {
    pub fn new(note: impl Into<String>) -> Self {
        MovementNote {
            note: Some(note.into()),
            operator_id: None,
        }
    }

    pub fn by(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = Some(operator_id.into());
        self
    }
}

#[derive(Clone)]
pub struct StockLedger {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl StockLedger {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        StockLedger { db, clock }
    }

    // =========================================================================
    // Materials
    // =========================================================================

    pub async fn create_material(&self, new: NewMaterial) -> LedgerResult<Material> {
        validate_new_material(&new)?;
        let material = self.db.materials().create(&new, self.clock.now()).await?;
        info!(
            material_id = %material.id,
            name = %material.name,
            opening = %material.current_stock,
            "Material created"
        );
        Ok(material)
    }

    pub async fn get_material(&self, id: &str) -> LedgerResult<Option<Material>> {
        Ok(self.db.materials().get_by_id(id).await?)
    }

    pub async fn list_materials(&self) -> LedgerResult<Vec<Material>> {
        Ok(self.db.materials().list().await?)
    }

    /// Soft-deletes a material.
    ///
    /// Returns `false` (and changes nothing) while any recipe still uses it.
    pub async fn delete_material(&self, material_id: &str) -> LedgerResult<bool> {
        let mut tx = self.db.begin().await?;
        if MaterialRepository::lock_for_update(&mut tx, material_id)
            .await?
            .is_none()
        {
            return Err(LedgerError::not_found("Material", material_id));
        }

        if RecipeRepository::references_material(&mut tx, material_id).await? {
            tx.rollback().await?;
            debug!(material_id, "Material still used by a recipe, not deleted");
            return Ok(false);
        }

        MaterialRepository::deactivate(&mut tx, material_id, self.clock.now()).await?;
        tx.commit().await?;

        info!(material_id, "Material deactivated");
        Ok(true)
    }

    // =========================================================================
    // Manual Movements
    // =========================================================================

    /// Receives stock. Resolves the open alert once stock is above threshold.
    pub async fn stock_in(
        &self,
        material_id: &str,
        quantity: Quantity,
        note: MovementNote,
    ) -> LedgerResult<StockChangeRecord> {
        validate_movement_quantity(quantity)?;

        let mut tx = self.db.begin().await?;
        let material = Self::lock_active(&mut tx, material_id).await?;
        let stock_after = stock_after_receipt(material.current_stock, quantity)?;
        let record = self
            .apply(&mut tx, &material, StockChangeKind::In, stock_after, None, note)
            .await?;

        let now = self.clock.now();
        if stock_after > material.alert_threshold {
            AlertRepository::resolve_open_for_material(&mut tx, material_id, now).await?;
        } else {
            Self::raise_alert_if_low(&mut tx, material_id, now).await?;
        }
        tx.commit().await?;

        info!(material_id, quantity = %quantity, stock = %stock_after, "Stock received");
        Ok(record)
    }

    /// Sets the balance to an absolute counted value.
    pub async fn adjust_stock(
        &self,
        material_id: &str,
        new_stock: Quantity,
        note: MovementNote,
    ) -> LedgerResult<StockChangeRecord> {
        validate_stock_level("new_stock", new_stock)?;

        let mut tx = self.db.begin().await?;
        let material = Self::lock_active(&mut tx, material_id).await?;
        let record = self
            .apply(&mut tx, &material, StockChangeKind::Adjust, new_stock, None, note)
            .await?;
        Self::raise_alert_if_low(&mut tx, material_id, self.clock.now()).await?;
        tx.commit().await?;

        info!(
            material_id,
            before = %record.stock_before,
            after = %record.stock_after,
            "Stock adjusted"
        );
        Ok(record)
    }

    /// Writes off stock. More than is on hand empties the material; the
    /// record carries the amount actually removed.
    pub async fn waste(
        &self,
        material_id: &str,
        quantity: Quantity,
        note: MovementNote,
    ) -> LedgerResult<StockChangeRecord> {
        validate_movement_quantity(quantity)?;

        let mut tx = self.db.begin().await?;
        let material = Self::lock_active(&mut tx, material_id).await?;
        let stock_after = (material.current_stock - quantity).clamp_to_zero();
        let record = self
            .apply(&mut tx, &material, StockChangeKind::Waste, stock_after, None, note)
            .await?;
        Self::raise_alert_if_low(&mut tx, material_id, self.clock.now()).await?;
        tx.commit().await?;

        let removed = -record.quantity;
        info!(material_id, requested = %quantity, removed = %removed, "Stock wasted");
        Ok(record)
    }

    // =========================================================================
    // Order Consumption
    // =========================================================================

    /// Deducts recipe materials for every line of an order.
    ///
    /// Requirements are summed per material first, so each material gets a
    /// single `Out` record per order. Products without recipes are skipped.
    /// All deductions commit together or not at all.
    pub async fn consume_for_order(&self, order: &Order) -> LedgerResult<Vec<StockChangeRecord>> {
        // Recipes are read before the transaction opens
        let mut recipes: HashMap<&str, Vec<Recipe>> = HashMap::new();
        let mut required: BTreeMap<String, Quantity> = BTreeMap::new();
        for line in &order.lines {
            if !recipes.contains_key(line.product_id.as_str()) {
                let rows = self.db.recipes().for_product(&line.product_id).await?;
                recipes.insert(line.product_id.as_str(), rows);
            }
            for recipe in recipes.get(line.product_id.as_str()).into_iter().flatten() {
                *required.entry(recipe.material_id.clone()).or_default() +=
                    recipe.quantity.times(line.quantity);
            }
        }

        if required.is_empty() {
            debug!(order_id = %order.id, "No recipe-backed lines, nothing to consume");
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        let mut records = Vec::with_capacity(required.len());
        for (material_id, quantity) in &required {
            let material = MaterialRepository::lock_for_update(&mut tx, material_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Material", material_id.as_str()))?;
            let stock_after = (material.current_stock - *quantity).clamp_to_zero();
            let note = MovementNote::new(format!("Order {}", order.order_code));
            let record = self
                .apply(
                    &mut tx,
                    &material,
                    StockChangeKind::Out,
                    stock_after,
                    Some(&order.id),
                    note,
                )
                .await?;
            Self::raise_alert_if_low(&mut tx, material_id, now).await?;
            records.push(record);
        }
        tx.commit().await?;

        debug!(
            order_id = %order.id,
            materials = records.len(),
            "Stock consumed for order"
        );
        Ok(records)
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    /// Raises an alert for the material if it is low and has none open.
    /// Returns the new alert, or `None` when nothing was raised (including
    /// for an unknown material).
    pub async fn check_and_create_alert(
        &self,
        material_id: &str,
    ) -> LedgerResult<Option<MaterialAlert>> {
        let mut tx = self.db.begin().await?;
        if MaterialRepository::lock_for_update(&mut tx, material_id)
            .await?
            .is_none()
        {
            tx.rollback().await?;
            debug!(material_id, "Unknown material, no alert check");
            return Ok(None);
        }
        let alert = Self::raise_alert_if_low(&mut tx, material_id, self.clock.now()).await?;
        tx.commit().await?;
        Ok(alert)
    }

    /// Resolves an alert. Unknown or already resolved alerts are a no-op.
    pub async fn resolve_alert(&self, alert_id: &str) -> LedgerResult<bool> {
        let resolved = self.db.alerts().resolve(alert_id, self.clock.now()).await? > 0;
        if resolved {
            info!(alert_id, "Alert resolved");
        }
        Ok(resolved)
    }

    pub async fn list_active_alerts(&self) -> LedgerResult<Vec<MaterialAlert>> {
        Ok(self.db.alerts().list_active().await?)
    }

    /// Runs the alert check over every active material.
    /// Returns how many alerts were raised.
    pub async fn sweep_alerts(&self) -> LedgerResult<usize> {
        let mut raised = 0;
        for material_id in self.db.materials().list_active_ids().await? {
            if self.check_and_create_alert(&material_id).await?.is_some() {
                raised += 1;
            }
        }
        debug!(raised, "Alert sweep finished");
        Ok(raised)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn list_stock_records(
        &self,
        filter: StockRecordFilter,
    ) -> LedgerResult<Vec<StockChangeRecord>> {
        Ok(self.db.stock_records().list(&filter).await?)
    }

    pub async fn get_material_status_summary(&self) -> LedgerResult<MaterialStatusSummary> {
        Ok(self.db.materials().status_summary().await?)
    }

    pub async fn list_low_stock_materials(&self) -> LedgerResult<Vec<Material>> {
        Ok(self.db.materials().list_low_stock().await?)
    }

    /// Compares the cached balance with the sum of the material's records.
    pub async fn verify_balance(&self, material_id: &str) -> LedgerResult<BalanceCheck> {
        let material = self
            .db
            .materials()
            .get_by_id(material_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Material", material_id))?;
        let (ledger_stock, record_count) = self.db.stock_records().ledger_sum(material_id).await?;

        let consistent = ledger_stock == material.current_stock;
        if !consistent {
            warn!(
                material_id,
                cached = %material.current_stock,
                ledger = %ledger_stock,
                "Stock balance does not match record history"
            );
        }

        Ok(BalanceCheck {
            material_id: material.id,
            cached_stock: material.current_stock,
            ledger_stock,
            record_count,
            consistent,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn lock_active(conn: &mut SqliteConnection, material_id: &str) -> LedgerResult<Material> {
        let material = MaterialRepository::lock_for_update(&mut *conn, material_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Material", material_id))?;
        if !material.is_active {
            return Err(LedgerError::conflict(format!(
                "material {} is inactive",
                material_id
            )));
        }
        Ok(material)
    }

    /// Writes the new balance and its record. The material must be locked.
    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        material: &Material,
        kind: StockChangeKind,
        stock_after: Quantity,
        order_id: Option<&str>,
        note: MovementNote,
    ) -> LedgerResult<StockChangeRecord> {
        let record = StockChangeRecord {
            id: Uuid::new_v4().to_string(),
            material_id: material.id.clone(),
            kind,
            quantity: stock_after - material.current_stock,
            stock_before: material.current_stock,
            stock_after,
            order_id: order_id.map(str::to_string),
            note: note.note,
            operator_id: note.operator_id,
            created_at: self.clock.now(),
        };
        MaterialRepository::set_stock(&mut *conn, &material.id, stock_after, record.created_at)
            .await?;
        StockRecordRepository::insert(&mut *conn, &record).await?;
        Ok(record)
    }

    /// Alert check on a locked material (re-read after any balance write).
    async fn raise_alert_if_low(
        conn: &mut SqliteConnection,
        material_id: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<MaterialAlert>> {
        let Some(material) = MaterialRepository::lock_for_update(&mut *conn, material_id).await?
        else {
            return Ok(None);
        };
        if !material.is_active || !material.is_low() {
            return Ok(None);
        }
        if AlertRepository::find_open(&mut *conn, material_id)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let alert = MaterialAlert {
            id: Uuid::new_v4().to_string(),
            material_id: material.id.clone(),
            stock_level: material.current_stock,
            threshold: material.alert_threshold,
            resolved: false,
            raised_at: now,
            resolved_at: None,
        };
        AlertRepository::insert(&mut *conn, &alert).await?;

        warn!(
            material_id,
            name = %material.name,
            stock = %material.current_stock,
            threshold = %material.alert_threshold,
            "Low stock alert raised"
        );
        Ok(Some(alert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ledger, pearls, start_of_test};
    use pearl_core::{NewOrder, NewOrderLine, MAX_STOCK_QUANTITY};

    fn units(n: i64) -> Quantity {
        Quantity::from_units(n)
    }

    #[tokio::test]
    async fn test_create_material_records_opening_stock() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(1000, 200)).await.unwrap();

        let check = ledger.stock().verify_balance(&material.id).await.unwrap();
        assert!(check.consistent);
        assert_eq!(check.ledger_stock, units(1000));
        assert_eq!(check.record_count, 1);
    }

    #[tokio::test]
    async fn test_waste_floors_at_zero() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(50, 10)).await.unwrap();

        let record = ledger
            .stock()
            .waste(&material.id, units(80), MovementNote::new("spilled").by("staff-1"))
            .await
            .unwrap();

        assert_eq!(record.kind, StockChangeKind::Waste);
        assert_eq!(record.quantity, units(-50));
        assert_eq!(record.stock_after, Quantity::zero());
        assert_eq!(record.operator_id.as_deref(), Some("staff-1"));
        assert!(ledger.stock().verify_balance(&material.id).await.unwrap().consistent);
    }

    #[tokio::test]
    async fn test_movements_validate_quantity() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(50, 10)).await.unwrap();

        let err = ledger
            .stock()
            .stock_in(&material.id, Quantity::zero(), MovementNote::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = ledger
            .stock()
            .adjust_stock(&material.id, units(-1), MovementNote::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = ledger
            .stock()
            .stock_in("missing", units(1), MovementNote::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_oversized_quantities_are_rejected() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(50, 10)).await.unwrap();

        let err = ledger
            .stock()
            .stock_in(&material.id, Quantity::from_milli(i64::MAX), MovementNote::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        // The receipt is in range but the balance would pass the limit
        let err = ledger
            .stock()
            .stock_in(&material.id, MAX_STOCK_QUANTITY, MovementNote::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = ledger
            .stock()
            .adjust_stock(&material.id, Quantity::from_milli(i64::MAX), MovementNote::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let err = ledger
            .stock()
            .waste(&material.id, Quantity::from_milli(i64::MAX), MovementNote::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let err = ledger
            .recipes()
            .set_recipe("milk-tea", &material.id, Quantity::from_milli(i64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let material = ledger.stock().get_material(&material.id).await.unwrap().unwrap();
        assert_eq!(material.current_stock, units(50));
        assert!(ledger.stock().verify_balance(&material.id).await.unwrap().consistent);
    }

    #[tokio::test]
    async fn test_alert_check_on_unknown_material_is_noop() {
        let (ledger, _) = ledger().await;
        assert!(ledger
            .stock()
            .check_and_create_alert("missing")
            .await
            .unwrap()
            .is_none());
        assert!(ledger.stock().list_active_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_stock_raises_single_alert() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(300, 200)).await.unwrap();

        ledger
            .stock()
            .waste(&material.id, units(150), MovementNote::default())
            .await
            .unwrap();
        ledger
            .stock()
            .waste(&material.id, units(10), MovementNote::default())
            .await
            .unwrap();
        assert!(ledger
            .stock()
            .check_and_create_alert(&material.id)
            .await
            .unwrap()
            .is_none());

        let alerts = ledger.stock().list_active_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stock_level, units(150));
        assert_eq!(alerts[0].threshold, units(200));
    }

    #[tokio::test]
    async fn test_stock_in_resolves_alert_adjust_does_not() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(300, 200)).await.unwrap();

        ledger
            .stock()
            .adjust_stock(&material.id, units(100), MovementNote::new("count"))
            .await
            .unwrap();
        assert_eq!(ledger.stock().list_active_alerts().await.unwrap().len(), 1);

        // Back above threshold by count: the alert stays open
        ledger
            .stock()
            .adjust_stock(&material.id, units(500), MovementNote::new("recount"))
            .await
            .unwrap();
        assert_eq!(ledger.stock().list_active_alerts().await.unwrap().len(), 1);

        ledger
            .stock()
            .adjust_stock(&material.id, units(100), MovementNote::default())
            .await
            .unwrap();
        // Receiving up to exactly the threshold is still low
        ledger
            .stock()
            .stock_in(&material.id, units(100), MovementNote::default())
            .await
            .unwrap();
        assert_eq!(ledger.stock().list_active_alerts().await.unwrap().len(), 1);

        ledger
            .stock()
            .stock_in(&material.id, units(1), MovementNote::new("delivery"))
            .await
            .unwrap();
        assert!(ledger.stock().list_active_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_alert_is_idempotent() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(100, 200)).await.unwrap();
        let alert = ledger
            .stock()
            .check_and_create_alert(&material.id)
            .await
            .unwrap()
            .unwrap();

        assert!(ledger.stock().resolve_alert(&alert.id).await.unwrap());
        assert!(!ledger.stock().resolve_alert(&alert.id).await.unwrap());
        assert!(!ledger.stock().resolve_alert("missing").await.unwrap());

        // Still low, so the next check raises a fresh alert
        let again = ledger
            .stock()
            .check_and_create_alert(&material.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(again.id, alert.id);
    }

    #[tokio::test]
    async fn test_delete_material_guarded_by_recipes() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(100, 10)).await.unwrap();
        ledger
            .recipes()
            .set_recipe("milk-tea", &material.id, units(30))
            .await
            .unwrap();

        assert!(!ledger.stock().delete_material(&material.id).await.unwrap());

        ledger
            .recipes()
            .remove_recipe("milk-tea", &material.id)
            .await
            .unwrap();
        assert!(ledger.stock().delete_material(&material.id).await.unwrap());

        let material = ledger.stock().get_material(&material.id).await.unwrap().unwrap();
        assert!(!material.is_active);

        let err = ledger
            .stock()
            .stock_in(&material.id, units(1), MovementNote::default())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let err = ledger.stock().delete_material("missing").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_consumption_sums_lines_per_material() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(1000, 200)).await.unwrap();
        ledger
            .recipes()
            .set_recipe("milk-tea", &material.id, units(30))
            .await
            .unwrap();
        ledger
            .recipes()
            .set_recipe("brown-sugar", &material.id, units(40))
            .await
            .unwrap();

        let new = NewOrder::new(
            start_of_test(),
            vec![
                NewOrderLine::new("milk-tea", "Milk Tea", 5000, 2),
                NewOrderLine::new("brown-sugar", "Brown Sugar", 5500, 1),
                NewOrderLine::new("water", "Water", 1000, 1),
            ],
        );
        let order = ledger.orders().create_order(new).await.unwrap();

        let records = ledger
            .stock()
            .list_stock_records(StockRecordFilter {
                order_id: Some(order.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, units(-100));
        assert_eq!(records[0].note.as_deref(), Some("Order #0126"));

        // A second pass for the same order is rejected by the ledger
        assert!(ledger.stock().consume_for_order(&order).await.is_err());
        let material = ledger.stock().get_material(&material.id).await.unwrap().unwrap();
        assert_eq!(material.current_stock, units(900));
    }

    #[tokio::test]
    async fn test_consumption_floors_and_alerts() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(40, 20)).await.unwrap();
        ledger
            .recipes()
            .set_recipe("milk-tea", &material.id, units(30))
            .await
            .unwrap();

        let new = NewOrder::new(
            start_of_test(),
            vec![NewOrderLine::new("milk-tea", "Milk Tea", 5000, 2)],
        );
        ledger.orders().create_order(new).await.unwrap();

        let material = ledger.stock().get_material(&material.id).await.unwrap().unwrap();
        assert_eq!(material.current_stock, Quantity::zero());

        let alerts = ledger.stock().list_active_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stock_level, Quantity::zero());

        let summary = ledger.stock().get_material_status_summary().await.unwrap();
        assert_eq!(summary.low_stock, 1);
        assert_eq!(summary.out_of_stock, 1);
        assert_eq!(summary.open_alerts, 1);
        assert_eq!(ledger.stock().list_low_stock_materials().await.unwrap().len(), 1);
        assert!(ledger.stock().verify_balance(&material.id).await.unwrap().consistent);
    }

    #[tokio::test]
    async fn test_sweep_skips_inactive_materials() {
        let (ledger, _) = ledger().await;
        let low = ledger.stock().create_material(pearls(100, 200)).await.unwrap();
        let retired = ledger.stock().create_material(pearls(0, 200)).await.unwrap();
        ledger.stock().delete_material(&retired.id).await.unwrap();

        assert_eq!(ledger.stock().sweep_alerts().await.unwrap(), 1);
        assert_eq!(ledger.stock().sweep_alerts().await.unwrap(), 0);

        let alerts = ledger.stock().list_active_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].material_id, low.id);
    }
}
