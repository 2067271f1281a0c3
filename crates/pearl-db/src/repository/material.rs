//! # Material Repository
//!
//! Materials and their cached stock balances.
//!
//! The balance column is only written through [`MaterialRepository::set_stock`],
//! always in the same transaction as the stock record that explains it.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::stock_record::StockRecordRepository;
use pearl_core::{
    Material, MaterialStatusSummary, NewMaterial, Quantity, StockChangeKind, StockChangeRecord,
};

const MATERIAL_COLUMNS: &str = r#"
    id, name, unit, current_stock, alert_threshold, is_active, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct MaterialRepository {
    pool: SqlitePool,
}

impl MaterialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MaterialRepository { pool }
    }

    /// Creates a material. A non-zero opening balance is written as an `In`
    /// record in the same transaction.
    pub async fn create(&self, new: &NewMaterial, now: DateTime<Utc>) -> DbResult<Material> {
        let material = Material {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            unit: new.unit.trim().to_string(),
            current_stock: new.opening_stock,
            alert_threshold: new.alert_threshold,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO materials (
                id, name, unit, current_stock, alert_threshold, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&material.id)
        .bind(&material.name)
        .bind(&material.unit)
        .bind(material.current_stock)
        .bind(material.alert_threshold)
        .bind(material.is_active)
        .bind(material.created_at)
        .bind(material.updated_at)
        .execute(&mut *tx)
        .await?;

        if material.current_stock.is_positive() {
            let opening = StockChangeRecord {
                id: Uuid::new_v4().to_string(),
                material_id: material.id.clone(),
                kind: StockChangeKind::In,
                quantity: material.current_stock,
                stock_before: Quantity::zero(),
                stock_after: material.current_stock,
                order_id: None,
                note: Some("Opening balance".to_string()),
                operator_id: None,
                created_at: now,
            };
            StockRecordRepository::insert(&mut tx, &opening).await?;
        }
        tx.commit().await?;

        debug!(material_id = %material.id, name = %material.name, "Material created");
        Ok(material)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Material>> {
        let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?");
        let material: Option<Material> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(material)
    }

    /// All materials, active first, then by name.
    pub async fn list(&self) -> DbResult<Vec<Material>> {
        let sql = format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials ORDER BY is_active DESC, name COLLATE NOCASE"
        );
        let materials: Vec<Material> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(materials)
    }

    pub async fn list_active_ids(&self) -> DbResult<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM materials WHERE is_active = 1 ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    /// Active materials at or below their threshold, emptiest first.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Material>> {
        let sql = format!(
            r#"
            SELECT {MATERIAL_COLUMNS}
            FROM materials
            WHERE is_active = 1 AND current_stock <= alert_threshold
            ORDER BY current_stock - alert_threshold, name COLLATE NOCASE
            "#
        );
        let materials: Vec<Material> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(materials)
    }

    pub async fn status_summary(&self) -> DbResult<MaterialStatusSummary> {
        let summary: MaterialStatusSummary = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) AS active,
                COALESCE(SUM(CASE WHEN is_active = 0 THEN 1 ELSE 0 END), 0) AS inactive,
                COALESCE(SUM(CASE WHEN is_active = 1 AND current_stock <= alert_threshold
                                  THEN 1 ELSE 0 END), 0) AS low_stock,
                COALESCE(SUM(CASE WHEN is_active = 1 AND current_stock = 0
                                  THEN 1 ELSE 0 END), 0) AS out_of_stock,
                (SELECT COUNT(*) FROM material_alerts WHERE resolved = 0) AS open_alerts
            FROM materials
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM materials")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Takes the write lock on a material and returns its current state.
    ///
    /// The no-op UPDATE is the transaction's first write; everything read
    /// after it is stable until commit.
    pub async fn lock_for_update(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Material>> {
        let touched = sqlx::query("UPDATE materials SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        if touched == 0 {
            return Ok(None);
        }

        let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?");
        let material: Option<Material> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(material)
    }

    /// Writes the cached balance.
    pub async fn set_stock(
        conn: &mut SqliteConnection,
        id: &str,
        stock: Quantity,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE materials SET current_stock = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(stock)
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Marks a material inactive. Its ledger is kept.
    pub async fn deactivate(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE materials SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
        )
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::memory_db;

    fn pearls(opening: i64, threshold: i64) -> NewMaterial {
        NewMaterial {
            name: "Tapioca pearls".to_string(),
            unit: "g".to_string(),
            opening_stock: Quantity::from_units(opening),
            alert_threshold: Quantity::from_units(threshold),
        }
    }

    #[tokio::test]
    async fn test_create_writes_opening_record() {
        let db = memory_db().await;
        let material = db.materials().create(&pearls(1000, 200), Utc::now()).await.unwrap();

        let loaded = db.materials().get_by_id(&material.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_stock, Quantity::from_units(1000));
        assert!(loaded.is_active);

        let (sum, count) = db.stock_records().ledger_sum(&material.id).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(sum, Quantity::from_units(1000));
    }

    #[tokio::test]
    async fn test_zero_opening_writes_no_record() {
        let db = memory_db().await;
        let material = db.materials().create(&pearls(0, 10), Utc::now()).await.unwrap();
        let (_, count) = db.stock_records().ledger_sum(&material.id).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_lock_for_update_missing() {
        let db = memory_db().await;
        let mut tx = db.begin().await.unwrap();
        assert!(MaterialRepository::lock_for_update(&mut tx, "nope")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_summary_and_low_stock() {
        let db = memory_db().await;
        let low = db.materials().create(&pearls(100, 200), Utc::now()).await.unwrap();
        let empty = db.materials().create(&pearls(0, 10), Utc::now()).await.unwrap();
        let fine = db.materials().create(&pearls(1000, 10), Utc::now()).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let retired = MaterialRepository::deactivate(&mut tx, &fine.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(retired, 1);
        tx.commit().await.unwrap();

        let summary = db.materials().status_summary().await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.inactive, 1);
        assert_eq!(summary.low_stock, 2);
        assert_eq!(summary.out_of_stock, 1);
        assert_eq!(summary.open_alerts, 0);

        let ids: Vec<String> = db
            .materials()
            .list_low_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![low.id, empty.id]);
    }
}
