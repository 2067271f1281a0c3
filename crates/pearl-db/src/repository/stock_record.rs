//! # Stock Record Repository
//!
//! Append-only stock ledger. Rows are never updated or deleted (enforced by
//! triggers); the sum of a material's `quantity` column is its balance.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use crate::repository::page;
use pearl_core::{Quantity, StockChangeRecord, StockRecordFilter};

const RECORD_COLUMNS: &str = r#"
    id, material_id, kind, quantity, stock_before, stock_after,
    order_id, note, operator_id, created_at
"#;

#[derive(Debug, Clone)]
pub struct StockRecordRepository {
    pool: SqlitePool,
}

impl StockRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRecordRepository { pool }
    }

    pub async fn insert(conn: &mut SqliteConnection, record: &StockChangeRecord) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_records (
                id, material_id, kind, quantity, stock_before, stock_after,
                order_id, note, operator_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&record.id)
        .bind(&record.material_id)
        .bind(record.kind)
        .bind(record.quantity)
        .bind(record.stock_before)
        .bind(record.stock_after)
        .bind(record.order_id.as_deref())
        .bind(record.note.as_deref())
        .bind(record.operator_id.as_deref())
        .bind(record.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Lists records, newest first.
    pub async fn list(&self, filter: &StockRecordFilter) -> DbResult<Vec<StockChangeRecord>> {
        let (limit, offset) = page(filter.limit, filter.offset);
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM stock_records
            WHERE (?1 IS NULL OR material_id = ?1)
              AND (?2 IS NULL OR kind = ?2)
              AND (?3 IS NULL OR order_id = ?3)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?4 OFFSET ?5
            "#
        );
        let records: Vec<StockChangeRecord> = sqlx::query_as(&sql)
            .bind(filter.material_id.as_deref())
            .bind(filter.kind)
            .bind(filter.order_id.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// `(Σ quantity, record count)` over a material's whole history.
    pub async fn ledger_sum(&self, material_id: &str) -> DbResult<(Quantity, i64)> {
        let (sum, count): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(quantity), 0), COUNT(*) FROM stock_records WHERE material_id = ?",
        )
        .bind(material_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((Quantity::from_milli(sum), count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::memory_db;
    use chrono::Utc;
    use pearl_core::{NewMaterial, StockChangeKind};

    #[tokio::test]
    async fn test_insert_list_and_append_only() {
        let db = memory_db().await;
        let material = db
            .materials()
            .create(
                &NewMaterial {
                    name: "Black tea".to_string(),
                    unit: "g".to_string(),
                    opening_stock: Quantity::from_units(50),
                    alert_threshold: Quantity::zero(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let waste = StockChangeRecord {
            id: "r-waste".to_string(),
            material_id: material.id.clone(),
            kind: StockChangeKind::Waste,
            quantity: Quantity::from_units(-5),
            stock_before: Quantity::from_units(50),
            stock_after: Quantity::from_units(45),
            order_id: None,
            note: Some("spilled".to_string()),
            operator_id: Some("staff-1".to_string()),
            created_at: Utc::now(),
        };
        let mut tx = db.begin().await.unwrap();
        StockRecordRepository::insert(&mut tx, &waste).await.unwrap();
        tx.commit().await.unwrap();

        let all = db
            .stock_records()
            .list(&StockRecordFilter {
                material_id: Some(material.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], waste);

        let only_waste = db
            .stock_records()
            .list(&StockRecordFilter {
                kind: Some(StockChangeKind::Waste),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(only_waste.len(), 1);

        let (sum, count) = db.stock_records().ledger_sum(&material.id).await.unwrap();
        assert_eq!((sum, count), (Quantity::from_units(45), 2));

        let update = sqlx::query("UPDATE stock_records SET note = 'edited' WHERE id = 'r-waste'")
            .execute(db.pool())
            .await;
        assert!(update.is_err());
    }

    #[tokio::test]
    async fn test_inconsistent_record_rejected() {
        let db = memory_db().await;
        let material = db
            .materials()
            .create(
                &NewMaterial {
                    name: "Milk".to_string(),
                    unit: "ml".to_string(),
                    opening_stock: Quantity::zero(),
                    alert_threshold: Quantity::zero(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let broken = StockChangeRecord {
            id: "bad".to_string(),
            material_id: material.id,
            kind: StockChangeKind::Adjust,
            quantity: Quantity::from_units(3),
            stock_before: Quantity::zero(),
            stock_after: Quantity::from_units(4),
            order_id: None,
            note: None,
            operator_id: None,
            created_at: Utc::now(),
        };
        let mut tx = db.begin().await.unwrap();
        let err = StockRecordRepository::insert(&mut tx, &broken).await.unwrap_err();
        assert!(matches!(err, crate::DbError::CheckViolation { .. }));
    }
}
