//! # Alert Repository
//!
//! Low-stock alerts. A partial unique index keeps at most one unresolved
//! alert per material, so a racing second insert fails with
//! `DbError::UniqueViolation` instead of creating a duplicate.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use pearl_core::MaterialAlert;

const ALERT_COLUMNS: &str =
    "id, material_id, stock_level, threshold, resolved, raised_at, resolved_at";

#[derive(Debug, Clone)]
pub struct AlertRepository {
    pool: SqlitePool,
}

impl AlertRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AlertRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<MaterialAlert>> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM material_alerts WHERE id = ?");
        let alert: Option<MaterialAlert> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(alert)
    }

    /// Unresolved alerts, newest first.
    pub async fn list_active(&self) -> DbResult<Vec<MaterialAlert>> {
        let sql = format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM material_alerts
            WHERE resolved = 0
            ORDER BY raised_at DESC, rowid DESC
            "#
        );
        let alerts: Vec<MaterialAlert> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(alerts)
    }

    pub async fn find_open(
        conn: &mut SqliteConnection,
        material_id: &str,
    ) -> DbResult<Option<MaterialAlert>> {
        let sql = format!(
            "SELECT {ALERT_COLUMNS} FROM material_alerts WHERE material_id = ? AND resolved = 0"
        );
        let alert: Option<MaterialAlert> = sqlx::query_as(&sql)
            .bind(material_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(alert)
    }

    pub async fn insert(conn: &mut SqliteConnection, alert: &MaterialAlert) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO material_alerts (
                id, material_id, stock_level, threshold, resolved, raised_at, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.material_id)
        .bind(alert.stock_level)
        .bind(alert.threshold)
        .bind(alert.resolved)
        .bind(alert.raised_at)
        .bind(alert.resolved_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Resolves one alert. Returns 0 when it is missing or already resolved.
    pub async fn resolve(&self, id: &str, resolved_at: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE material_alerts SET resolved = 1, resolved_at = ?1 WHERE id = ?2 AND resolved = 0",
        )
        .bind(resolved_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Resolves whatever alert is open for the material.
    pub async fn resolve_open_for_material(
        conn: &mut SqliteConnection,
        material_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE material_alerts
            SET resolved = 1, resolved_at = ?1
            WHERE material_id = ?2 AND resolved = 0
            "#,
        )
        .bind(resolved_at)
        .bind(material_id)
        .execute(&mut *conn)
        .await?;

        let resolved = result.rows_affected();
        if resolved > 0 {
            debug!(material_id, "Open alert resolved");
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::memory_db;
    use crate::DbError;
    use pearl_core::{NewMaterial, Quantity};

    fn alert(id: &str, material_id: &str) -> MaterialAlert {
        MaterialAlert {
            id: id.to_string(),
            material_id: material_id.to_string(),
            stock_level: Quantity::from_units(100),
            threshold: Quantity::from_units(200),
            resolved: false,
            raised_at: Utc::now(),
            resolved_at: None,
        }
    }

    async fn material(db: &crate::Database) -> String {
        db.materials()
            .create(
                &NewMaterial {
                    name: "Tapioca pearls".to_string(),
                    unit: "g".to_string(),
                    opening_stock: Quantity::from_units(100),
                    alert_threshold: Quantity::from_units(200),
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_one_open_alert_per_material() {
        let db = memory_db().await;
        let material_id = material(&db).await;

        let mut tx = db.begin().await.unwrap();
        AlertRepository::insert(&mut tx, &alert("a1", &material_id)).await.unwrap();
        let err = AlertRepository::insert(&mut tx, &alert("a2", &material_id))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let open = AlertRepository::find_open(&mut tx, &material_id).await.unwrap();
        assert_eq!(open.map(|a| a.id), Some("a1".to_string()));
        tx.commit().await.unwrap();

        assert_eq!(db.alerts().list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_then_new_alert_allowed() {
        let db = memory_db().await;
        let material_id = material(&db).await;

        let mut tx = db.begin().await.unwrap();
        AlertRepository::insert(&mut tx, &alert("a1", &material_id)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.alerts().resolve("a1", Utc::now()).await.unwrap(), 1);
        assert_eq!(db.alerts().resolve("a1", Utc::now()).await.unwrap(), 0);
        assert_eq!(db.alerts().resolve("missing", Utc::now()).await.unwrap(), 0);

        let resolved = db.alerts().get_by_id("a1").await.unwrap().unwrap();
        assert!(resolved.resolved);
        assert!(resolved.resolved_at.is_some());

        let mut tx = db.begin().await.unwrap();
        AlertRepository::insert(&mut tx, &alert("a2", &material_id)).await.unwrap();
        assert_eq!(
            AlertRepository::resolve_open_for_material(&mut tx, &material_id, Utc::now())
                .await
                .unwrap(),
            1
        );
        tx.commit().await.unwrap();

        assert!(db.alerts().list_active().await.unwrap().is_empty());
    }
}
