//! # Recipe Repository
//!
//! Product → material requirements. Catalog management writes these rows;
//! the stock ledger only reads them.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use pearl_core::{Quantity, Recipe};

#[derive(Debug, Clone)]
pub struct RecipeRepository {
    pool: SqlitePool,
}

impl RecipeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RecipeRepository { pool }
    }

    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<Recipe>> {
        let recipes: Vec<Recipe> = sqlx::query_as(
            r#"
            SELECT id, product_id, material_id, quantity
            FROM recipes
            WHERE product_id = ?
            ORDER BY material_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(recipes)
    }

    /// Inserts or replaces the quantity for a `(product, material)` pair.
    ///
    /// ## Errors
    /// `DbError::ForeignKeyViolation` when the material does not exist.
    pub async fn upsert(
        &self,
        product_id: &str,
        material_id: &str,
        quantity: Quantity,
    ) -> DbResult<Recipe> {
        let recipe: Recipe = sqlx::query_as(
            r#"
            INSERT INTO recipes (id, product_id, material_id, quantity)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (product_id, material_id) DO UPDATE SET quantity = excluded.quantity
            RETURNING id, product_id, material_id, quantity
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(product_id)
        .bind(material_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;

        debug!(product_id, material_id, quantity = %quantity, "Recipe saved");
        Ok(recipe)
    }

    pub async fn remove(&self, product_id: &str, material_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE product_id = ? AND material_id = ?")
            .bind(product_id)
            .bind(material_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether any recipe references the material.
    pub async fn references_material(
        conn: &mut SqliteConnection,
        material_id: &str,
    ) -> DbResult<bool> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM recipes WHERE material_id = ?)")
                .bind(material_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(exists != 0)
    }
}
