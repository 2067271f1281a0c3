//! # Recipe Index
//!
//! Product → material requirements read by [`StockLedger::consume_for_order`].
//! Writes exist for catalog management and seeding.
//!
//! [`StockLedger::consume_for_order`]: crate::stock::StockLedger::consume_for_order

use tracing::info;

use crate::error::LedgerResult;
use pearl_core::validation::validate_recipe_quantity;
use pearl_core::{Quantity, Recipe, ValidationError};
use pearl_db::{Database, DbError};

#[derive(Debug, Clone)]
pub struct RecipeIndex {
    db: Database,
}

impl RecipeIndex {
    pub fn new(db: Database) -> Self {
        RecipeIndex { db }
    }

    pub async fn for_product(&self, product_id: &str) -> LedgerResult<Vec<Recipe>> {
        Ok(self.db.recipes().for_product(product_id).await?)
    }

    /// Sets how much of a material one unit of the product uses.
    ///
    /// ## Errors
    /// Validation error for a non-positive quantity or an unknown or
    /// inactive material.
    pub async fn set_recipe(
        &self,
        product_id: &str,
        material_id: &str,
        quantity: Quantity,
    ) -> LedgerResult<Recipe> {
        validate_recipe_quantity(quantity)?;
        if product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            }
            .into());
        }

        let active = self
            .db
            .materials()
            .get_by_id(material_id)
            .await?
            .is_some_and(|m| m.is_active);
        if !active {
            return Err(unknown_material().into());
        }

        let recipe = match self.db.recipes().upsert(product_id, material_id, quantity).await {
            Ok(recipe) => recipe,
            // Material removed between the check and the write
            Err(DbError::ForeignKeyViolation { .. }) => return Err(unknown_material().into()),
            Err(e) => return Err(e.into()),
        };

        info!(product_id, material_id, quantity = %quantity, "Recipe set");
        Ok(recipe)
    }

    pub async fn remove_recipe(&self, product_id: &str, material_id: &str) -> LedgerResult<bool> {
        Ok(self.db.recipes().remove(product_id, material_id).await?)
    }
}

fn unknown_material() -> ValidationError {
    ValidationError::InvalidFormat {
        field: "material_id".to_string(),
        reason: "unknown or inactive material".to_string(),
    }
}
