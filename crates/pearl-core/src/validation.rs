//! # Validation Module
//!
//! Input validation for the ledger services.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Terminal / back-office front-end                              │
//! │  └── Basic format checks, immediate feedback                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: pearl-ledger services                                         │
//! │  └── THIS MODULE: rules checked before any transaction opens            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK constraints (stock ≥ 0, stock_after = before + quantity)     │
//! │  ├── UNIQUE indexes (retry key, daily sequence, open shift, open alert) │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A request rejected here has no partial effect.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::BPS_SCALE;
use crate::quantity::Quantity;
use crate::types::{DiscountKind, InventoryCountInput, NewMaterial, NewOrder, NewOrderLine};
use crate::{MAX_LINE_QUANTITY, MAX_ORDER_LINES, MAX_STOCK_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_ID_LEN: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product snapshot, material, unit).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an optional device identifier.
///
/// ## Rules
/// - `None` is allowed (orders and shifts without a device)
/// - `Some("")` is rejected so "no device" has exactly one spelling
pub fn validate_device_id(device_id: Option<&str>) -> ValidationResult<()> {
    let Some(device_id) = device_id else {
        return Ok(());
    };

    if device_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "device_id".to_string(),
        });
    }

    if device_id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "device_id".to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: `1..=MAX_LINE_QUANTITY`.
pub fn validate_line_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a discount request.
///
/// ## Rules
/// - `Percentage`: 0..=10000 bps
/// - `Fixed`: ≥ 0 cents (amounts above the subtotal are capped when priced)
/// - `None`: value ignored
pub fn validate_discount(kind: DiscountKind, value: i64) -> ValidationResult<()> {
    match kind {
        DiscountKind::None => Ok(()),
        DiscountKind::Percentage if !(0..=BPS_SCALE).contains(&value) => {
            Err(ValidationError::OutOfRange {
                field: "discount.value".to_string(),
                min: 0,
                max: BPS_SCALE,
            })
        }
        DiscountKind::Fixed if value < 0 => Err(ValidationError::MustNotBeNegative {
            field: "discount.value".to_string(),
        }),
        _ => Ok(()),
    }
}

fn stock_limit_exceeded(quantity: Quantity) -> CoreError {
    CoreError::StockLimitExceeded {
        quantity: quantity.to_string(),
        max: MAX_STOCK_QUANTITY.to_string(),
    }
}

/// Stock-in and waste quantities: `0 < quantity <= MAX_STOCK_QUANTITY`.
pub fn validate_movement_quantity(quantity: Quantity) -> CoreResult<()> {
    if !quantity.is_positive() {
        return Err(CoreError::NonPositiveStockQuantity(quantity.to_string()));
    }
    if quantity > MAX_STOCK_QUANTITY {
        return Err(stock_limit_exceeded(quantity));
    }
    Ok(())
}

/// Balance after receiving `quantity` on top of `current`.
pub fn stock_after_receipt(current: Quantity, quantity: Quantity) -> CoreResult<Quantity> {
    current
        .checked_add(quantity)
        .filter(|after| *after <= MAX_STOCK_QUANTITY)
        .ok_or_else(|| stock_limit_exceeded(quantity))
}

/// Absolute stock (adjustment target, opening balance, threshold):
/// `0..=MAX_STOCK_QUANTITY`.
pub fn validate_stock_level(field: &str, quantity: Quantity) -> ValidationResult<()> {
    if quantity.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if quantity > MAX_STOCK_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK_QUANTITY.milli(),
        });
    }
    Ok(())
}

/// A pre-assigned sequence must be positive.
pub fn validate_sequence(sequence: i64) -> ValidationResult<()> {
    if sequence <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "sequence".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

fn validate_line(position: usize, line: &NewOrderLine) -> CoreResult<()> {
    if line.product_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: format!("lines[{position}].product_id"),
        }
        .into());
    }
    validate_name("name", &line.name)?;
    if line.quantity <= 0 || line.quantity > MAX_LINE_QUANTITY {
        return Err(CoreError::InvalidLineQuantity {
            position,
            requested: line.quantity,
            max: MAX_LINE_QUANTITY,
        });
    }
    validate_price_cents("unit_price_cents", line.unit_price_cents)?;
    for addon in &line.addons {
        validate_name("addon.name", &addon.name)?;
        validate_price_cents("addon.price_cents", addon.price_cents)?;
    }
    Ok(())
}

/// Validates an incoming order before pricing.
///
/// ## Rules
/// - 1..=MAX_ORDER_LINES lines, each valid
/// - discount in range
/// - device id non-empty when present
/// - pre-assigned sequence positive when present
pub fn validate_new_order(order: &NewOrder) -> CoreResult<()> {
    if order.lines.is_empty() {
        return Err(CoreError::EmptyOrder);
    }
    if order.lines.len() > MAX_ORDER_LINES {
        return Err(CoreError::TooManyLines {
            max: MAX_ORDER_LINES,
        });
    }
    for (position, line) in order.lines.iter().enumerate() {
        validate_line(position, line)?;
    }
    validate_discount(order.discount.kind, order.discount.value)?;
    validate_device_id(order.device_id.as_deref())?;
    if let Some(sequence) = order.sequence {
        validate_sequence(sequence)?;
    }
    Ok(())
}

pub fn validate_new_material(material: &NewMaterial) -> ValidationResult<()> {
    validate_name("name", &material.name)?;
    validate_name("unit", &material.unit)?;
    validate_stock_level("opening_stock", material.opening_stock)?;
    validate_stock_level("alert_threshold", material.alert_threshold)
}

/// Recipe quantities are strictly positive and at most `MAX_STOCK_QUANTITY`.
pub fn validate_recipe_quantity(quantity: Quantity) -> ValidationResult<()> {
    if !quantity.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "recipe.quantity".to_string(),
        });
    }
    if quantity > MAX_STOCK_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "recipe.quantity".to_string(),
            min: 1,
            max: MAX_STOCK_QUANTITY.milli(),
        });
    }
    Ok(())
}

pub fn validate_inventory_counts(counts: &[InventoryCountInput]) -> ValidationResult<()> {
    for count in counts {
        validate_name("product_name", &count.product_name)?;
        if count.quantity_remaining < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "quantity_remaining".to_string(),
            });
        }
        if count.quantity_sold < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "quantity_sold".to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Discount;
    use chrono::Utc;

    fn order(lines: Vec<NewOrderLine>) -> NewOrder {
        NewOrder::new(Utc::now(), lines)
    }

    #[test]
    fn test_validate_line_quantity() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(999).is_ok());

        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(-1).is_err());
        assert!(validate_line_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(DiscountKind::Percentage, 10_000).is_ok());
        assert!(validate_discount(DiscountKind::Percentage, 10_001).is_err());
        assert!(validate_discount(DiscountKind::Percentage, -1).is_err());
        assert!(validate_discount(DiscountKind::Fixed, 0).is_ok());
        assert!(validate_discount(DiscountKind::Fixed, -5).is_err());
        assert!(validate_discount(DiscountKind::None, -5).is_ok());
    }

    #[test]
    fn test_validate_device_id() {
        assert!(validate_device_id(None).is_ok());
        assert!(validate_device_id(Some("A")).is_ok());
        assert!(validate_device_id(Some("")).is_err());
        assert!(validate_device_id(Some("   ")).is_err());
        assert!(validate_device_id(Some(&"x".repeat(65))).is_err());
    }

    #[test]
    fn test_validate_new_order() {
        let ok = order(vec![NewOrderLine::new("p1", "Milk tea", 6500, 2)]);
        assert!(validate_new_order(&ok).is_ok());

        assert!(matches!(
            validate_new_order(&order(vec![])),
            Err(CoreError::EmptyOrder)
        ));

        let too_many = order(vec![NewOrderLine::new("p1", "Milk tea", 6500, 1000)]);
        assert!(matches!(
            validate_new_order(&too_many),
            Err(CoreError::InvalidLineQuantity { requested: 1000, .. })
        ));

        let negative_price = order(vec![NewOrderLine::new("p1", "Milk tea", -1, 1)]);
        assert!(validate_new_order(&negative_price).is_err());

        let bad_addon = order(vec![NewOrderLine::new("p1", "Milk tea", 100, 1).with_addon("Jelly", -10)]);
        assert!(validate_new_order(&bad_addon).is_err());

        let bad_discount = ok.clone().with_discount(Discount::percentage(20_000));
        assert!(validate_new_order(&bad_discount).is_err());

        let mut bad_sequence = ok;
        bad_sequence.sequence = Some(0);
        assert!(validate_new_order(&bad_sequence).is_err());
    }

    #[test]
    fn test_validate_movement_quantity() {
        assert!(validate_movement_quantity(Quantity::from_milli(1)).is_ok());
        assert!(matches!(
            validate_movement_quantity(Quantity::zero()),
            Err(CoreError::NonPositiveStockQuantity(_))
        ));
        assert!(validate_movement_quantity(Quantity::from_units(-3)).is_err());

        assert!(validate_movement_quantity(MAX_STOCK_QUANTITY).is_ok());
        assert!(matches!(
            validate_movement_quantity(Quantity::from_milli(i64::MAX)),
            Err(CoreError::StockLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_stock_limits() {
        assert_eq!(
            stock_after_receipt(Quantity::from_units(10), Quantity::from_units(5)).unwrap(),
            Quantity::from_units(15)
        );
        assert!(stock_after_receipt(MAX_STOCK_QUANTITY, Quantity::from_milli(1)).is_err());
        let overflow = stock_after_receipt(Quantity::from_milli(i64::MAX), Quantity::from_milli(1));
        assert!(matches!(overflow, Err(CoreError::StockLimitExceeded { .. })));

        assert!(validate_stock_level("new_stock", MAX_STOCK_QUANTITY).is_ok());
        assert!(matches!(
            validate_stock_level("new_stock", Quantity::from_milli(i64::MAX)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate_recipe_quantity(Quantity::from_units(30)).is_ok());
        assert!(validate_recipe_quantity(Quantity::from_milli(i64::MAX)).is_err());
    }

    #[test]
    fn test_validate_new_material() {
        let material = NewMaterial {
            name: "Tapioca pearls".to_string(),
            unit: "g".to_string(),
            opening_stock: Quantity::from_units(1000),
            alert_threshold: Quantity::from_units(200),
        };
        assert!(validate_new_material(&material).is_ok());

        let negative = NewMaterial {
            opening_stock: Quantity::from_units(-1),
            ..material.clone()
        };
        assert!(validate_new_material(&negative).is_err());

        let unnamed = NewMaterial {
            name: " ".to_string(),
            ..material
        };
        assert!(validate_new_material(&unnamed).is_err());
    }

    #[test]
    fn test_validate_inventory_counts() {
        let count = InventoryCountInput {
            product_id: "p1".to_string(),
            product_name: "Milk tea".to_string(),
            quantity_remaining: 3,
            quantity_sold: 40,
        };
        assert!(validate_inventory_counts(&[count.clone()]).is_ok());

        let negative = InventoryCountInput {
            quantity_sold: -1,
            ..count
        };
        assert!(validate_inventory_counts(&[negative]).is_err());
    }
}
