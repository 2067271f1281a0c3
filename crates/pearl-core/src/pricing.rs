//! # Order Pricing
//!
//! Pure price computation for an incoming order.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  For each line:                                                         │
//! │    line_subtotal = (unit_price + Σ addon.price) × quantity              │
//! │                                                                         │
//! │  subtotal = Σ line_subtotal                                             │
//! │                                                                         │
//! │  discount_amount = match kind {                                         │
//! │      None       => 0                                                    │
//! │      Percentage => subtotal × bps / 10000   (rounded half up)           │
//! │      Fixed      => value                                                │
//! │  }  capped to [0, subtotal]                                             │
//! │                                                                         │
//! │  total = max(subtotal − discount_amount, 0)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The discount is capped at the subtotal so the amount recorded on the
//! order (and rolled into shift and settlement discount totals) never
//! exceeds what was actually taken off.

use crate::money::Money;
use crate::types::{AppliedDiscount, Discount, DiscountKind, NewOrderLine};

/// Prices computed for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    /// Line subtotals in submission order.
    pub line_subtotals: Vec<Money>,
    pub subtotal: Money,
    pub discount: AppliedDiscount,
    pub total: Money,
}

/// Unit price including add-on surcharges.
pub fn effective_unit_price(line: &NewOrderLine) -> Money {
    let addons: Money = line
        .addons
        .iter()
        .map(|a| Money::from_cents(a.price_cents))
        .sum();
    Money::from_cents(line.unit_price_cents) + addons
}

/// `(unit_price + Σ addon price) × quantity`.
///
/// ## Example
/// ```rust
/// use pearl_core::pricing::line_subtotal;
/// use pearl_core::types::NewOrderLine;
///
/// let line = NewOrderLine::new("p1", "Milk tea", 6500, 2).with_addon("Pearls", 1000);
/// assert_eq!(line_subtotal(&line).cents(), 15000);
/// ```
pub fn line_subtotal(line: &NewOrderLine) -> Money {
    effective_unit_price(line).multiply_quantity(line.quantity)
}

/// Resolves the discount amount against a subtotal.
pub fn discount_amount(subtotal: Money, discount: Discount) -> Money {
    let raw = match discount.kind {
        DiscountKind::None => Money::zero(),
        DiscountKind::Percentage => subtotal.percentage(discount.value),
        DiscountKind::Fixed => Money::from_cents(discount.value),
    };
    if raw.is_negative() || subtotal.is_negative() {
        return Money::zero();
    }
    raw.min(subtotal)
}

/// Prices a whole order.
///
/// ## Example
/// ```rust
/// use pearl_core::pricing::price_order;
/// use pearl_core::types::{Discount, NewOrderLine};
///
/// let lines = vec![NewOrderLine::new("p1", "Milk tea", 6500, 2)];
/// let priced = price_order(&lines, Discount::percentage(1000));
/// assert_eq!(priced.subtotal.cents(), 13000);
/// assert_eq!(priced.discount.amount_cents, 1300);
/// assert_eq!(priced.total.cents(), 11700);
/// ```
pub fn price_order(lines: &[NewOrderLine], discount: Discount) -> PricedOrder {
    let line_subtotals: Vec<Money> = lines.iter().map(line_subtotal).collect();
    let subtotal: Money = line_subtotals.iter().sum();
    let amount = discount_amount(subtotal, discount);

    PricedOrder {
        line_subtotals,
        subtotal,
        discount: AppliedDiscount {
            kind: discount.kind,
            value: discount.value,
            amount_cents: amount.cents(),
        },
        total: subtotal.saturating_sub_to_zero(amount),
    }
}
