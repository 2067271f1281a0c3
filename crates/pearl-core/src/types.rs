//! # Domain Types
//!
//! Core domain types used throughout the Pearl POS ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │     Order       │   │    Material     │   │     Shift       │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │        │
//! │  │  sequence       │   │  current_stock  │   │  device_id?     │        │
//! │  │  order_code     │   │  threshold      │   │  running totals │        │
//! │  │  lines[]        │   │                 │   │  settlement_id? │        │
//! │  └────────┬────────┘   └────────┬────────┘   └────────┬────────┘        │
//! │           │                     │                     │                 │
//! │  ┌────────▼────────┐   ┌────────▼────────┐   ┌────────▼────────┐        │
//! │  │   OrderLine     │   │ StockChange     │   │   Settlement    │        │
//! │  │  name_snapshot  │   │ Record          │   │  totals         │        │
//! │  │  addons[]       │   │ MaterialAlert   │   │  InventoryCount │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has a UUID v4 `id`. Orders also carry a human-readable
//! business id: the daily `sequence` and its `order_code` (`#0126`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order was paid. Counts towards revenue, shifts and settlements.
    #[default]
    Completed,
    /// Order was cancelled after the fact. Counted, never summed.
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// QR / mobile wallet transfer.
    MobileWallet,
}

// =============================================================================
// Discount
// =============================================================================

/// How a discount value is interpreted.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    #[default]
    None,
    /// `value` is basis points of the subtotal (1000 = 10%).
    Percentage,
    /// `value` is a flat amount in cents.
    Fixed,
}

/// Discount requested by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount {
    pub kind: DiscountKind,
    pub value: i64,
}

impl Discount {
    pub const fn percentage(bps: i64) -> Self {
        Discount {
            kind: DiscountKind::Percentage,
            value: bps,
        }
    }

    pub const fn fixed(cents: i64) -> Self {
        Discount {
            kind: DiscountKind::Fixed,
            value: cents,
        }
    }
}

/// Discount descriptor stored on an order: the request plus the resolved
/// amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedDiscount {
    pub kind: DiscountKind,
    pub value: i64,
    pub amount_cents: i64,
}

// =============================================================================
// Order Lines
// =============================================================================

/// Add-on snapshot (extra pearls, oat milk, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Addon {
    pub name: String,
    pub price_cents: i64,
}

/// A line as submitted by the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrderLine {
    pub product_id: String,
    /// Product name at the moment of sale.
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    #[serde(default)]
    pub addons: Vec<Addon>,
}

impl NewOrderLine {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price_cents: i64,
        quantity: i64,
    ) -> Self {
        NewOrderLine {
            product_id: product_id.into(),
            name: name.into(),
            unit_price_cents,
            quantity,
            addons: Vec::new(),
        }
    }

    pub fn with_addon(mut self, name: impl Into<String>, price_cents: i64) -> Self {
        self.addons.push(Addon {
            name: name.into(),
            price_cents,
        });
        self
    }
}

/// A persisted order line.
/// Uses the snapshot pattern: name and prices are frozen at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub addons: Vec<Addon>,
    /// `(unit_price + Σ addon price) × quantity`.
    pub subtotal_cents: i64,
    /// Zero-based position within the order.
    pub position: i64,
}

impl OrderLine {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order as submitted by a terminal (online or from the offline queue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrder {
    /// Terminal timestamp. Together with `device_id` this is the retry key.
    #[ts(as = "String")]
    pub ordered_at: DateTime<Utc>,
    pub lines: Vec<NewOrderLine>,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub customer_segment: Option<String>,
    pub device_id: Option<String>,
    /// Pre-assigned sequence (replay / import). Never overwritten.
    pub sequence: Option<i64>,
    /// Pre-assigned order code. Only honored together with `sequence`.
    pub order_code: Option<String>,
}

impl NewOrder {
    pub fn new(ordered_at: DateTime<Utc>, lines: Vec<NewOrderLine>) -> Self {
        NewOrder {
            ordered_at,
            lines,
            discount: Discount::default(),
            status: OrderStatus::Completed,
            payment_method: PaymentMethod::Cash,
            customer_segment: None,
            device_id: None,
            sequence: None,
            order_code: None,
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_discount(mut self, discount: Discount) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }
}

/// A persisted order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub sequence: i64,
    pub order_code: String,
    #[ts(as = "String")]
    pub ordered_at: DateTime<Utc>,
    /// Calendar date of `ordered_at` in the store timezone.
    #[ts(as = "String")]
    pub business_date: NaiveDate,
    pub lines: Vec<OrderLine>,
    pub subtotal_cents: i64,
    pub discount: AppliedDiscount,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub customer_segment: Option<String>,
    pub device_id: Option<String>,
    pub shift_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount_amount(&self) -> Money {
        Money::from_cents(self.discount.amount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }
}

/// Filters for the admin order list. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderFilter {
    /// Inclusive lower business date.
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    /// Inclusive upper business date.
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
    pub status: Option<OrderStatus>,
    pub device_id: Option<String>,
    pub shift_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Order counters for one business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderStats {
    pub total_orders: i64,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
    /// Σ total of completed orders only.
    pub total_revenue_cents: i64,
}

// =============================================================================
// Materials & Recipes
// =============================================================================

/// A raw ingredient tracked by the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Material {
    pub id: String,
    pub name: String,
    /// Display unit ("g", "ml", "pcs").
    pub unit: String,
    /// Cached balance. Always ≥ 0 and equal to the last record's `stock_after`.
    pub current_stock: Quantity,
    pub alert_threshold: Quantity,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Material {
    #[inline]
    pub fn is_low(&self) -> bool {
        self.current_stock <= self.alert_threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewMaterial {
    pub name: String,
    pub unit: String,
    /// Opening balance, written as an `In` record when non-zero.
    pub opening_stock: Quantity,
    pub alert_threshold: Quantity,
}

/// One product requires `quantity` of one material per unit sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Recipe {
    pub id: String,
    pub product_id: String,
    pub material_id: String,
    pub quantity: Quantity,
}

// =============================================================================
// Stock Ledger
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockChangeKind {
    In,
    Out,
    Adjust,
    Waste,
}

/// Append-only stock ledger entry.
///
/// ## Invariant
/// `stock_after = stock_before + quantity`, and `stock_after` equals the
/// material's balance at the instant the record was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockChangeRecord {
    pub id: String,
    pub material_id: String,
    pub kind: StockChangeKind,
    /// Signed delta.
    pub quantity: Quantity,
    pub stock_before: Quantity,
    pub stock_after: Quantity,
    pub order_id: Option<String>,
    pub note: Option<String>,
    pub operator_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockRecordFilter {
    pub material_id: Option<String>,
    pub kind: Option<StockChangeKind>,
    pub order_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Low-stock alert. At most one unresolved alert exists per material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MaterialAlert {
    pub id: String,
    pub material_id: String,
    /// Stock at the instant the alert was raised.
    pub stock_level: Quantity,
    /// Threshold at the instant the alert was raised.
    pub threshold: Quantity,
    pub resolved: bool,
    #[ts(as = "String")]
    pub raised_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Counters for the back-office inventory header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MaterialStatusSummary {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    /// Active materials at or below their threshold (includes out of stock).
    pub low_stock: i64,
    /// Active materials with zero stock.
    pub out_of_stock: i64,
    pub open_alerts: i64,
}

/// Result of recomputing a balance from the record history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BalanceCheck {
    pub material_id: String,
    pub cached_stock: Quantity,
    /// Σ quantity over every record of the material.
    pub ledger_stock: Quantity,
    pub record_count: i64,
    pub consistent: bool,
}

// =============================================================================
// Shifts
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

/// A work session on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shift {
    pub id: String,
    /// `None` is its own device for the one-open-shift rule.
    pub device_id: Option<String>,
    pub status: ShiftStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub total_orders: i64,
    pub total_revenue_cents: i64,
    pub total_discount_cents: i64,
    pub net_revenue_cents: i64,
    pub settlement_id: Option<String>,
}

impl Shift {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }
}

// =============================================================================
// Settlements
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SettlementSource {
    /// Produced by closing a shift; totals come from the running counters.
    Shift,
    /// Manual end-of-day submission; totals come from a fresh order scan.
    Manual,
}

/// Per-product count entered at settlement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryCountInput {
    pub product_id: String,
    pub product_name: String,
    pub quantity_remaining: i64,
    pub quantity_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryCount {
    pub id: String,
    pub settlement_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity_remaining: i64,
    pub quantity_sold: i64,
}

/// Caller-supplied data for a settlement (shift close or manual submit).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettlementSeed {
    /// Used by manual submission. Shift close takes the shift's device.
    pub device_id: Option<String>,
    pub incentive_target: Option<i64>,
    pub incentive_items_sold: Option<i64>,
    pub notes: Option<String>,
    #[serde(default)]
    pub inventory_counts: Vec<InventoryCountInput>,
}

impl SettlementSeed {
    /// `items_sold >= target` when both are known.
    pub fn incentive_achieved(&self) -> bool {
        match (self.incentive_target, self.incentive_items_sold) {
            (Some(target), Some(sold)) => sold >= target,
            _ => false,
        }
    }
}

/// Immutable financial and inventory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Settlement {
    pub id: String,
    #[ts(as = "String")]
    pub business_date: NaiveDate,
    pub source: SettlementSource,
    pub shift_id: Option<String>,
    pub device_id: Option<String>,
    pub total_orders: i64,
    pub total_revenue_cents: i64,
    pub total_discount_cents: i64,
    pub net_revenue_cents: i64,
    pub incentive_target: Option<i64>,
    pub incentive_items_sold: Option<i64>,
    pub incentive_achieved: bool,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub submitted_at: DateTime<Utc>,
    pub inventory_counts: Vec<InventoryCount>,
}

// =============================================================================
// Unit Tests
// =============================================================================
