//! # pearl-core: Pure Business Logic for the Pearl POS Ledger
//!
//! Domain types and pure calculations for order intake, stock consumption,
//! shifts and settlements. Nothing in this crate touches the database, the
//! network or the file system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pearl POS Ledger                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               pearl-ledger (services + transactions)             │   │
//! │  │   OrderIntake • StockLedger • ShiftLedger • SettlementAggregator │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pearl-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐ ┌──────────┐  │   │
//! │  │   │  types  │ │  money   │ │ pricing │ │ clock  │ │validation│  │   │
//! │  │   │  Order  │ │  Money   │ │ totals  │ │ today  │ │  rules   │  │   │
//! │  │   │  Shift  │ │ Quantity │ │ codes   │ │ bounds │ │          │  │   │
//! │  │   └─────────┘ └──────────┘ └─────────┘ └────────┘ └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    pearl-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Order, Material, Shift, Settlement, ...)
//! - [`money`] - Integer-cent money
//! - [`quantity`] - Fixed-point stock quantities
//! - [`pricing`] - Line and order totals, discounts
//! - [`order_code`] - Human-readable order codes (`#0126`)
//! - [`clock`] - Injected clock and business-day boundaries
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use pearl_core::money::Money;
//! use pearl_core::quantity::Quantity;
//!
//! let cup = Money::from_cents(6500);
//! assert_eq!((cup * 2).cents(), 13000);
//!
//! // 30 units of pearls per cup, two cups
//! let used = Quantity::from_units(30).times(2);
//! assert_eq!(used, Quantity::from_units(60));
//! ```

pub mod clock;
pub mod error;
pub mod money;
pub mod order_code;
pub mod pricing;
pub mod quantity;
pub mod types;
pub mod validation;

pub use clock::{BusinessCalendar, Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order_code::OrderCodeFormat;
pub use quantity::Quantity;
pub use types::*;

/// Base offset for the daily order sequence.
///
/// The first order of a business day receives `DEFAULT_INITIAL_SEQUENCE + 1`.
pub const DEFAULT_INITIAL_SEQUENCE: i64 = 125;

/// Maximum number of lines accepted on a single order.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity on a single order line.
///
/// ## Business Reason
/// Catches typos at the terminal (typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Largest balance, movement or recipe amount a material accepts
/// (one billion units).
///
/// Recipe amount × line quantity summed over a full order stays well inside
/// `i64` at this bound.
pub const MAX_STOCK_QUANTITY: Quantity = Quantity::from_units(1_000_000_000);
