//! Human-readable order codes.
//!
//! The code is derived from the daily sequence and nothing else:
//! `prefix + zero-padded sequence`, so `126` becomes `#0126`.

use serde::{Deserialize, Serialize};

/// Order code layout (configured under `[orders]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCodeFormat {
    pub prefix: String,
    pub width: usize,
}

impl OrderCodeFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        OrderCodeFormat {
            prefix: prefix.into(),
            width,
        }
    }

    /// ```rust
    /// use pearl_core::order_code::OrderCodeFormat;
    ///
    /// let fmt = OrderCodeFormat::default();
    /// assert_eq!(fmt.format(126), "#0126");
    /// assert_eq!(fmt.format(12345), "#12345");
    /// ```
    pub fn format(&self, sequence: i64) -> String {
        format!("{}{:0width$}", self.prefix, sequence, width = self.width)
    }
}

impl Default for OrderCodeFormat {
    fn default() -> Self {
        OrderCodeFormat::new("#", 4)
    }
}
