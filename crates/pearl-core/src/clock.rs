//! # Clock & Business Calendar
//!
//! Single source of "now" and "today" for every service.
//!
//! ```text
//!   Clock::now() ──► DateTime<Utc> ──► BusinessCalendar ──► NaiveDate
//!                                       (store UTC offset)
//! ```
//!
//! Sequence allocation, order stats and settlements all ask the calendar for
//! the business date. Tests pin the clock with [`FixedClock`].

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::ValidationError;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to an instant; can be moved forward in tests.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        FixedClock {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
    }
}

/// Maps instants to store-local calendar dates.
#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    /// Builds a calendar for a store at `utc_offset_minutes` east of UTC.
    ///
    /// ## Errors
    /// Offsets outside ±24h are rejected.
    pub fn from_offset_minutes(utc_offset_minutes: i32) -> Result<Self, ValidationError> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "utc_offset_minutes".to_string(),
                min: -1439,
                max: 1439,
            }
        })?;
        Ok(BusinessCalendar { offset })
    }

    pub fn utc() -> Self {
        BusinessCalendar {
            offset: Utc.fix(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `at` in store-local time.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Today's business date according to `clock`.
    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.business_date(clock.now())
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        BusinessCalendar::utc()
    }
}
