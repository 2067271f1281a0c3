//! # Sequence Allocator
//!
//! Hands out the daily order number and its display code.
//!
//! ## Allocation Inside the Order Transaction
//! ```text
//! BEGIN
//!   INSERT daily_sequences ... ON CONFLICT DO NOTHING   ← write lock taken here
//!   UPDATE daily_sequences SET last = last + 1 RETURNING last
//!   ... insert order, accumulate shift ...
//! COMMIT                                                ← lock released
//! ```
//!
//! The counter write is the first statement of the transaction, so two
//! terminals submitting at the same instant are serialized by SQLite: the
//! second waits (up to `busy_timeout`) and then reads the committed counter.
//! A rolled back order releases its number, which keeps the day gap-free.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;

use crate::error::LedgerResult;
use pearl_core::OrderCodeFormat;
use pearl_db::repository::sequence::SequenceRepository;
use pearl_db::Database;

#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    db: Database,
    initial_sequence: i64,
    format: OrderCodeFormat,
}

impl SequenceAllocator {
    pub fn new(db: Database, initial_sequence: i64, format: OrderCodeFormat) -> Self {
        SequenceAllocator {
            db,
            initial_sequence,
            format,
        }
    }

    /// Allocates the next sequence for `day` inside the caller's transaction.
    pub async fn next_sequence(
        &self,
        conn: &mut SqliteConnection,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> LedgerResult<i64> {
        SequenceRepository::ensure_day(&mut *conn, day, self.initial_sequence, now).await?;
        Ok(SequenceRepository::next(&mut *conn, day, now).await?)
    }

    /// Records a sequence the terminal already assigned, so later
    /// allocations for the day continue above it.
    pub async fn reserve(
        &self,
        conn: &mut SqliteConnection,
        day: NaiveDate,
        sequence: i64,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        SequenceRepository::ensure_day(&mut *conn, day, self.initial_sequence, now).await?;
        SequenceRepository::reserve(&mut *conn, day, sequence, now).await?;
        Ok(())
    }

    pub fn format_code(&self, sequence: i64) -> String {
        self.format.format(sequence)
    }

    /// Last sequence handed out for `day`, or the initial value if none.
    pub async fn last_allocated(&self, day: NaiveDate) -> LedgerResult<i64> {
        Ok(self
            .db
            .sequences()
            .current(day)
            .await?
            .unwrap_or(self.initial_sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, start_of_test};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_allocate_and_format() {
        let db = memory_db().await;
        let allocator = SequenceAllocator::new(db.clone(), 125, OrderCodeFormat::default());
        assert_eq!(allocator.last_allocated(day()).await.unwrap(), 125);

        let mut tx = db.begin().await.unwrap();
        let first = allocator.next_sequence(&mut tx, day(), start_of_test()).await.unwrap();
        let second = allocator.next_sequence(&mut tx, day(), start_of_test()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!((first, second), (126, 127));
        assert_eq!(allocator.format_code(first), "#0126");
        assert_eq!(allocator.last_allocated(day()).await.unwrap(), 127);
    }

    #[tokio::test]
    async fn test_reserved_sequence_is_skipped() {
        let db = memory_db().await;
        let allocator = SequenceAllocator::new(db.clone(), 125, OrderCodeFormat::default());

        let mut tx = db.begin().await.unwrap();
        allocator.reserve(&mut tx, day(), 140, start_of_test()).await.unwrap();
        assert_eq!(allocator.next_sequence(&mut tx, day(), start_of_test()).await.unwrap(), 141);
        tx.commit().await.unwrap();
    }
}
