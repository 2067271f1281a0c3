//! # Sequence Repository
//!
//! Per-business-day order counters.
//!
//! ```text
//! daily_sequences
//! ┌───────────────┬───────────────┐
//! │ business_date │ last_sequence │
//! ├───────────────┼───────────────┤
//! │ 2026-03-01    │ 131           │  ← next order gets 132
//! │ 2026-03-02    │ 125           │  ← row created, no orders yet
//! └───────────────┴───────────────┘
//! ```
//!
//! The row for a day is seeded from `max(initial, MAX(orders.sequence))` so a
//! database that already holds orders for the day (imports, replays) keeps
//! counting from where they left off.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Last sequence handed out for `day`, if the counter exists.
    pub async fn current(&self, day: NaiveDate) -> DbResult<Option<i64>> {
        let last: Option<i64> = sqlx::query_scalar(
            "SELECT last_sequence FROM daily_sequences WHERE business_date = ?",
        )
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;
        Ok(last)
    }

    /// Creates the counter row for `day` if missing.
    ///
    /// This is an INSERT, so as the first statement of a transaction it takes
    /// the database write lock before anything is read.
    pub async fn ensure_day(
        conn: &mut SqliteConnection,
        day: NaiveDate,
        initial_sequence: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_sequences (business_date, last_sequence, updated_at)
            VALUES (
                ?1,
                MAX(?2, COALESCE((SELECT MAX(sequence) FROM orders WHERE business_date = ?1), 0)),
                ?3
            )
            ON CONFLICT (business_date) DO NOTHING
            "#,
        )
        .bind(day)
        .bind(initial_sequence)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Increments the day's counter and returns the new value.
    pub async fn next(
        conn: &mut SqliteConnection,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        let next: i64 = sqlx::query_scalar(
            r#"
            UPDATE daily_sequences
            SET last_sequence = last_sequence + 1, updated_at = ?1
            WHERE business_date = ?2
            RETURNING last_sequence
            "#,
        )
        .bind(now)
        .bind(day)
        .fetch_one(&mut *conn)
        .await?;

        debug!(business_date = %day, sequence = next, "Sequence allocated");
        Ok(next)
    }

    /// Raises the day's counter to at least `sequence` (pre-assigned orders).
    pub async fn reserve(
        conn: &mut SqliteConnection,
        day: NaiveDate,
        sequence: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE daily_sequences
            SET last_sequence = MAX(last_sequence, ?1), updated_at = ?2
            WHERE business_date = ?3
            "#,
        )
        .bind(sequence)
        .bind(now)
        .bind(day)
        .execute(&mut *conn)
        .await?;

        debug!(business_date = %day, sequence, "Pre-assigned sequence reserved");
        Ok(())
    }
}
