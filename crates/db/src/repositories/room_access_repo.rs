//! Repository for the `auditorium_states` table.
//!
//! Every write is a single statement inside its own transaction, so a row is
//! always observed either fully before or fully after an update.

use audnet_core::types::{RoomNumber, Timestamp};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::room_access::RoomAccessRecord;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "room_number, is_network_on, unlock_time, updated_at";

/// Provides reads and the state-machine writes for auditorium access records.
pub struct RoomAccessRepo;

impl RoomAccessRepo {
    /// Find the record for a single room.
    pub async fn find(
        pool: &SqlitePool,
        room: RoomNumber,
    ) -> Result<Option<RoomAccessRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM auditorium_states WHERE room_number = $1");
        sqlx::query_as::<_, RoomAccessRecord>(&query)
            .bind(room)
            .fetch_optional(pool)
            .await
    }

    /// List every record ordered by room number.
    pub async fn list(pool: &SqlitePool) -> Result<Vec<RoomAccessRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM auditorium_states ORDER BY room_number");
        sqlx::query_as::<_, RoomAccessRecord>(&query)
            .fetch_all(pool)
            .await
    }

    /// List locked rooms that still have an automatic unlock recorded.
    pub async fn list_pending_unlocks(
        pool: &SqlitePool,
    ) -> Result<Vec<RoomAccessRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM auditorium_states
             WHERE is_network_on = 0 AND unlock_time IS NOT NULL
             ORDER BY room_number"
        );
        sqlx::query_as::<_, RoomAccessRecord>(&query)
            .fetch_all(pool)
            .await
    }

    /// Mark a room as locked until `unlock_time` (or indefinitely when `None`).
    ///
    /// Inserts the row if the room has never been seen before.
    pub async fn upsert_locked(
        pool: &SqlitePool,
        room: RoomNumber,
        unlock_time: Option<Timestamp>,
    ) -> Result<RoomAccessRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO auditorium_states (room_number, is_network_on, unlock_time, updated_at)
             VALUES ($1, 0, $2, $3)
             ON CONFLICT (room_number) DO UPDATE SET
                is_network_on = 0,
                unlock_time = excluded.unlock_time,
                updated_at = excluded.updated_at
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let record = sqlx::query_as::<_, RoomAccessRecord>(&query)
            .bind(room)
            .bind(unlock_time)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Mark a room as unlocked and clear any pending unlock time.
    ///
    /// Returns `None` if the room has no record.
    pub async fn mark_unlocked(
        pool: &SqlitePool,
        room: RoomNumber,
    ) -> Result<Option<RoomAccessRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE auditorium_states SET
                is_network_on = 1,
                unlock_time = NULL,
                updated_at = $2
             WHERE room_number = $1
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let record = sqlx::query_as::<_, RoomAccessRecord>(&query)
            .bind(room)
            .bind(Utc::now())
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Create an unlocked record for every roster room that has none yet.
    ///
    /// Existing rows are left untouched so restarts never clobber state.
    /// Returns the number of rows inserted.
    pub async fn seed_roster(pool: &SqlitePool, rooms: &[RoomNumber]) -> Result<u64, sqlx::Error> {
        let now = Utc::now();
        let mut inserted = 0;

        let mut tx = pool.begin().await?;
        for room in rooms {
            let result = sqlx::query(
                "INSERT INTO auditorium_states (room_number, is_network_on, unlock_time, updated_at)
                 VALUES ($1, 1, NULL, $2)
                 ON CONFLICT (room_number) DO NOTHING",
            )
            .bind(room)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        if inserted > 0 {
            tracing::info!(inserted, roster_size = rooms.len(), "Seeded auditorium records");
        }
        Ok(inserted)
    }
}
