//! Deferred automatic unlock.
//!
//! [`UnlockScheduler::schedule`] registers one task per room that sleeps
//! until the recorded unlock time, then removes the network block and marks
//! the room unlocked. The sleep is cancellable; once the task holds the room
//! guard and has seen that it was not cancelled, the action and store write
//! run to completion.

use std::sync::Arc;
use std::time::Duration;

use audnet_core::access::delay_until;
use audnet_core::actions::{ActionKind, ActionParams};
use audnet_core::types::{RoomNumber, Timestamp};
use audnet_db::repositories::RoomAccessRepo;
use audnet_db::DbPool;
use audnet_executor::{ActionError, ActionExecutor};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::AccessError;
use crate::guards::RoomGuards;
use crate::registry::TaskRegistry;

/// How a scheduled unlock ended.
#[derive(Debug)]
pub enum UnlockOutcome {
    /// Block removed and record marked unlocked.
    Unlocked,
    /// Cancelled before firing (superseded, manual unlock, or shutdown).
    Cancelled,
    /// The room has no record; nothing to unlock.
    RecordNotFound,
    /// The remove-block action failed; the record stays locked.
    ActionFailed(ActionError),
    /// The block was removed but the record could not be updated.
    StoreFailed(sqlx::Error),
}

/// Arms and runs scheduled unlocks. Cheap to clone.
#[derive(Clone)]
pub struct UnlockScheduler {
    pool: DbPool,
    executor: Arc<dyn ActionExecutor>,
    guards: RoomGuards,
    registry: TaskRegistry,
}

impl UnlockScheduler {
    pub fn new(
        pool: DbPool,
        executor: Arc<dyn ActionExecutor>,
        guards: RoomGuards,
        registry: TaskRegistry,
    ) -> Self {
        Self {
            pool,
            executor,
            guards,
            registry,
        }
    }

    /// Schedule the automatic unlock of `room` at `unlock_time`, replacing
    /// any task already scheduled for it. A past time fires immediately.
    pub async fn schedule(
        &self,
        room: RoomNumber,
        unlock_time: Timestamp,
    ) -> Result<(), AccessError> {
        let delay = delay_until(unlock_time, Utc::now());
        let scheduler = self.clone();

        self.registry
            .register(room, unlock_time, move |cancel| async move {
                let outcome = scheduler.run(room, delay, cancel).await;
                log_outcome(room, &outcome);
            })
            .await?;

        tracing::info!(
            room,
            %unlock_time,
            delay_secs = delay.as_secs(),
            "Scheduled automatic unlock"
        );
        Ok(())
    }

    /// Cancel the pending unlock for `room`. Idempotent.
    pub async fn cancel(&self, room: RoomNumber) -> bool {
        self.registry.cancel(room).await
    }

    /// Re-arm a task for every record that still has an unlock time.
    ///
    /// Called once at startup, since tasks live only in memory. Returns the
    /// number of tasks armed.
    pub async fn rearm_pending(&self) -> Result<usize, AccessError> {
        let pending = RoomAccessRepo::list_pending_unlocks(&self.pool).await?;
        let mut armed = 0;
        for record in pending {
            if let Some(unlock_time) = record.unlock_time {
                self.schedule(record.room_number, unlock_time).await?;
                armed += 1;
            }
        }
        Ok(armed)
    }

    async fn run(
        &self,
        room: RoomNumber,
        delay: Duration,
        cancel: CancellationToken,
    ) -> UnlockOutcome {
        tokio::select! {
            _ = cancel.cancelled() => return UnlockOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }

        let _guard = tokio::select! {
            _ = cancel.cancelled() => return UnlockOutcome::Cancelled,
            guard = self.guards.acquire(room) => guard,
        };

        // A lock or unlock may have superseded this task while it waited for
        // the guard.
        if cancel.is_cancelled() {
            return UnlockOutcome::Cancelled;
        }

        self.fire(room).await
    }

    async fn fire(&self, room: RoomNumber) -> UnlockOutcome {
        match RoomAccessRepo::find(&self.pool, room).await {
            Ok(Some(_)) => {}
            Ok(None) => return UnlockOutcome::RecordNotFound,
            Err(e) => return UnlockOutcome::StoreFailed(e),
        }

        if let Err(e) = self
            .executor
            .apply(ActionKind::RemoveBlock, &ActionParams::for_room(room))
            .await
        {
            return UnlockOutcome::ActionFailed(e);
        }

        match RoomAccessRepo::mark_unlocked(&self.pool, room).await {
            Ok(Some(_)) => UnlockOutcome::Unlocked,
            Ok(None) => UnlockOutcome::RecordNotFound,
            Err(e) => UnlockOutcome::StoreFailed(e),
        }
    }
}

fn log_outcome(room: RoomNumber, outcome: &UnlockOutcome) {
    match outcome {
        UnlockOutcome::Unlocked => tracing::info!(room, "Automatic unlock completed"),
        UnlockOutcome::Cancelled => tracing::debug!(room, "Scheduled unlock cancelled"),
        UnlockOutcome::RecordNotFound => {
            tracing::warn!(room, "Scheduled unlock found no record; nothing to unlock")
        }
        UnlockOutcome::ActionFailed(e) => {
            tracing::error!(room, error = %e, "Automatic unlock failed; room left locked")
        }
        UnlockOutcome::StoreFailed(e) => {
            tracing::error!(room, error = %e, "Automatic unlock could not update the record")
        }
    }
}
