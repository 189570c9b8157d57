//! Lock / unlock state machine over the store, the executor and the
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use audnet_core::access::{lock_duration, validate_action_value, validate_room_number};
use audnet_core::actions::{ActionKind, ActionParams, PARAM_CLASS_NUMBER, PARAM_STATE};
use audnet_core::error::CoreError;
use audnet_core::types::{RoomNumber, Timestamp};
use audnet_db::models::room_access::RoomAccessRecord;
use audnet_db::repositories::RoomAccessRepo;
use audnet_db::DbPool;
use audnet_executor::ActionExecutor;
use chrono::Utc;

use crate::error::AccessError;
use crate::guards::RoomGuards;
use crate::registry::{PendingUnlock, ShutdownReport, TaskRegistry};
use crate::scheduler::UnlockScheduler;

/// What [`AccessService::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    /// Roster rooms that had no record and were inserted.
    pub seeded: u64,
    /// Pending automatic unlocks re-armed from the store.
    pub rearmed: usize,
}

/// Entry point for every auditorium access operation. Cheap to clone.
#[derive(Clone)]
pub struct AccessService {
    pub(crate) pool: DbPool,
    pub(crate) executor: Arc<dyn ActionExecutor>,
    pub(crate) guards: RoomGuards,
    pub(crate) registry: TaskRegistry,
    pub(crate) scheduler: UnlockScheduler,
}

impl AccessService {
    pub fn new(pool: DbPool, executor: Arc<dyn ActionExecutor>) -> Self {
        let guards = RoomGuards::new();
        let registry = TaskRegistry::new();
        let scheduler = UnlockScheduler::new(
            pool.clone(),
            Arc::clone(&executor),
            guards.clone(),
            registry.clone(),
        );
        Self {
            pool,
            executor,
            guards,
            registry,
            scheduler,
        }
    }

    /// Seed the roster and re-arm every unlock recorded before a restart.
    ///
    /// A past-due unlock time fires immediately.
    pub async fn start(&self, roster: &[RoomNumber]) -> Result<StartupReport, AccessError> {
        let seeded = RoomAccessRepo::seed_roster(&self.pool, roster).await?;
        let rearmed = self.scheduler.rearm_pending().await?;
        tracing::info!(seeded, rearmed, "Access service started");
        Ok(StartupReport { seeded, rearmed })
    }

    /// Lock `room` for `minutes`, then unlock it automatically.
    pub async fn lock(
        &self,
        room: RoomNumber,
        minutes: i64,
    ) -> Result<RoomAccessRecord, AccessError> {
        let duration = lock_duration(minutes)?;
        self.lock_for(room, duration).await
    }

    /// Lock `room` for an arbitrary duration.
    ///
    /// The block is applied first; if that fails nothing is written or
    /// scheduled. A lock on a room with a pending unlock restarts the timer.
    /// A lock whose block was applied after shutdown began still succeeds;
    /// its persisted unlock time is re-armed by the next [`start`](Self::start).
    pub async fn lock_for(
        &self,
        room: RoomNumber,
        duration: chrono::Duration,
    ) -> Result<RoomAccessRecord, AccessError> {
        validate_room_number(room)?;
        if self.registry.is_shutting_down() {
            return Err(AccessError::ShuttingDown);
        }

        let _guard = self.guards.acquire(room).await;
        // The drain may have started while this call waited for the guard.
        if self.registry.is_shutting_down() {
            return Err(AccessError::ShuttingDown);
        }

        self.executor
            .apply(ActionKind::ApplyBlock, &ActionParams::for_room(room))
            .await?;

        let requested = Utc::now() + duration;
        let record = RoomAccessRepo::upsert_locked(&self.pool, room, Some(requested)).await?;
        // Arm with the stored value so the live task and the record agree.
        let unlock_time = record.unlock_time.unwrap_or(requested);
        match self.scheduler.schedule(room, unlock_time).await {
            Ok(()) => tracing::info!(room, %unlock_time, "Room locked"),
            // The block and the record are in place; only the timer is missing.
            Err(AccessError::ShuttingDown) => tracing::warn!(
                room,
                %unlock_time,
                "Room locked during shutdown; the unlock will be re-armed at next start",
            ),
            Err(e) => return Err(e),
        }
        Ok(record)
    }

    /// Restore network access to `room` and drop its pending unlock.
    ///
    /// Unlocking an unlocked room succeeds. Returns `None` when the room has
    /// no record; the block is still removed.
    pub async fn unlock(&self, room: RoomNumber) -> Result<Option<RoomAccessRecord>, AccessError> {
        validate_room_number(room)?;
        let _guard = self.guards.acquire(room).await;

        self.executor
            .apply(ActionKind::RemoveBlock, &ActionParams::for_room(room))
            .await?;

        let record = RoomAccessRepo::mark_unlocked(&self.pool, room).await?;
        self.scheduler.cancel(room).await;

        match &record {
            Some(_) => tracing::info!(room, "Room unlocked"),
            None => tracing::warn!(room, "Room has no record; nothing to unlock in the store"),
        }
        Ok(record)
    }

    /// Apply an arbitrary firewall class/state to `room`.
    ///
    /// Not tracked by the state machine. Returns the action output.
    pub async fn configure(
        &self,
        room: RoomNumber,
        class_number: i64,
        state: &str,
    ) -> Result<String, AccessError> {
        validate_room_number(room)?;
        if class_number < 0 {
            return Err(CoreError::Validation(format!(
                "Class number must not be negative, got {class_number}"
            ))
            .into());
        }
        validate_action_value("state", state)?;

        let params = ActionParams::for_room(room)
            .with(PARAM_CLASS_NUMBER, class_number.to_string())
            .with(PARAM_STATE, state);
        let output = self.executor.apply(ActionKind::Configure, &params).await?;

        tracing::info!(room, class_number, state, "Room configured");
        Ok(output)
    }

    /// Ask the external system for the live network state of `room`.
    ///
    /// Read-only: the store and the scheduler are not touched. Returns the
    /// action output.
    pub async fn check_network(&self, room: RoomNumber) -> Result<String, AccessError> {
        validate_room_number(room)?;
        let output = self
            .executor
            .apply(ActionKind::QueryStatus, &ActionParams::for_room(room))
            .await?;

        tracing::info!(room, "Room network checked");
        Ok(output)
    }

    /// Every persisted record, ordered by room number.
    pub async fn status(&self) -> Result<Vec<RoomAccessRecord>, AccessError> {
        Ok(RoomAccessRepo::list(&self.pool).await?)
    }

    /// Scheduled unlocks currently live in memory.
    pub async fn pending(&self) -> Vec<PendingUnlock> {
        self.registry.pending().await
    }

    /// Fire time of the live scheduled unlock for `room`.
    pub async fn scheduled_unlock(&self, room: RoomNumber) -> Option<Timestamp> {
        self.registry.fire_at(room).await
    }

    /// Cancel every scheduled unlock and wait up to `timeout` for them.
    ///
    /// Persisted unlock times are kept so the next start re-arms them.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        self.registry.shutdown(timeout).await
    }
}
