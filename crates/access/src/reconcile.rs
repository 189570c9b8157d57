//! Reconciliation sweep.
//!
//! Asks the external system which rooms it is blocking and restores every
//! one of them. The live report is ground truth; the store is not consulted
//! to pick targets. This recovers rooms stranded by a crash between the
//! block being applied and the unlock being scheduled.

use audnet_core::actions::{parse_blocked_rooms, ActionKind, ActionParams};
use audnet_core::types::RoomNumber;
use audnet_db::repositories::RoomAccessRepo;
use serde::Serialize;

use crate::error::AccessError;
use crate::service::AccessService;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Rooms whose access was restored.
    pub restored: Vec<RoomNumber>,
    /// Rooms reported blocked whose restore failed.
    pub failed: Vec<RoomNumber>,
}

impl AccessService {
    /// Restore every room the external status query reports as blocked.
    ///
    /// A failed status query fails the sweep. A failed restore of one room is
    /// logged and recorded in [`RestoreReport::failed`]; the sweep continues.
    pub async fn check_and_restore(&self) -> Result<RestoreReport, AccessError> {
        let output = self
            .executor
            .apply(ActionKind::QueryStatus, &ActionParams::all_rooms())
            .await?;
        let blocked = parse_blocked_rooms(&output);

        tracing::info!(blocked = ?blocked, "Reconciliation sweep started");

        let mut report = RestoreReport::default();
        for room in blocked {
            match self.restore_room(room).await {
                Ok(()) => report.restored.push(room),
                Err(e) => {
                    tracing::error!(room, error = %e, "Failed to restore room during sweep");
                    report.failed.push(room);
                }
            }
        }

        tracing::info!(
            restored = ?report.restored,
            failed = ?report.failed,
            "Reconciliation sweep finished",
        );
        Ok(report)
    }

    async fn restore_room(&self, room: RoomNumber) -> Result<(), AccessError> {
        let _guard = self.guards.acquire(room).await;

        self.executor
            .apply(ActionKind::RemoveBlock, &ActionParams::for_room(room))
            .await?;

        if RoomAccessRepo::mark_unlocked(&self.pool, room).await?.is_none() {
            tracing::warn!(room, "Restored room has no record");
        }
        self.scheduler.cancel(room).await;

        tracing::info!(room, "Room restored by sweep");
        Ok(())
    }
}
