//! Process-wide registry of scheduled unlock tasks.
//!
//! Holds at most one slot per room. Registering a task for a room that
//! already has one cancels the old task inside the same critical section, so
//! no handle is ever orphaned. Every task token is a child of a master token
//! owned here; [`TaskRegistry::shutdown`] cancels the master and waits for
//! the tasks to settle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use audnet_core::types::{RoomNumber, Timestamp};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AccessError;

/// A live scheduled unlock, as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingUnlock {
    pub room_number: RoomNumber,
    pub fire_at: Timestamp,
}

/// Result of draining the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that were cancelled and settled.
    pub cancelled: usize,
    /// Rooms whose task did not settle before the deadline and was aborted.
    pub unsettled: Vec<RoomNumber>,
}

struct TaskSlot {
    /// Generation id; a finishing task only clears its own slot.
    id: u64,
    fire_at: Timestamp,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct RegistryInner {
    slots: Mutex<HashMap<RoomNumber, TaskSlot>>,
    master: CancellationToken,
    next_id: AtomicU64,
}

/// Shared handle to the task registry. Cheap to clone.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                slots: Mutex::new(HashMap::new()),
                master: CancellationToken::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Spawn `task` as the single scheduled task for `room`.
    ///
    /// `task` receives the cancellation token it must observe. Any task
    /// already registered for the room is cancelled first.
    pub async fn register<F, Fut>(
        &self,
        room: RoomNumber,
        fire_at: Timestamp,
        task: F,
    ) -> Result<(), AccessError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slots = self.inner.slots.lock().await;
        if self.inner.master.is_cancelled() {
            return Err(AccessError::ShuttingDown);
        }

        if let Some(previous) = slots.remove(&room) {
            previous.cancel.cancel();
            tracing::debug!(
                room,
                previous_fire_at = %previous.fire_at,
                %fire_at,
                "Superseded scheduled unlock",
            );
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.inner.master.child_token();
        let fut = task(cancel.clone());
        let registry = self.clone();
        let handle = tokio::spawn(async move {
            fut.await;
            registry.release(room, id).await;
        });

        slots.insert(
            room,
            TaskSlot {
                id,
                fire_at,
                cancel,
                handle,
            },
        );
        Ok(())
    }

    /// Cancel the task registered for `room`, if any.
    ///
    /// Safe to call when the task has already fired or been cancelled.
    /// Returns `true` if a live slot was removed.
    pub async fn cancel(&self, room: RoomNumber) -> bool {
        match self.inner.slots.lock().await.remove(&room) {
            Some(slot) => {
                slot.cancel.cancel();
                tracing::debug!(room, fire_at = %slot.fire_at, "Cancelled scheduled unlock");
                true
            }
            None => false,
        }
    }

    /// Fire time of the live task for `room`.
    pub async fn fire_at(&self, room: RoomNumber) -> Option<Timestamp> {
        self.inner.slots.lock().await.get(&room).map(|s| s.fire_at)
    }

    /// Every live task, ordered by room number.
    pub async fn pending(&self) -> Vec<PendingUnlock> {
        let mut pending: Vec<_> = self
            .inner
            .slots
            .lock()
            .await
            .iter()
            .map(|(room, slot)| PendingUnlock {
                room_number: *room,
                fire_at: slot.fire_at,
            })
            .collect();
        pending.sort_by_key(|p| p.room_number);
        pending
    }

    pub async fn len(&self) -> usize {
        self.inner.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.master.is_cancelled()
    }

    /// Refuse new tasks, cancel every live one and wait for them to settle.
    ///
    /// Tasks still running after `timeout` are aborted and reported.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        let drained: Vec<(RoomNumber, TaskSlot)> = {
            let mut slots = self.inner.slots.lock().await;
            self.inner.master.cancel();
            slots.drain().collect()
        };

        tracing::info!(count = drained.len(), "Draining scheduled unlocks");

        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = ShutdownReport::default();
        for (room, mut slot) in drained {
            slot.cancel.cancel();
            match tokio::time::timeout_at(deadline, &mut slot.handle).await {
                Ok(_) => report.cancelled += 1,
                Err(_) => {
                    slot.handle.abort();
                    report.unsettled.push(room);
                }
            }
        }

        if report.unsettled.is_empty() {
            tracing::info!(cancelled = report.cancelled, "Scheduled unlocks drained");
        } else {
            report.unsettled.sort_unstable();
            tracing::error!(
                cancelled = report.cancelled,
                unsettled = ?report.unsettled,
                "Scheduled unlocks did not settle before the deadline and were aborted",
            );
        }
        report
    }

    /// Clear `room`'s slot if it still belongs to task `id`.
    async fn release(&self, room: RoomNumber, id: u64) {
        let mut slots = self.inner.slots.lock().await;
        if slots.get(&room).is_some_and(|slot| slot.id == id) {
            slots.remove(&room);
        }
    }
}
