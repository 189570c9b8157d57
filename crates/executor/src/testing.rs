//! In-memory executor for tests.
//!
//! Records every invocation, can be told to fail specific actions, and
//! answers status queries from a configurable blocked-room list.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use audnet_core::actions::{ActionKind, ActionParams, BLOCKED_ROOMS_MARKER, PARAM_ROOM_NUMBER};
use audnet_core::types::RoomNumber;

use crate::{ActionError, ActionExecutor};

#[derive(Debug, Clone, Copy)]
enum Failure {
    NotFound,
    Failed,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<(ActionKind, ActionParams)>,
    failures: HashMap<ActionKind, Failure>,
    blocked_rooms: Vec<RoomNumber>,
    latency: Option<Duration>,
}

/// Scriptable [`ActionExecutor`] that never touches the outside world.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    script: Mutex<Script>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call of `action` fail with [`ActionError::Failed`].
    pub fn fail(&self, action: ActionKind) {
        self.lock().failures.insert(action, Failure::Failed);
    }

    /// Make every future call of `action` fail with [`ActionError::NotFound`].
    pub fn fail_not_found(&self, action: ActionKind) {
        self.lock().failures.insert(action, Failure::NotFound);
    }

    /// Let `action` succeed again.
    pub fn succeed(&self, action: ActionKind) {
        self.lock().failures.remove(&action);
    }

    /// Rooms reported by the next status queries.
    pub fn set_blocked_rooms(&self, rooms: Vec<RoomNumber>) {
        self.lock().blocked_rooms = rooms;
    }

    /// Delay every call by `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<(ActionKind, ActionParams)> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of `action` targeting `room`.
    pub fn count(&self, action: ActionKind, room: RoomNumber) -> usize {
        let room = room.to_string();
        self.lock()
            .calls
            .iter()
            .filter(|(kind, params)| {
                *kind == action && params.get(PARAM_ROOM_NUMBER) == Some(room.as_str())
            })
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn apply(
        &self,
        action: ActionKind,
        params: &ActionParams,
    ) -> Result<String, ActionError> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut script = self.lock();
        script.calls.push((action, params.clone()));

        match script.failures.get(&action) {
            Some(Failure::NotFound) => Err(ActionError::NotFound {
                action,
                what: format!("playbook {}", action.playbook()),
            }),
            Some(Failure::Failed) => Err(ActionError::Failed {
                action,
                message: "exit 2: scripted failure".to_string(),
            }),
            None if action == ActionKind::QueryStatus => {
                let rooms = script
                    .blocked_rooms
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(format!("{BLOCKED_ROOMS_MARKER} {rooms}"))
            }
            None => Ok(format!("ok: {} {}", action, params.to_extra_vars())),
        }
    }
}
