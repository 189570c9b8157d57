//! Per-room mutual exclusion.
//!
//! Every state-changing operation on a room (lock, unlock, a fired automatic
//! unlock, a sweep restore) holds that room's guard from the external action
//! through the store write, so operations on one room are linearized while
//! different rooms proceed independently.
//!
//! A room's entry lives only while someone holds or waits for its guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use audnet_core::types::RoomNumber;
use tokio::sync::OwnedMutexGuard;

struct Slot {
    mutex: Arc<tokio::sync::Mutex<()>>,
    /// Holders plus waiters.
    users: usize,
}

/// Lazily-created async mutex per room. Cheap to clone.
#[derive(Clone, Default)]
pub struct RoomGuards {
    rooms: Arc<Mutex<HashMap<RoomNumber, Slot>>>,
}

/// Exclusive access to one room. Released on drop.
pub struct RoomGuard {
    // Field order matters: the lock is released before the slot is returned.
    _lock: OwnedMutexGuard<()>,
    _user: SlotUser,
}

/// Counts one holder or waiter; removes the slot when the last one leaves.
struct SlotUser {
    guards: RoomGuards,
    room: RoomNumber,
}

impl Drop for SlotUser {
    fn drop(&mut self) {
        let mut rooms = self.guards.rooms();
        if let Some(slot) = rooms.get_mut(&self.room) {
            slot.users -= 1;
            if slot.users == 0 {
                rooms.remove(&self.room);
            }
        }
    }
}

impl RoomGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `room`.
    ///
    /// Dropping the returned future before it resolves gives up the place
    /// in line without leaking the room's entry.
    pub async fn acquire(&self, room: RoomNumber) -> RoomGuard {
        let (mutex, user) = {
            let mut rooms = self.rooms();
            let slot = rooms.entry(room).or_insert_with(|| Slot {
                mutex: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            let user = SlotUser {
                guards: self.clone(),
                room,
            };
            (Arc::clone(&slot.mutex), user)
        };

        RoomGuard {
            _lock: mutex.lock_owned().await,
            _user: user,
        }
    }

    /// Number of rooms currently held or waited on.
    pub fn tracked(&self) -> usize {
        self.rooms().len()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomNumber, Slot>> {
        self.rooms.lock().unwrap_or_else(|p| p.into_inner())
    }
}
