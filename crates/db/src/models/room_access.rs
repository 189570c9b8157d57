//! Per-auditorium access record.

use audnet_core::access::AccessState;
use audnet_core::types::{RoomNumber, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Row from the `auditorium_states` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct RoomAccessRecord {
    pub room_number: RoomNumber,
    pub is_network_on: bool,
    /// Set only while an automatic unlock is pending.
    pub unlock_time: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl RoomAccessRecord {
    pub fn state(&self) -> AccessState {
        AccessState::classify(self.is_network_on, self.unlock_time)
    }
}
