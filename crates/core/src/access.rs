//! Auditorium access rules: state classification, roster parsing, lock
//! duration validation and unlock-delay arithmetic.
//!
//! Lives in `core` (zero internal deps) so the same rules are used by the
//! store, the scheduler and the HTTP layer.

use std::time::Duration;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{RoomNumber, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Rooms seeded at startup when `AUDITORIUM_ROSTER` is not set.
pub const DEFAULT_ROSTER: &[RoomNumber] = &[11, 14, 15, 17, 19, 20, 23, 24, 103, 113, 262];

/// Lock duration used when the caller does not supply one.
pub const DEFAULT_LOCK_MINUTES: i64 = 60;

/// Longest lock a caller may request (one week).
pub const MAX_LOCK_MINUTES: i64 = 7 * 24 * 60;

/// Longest accepted value for the `state` parameter of a configure action.
const MAX_ACTION_VALUE_LEN: usize = 64;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Access state of a single room, derived from its persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    /// Network access is granted.
    Unlocked,
    /// Access is blocked and nothing will restore it automatically.
    LockedNoSchedule,
    /// Access is blocked until the recorded unlock time.
    LockedPendingAutoUnlock,
}

impl AccessState {
    /// Classify a record by its `is_network_on` flag and `unlock_time`.
    pub fn classify(is_network_on: bool, unlock_time: Option<Timestamp>) -> Self {
        match (is_network_on, unlock_time) {
            (true, _) => Self::Unlocked,
            (false, Some(_)) => Self::LockedPendingAutoUnlock,
            (false, None) => Self::LockedNoSchedule,
        }
    }

    pub fn is_locked(self) -> bool {
        !matches!(self, Self::Unlocked)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reject room numbers that cannot name a physical auditorium.
pub fn validate_room_number(room: RoomNumber) -> Result<(), CoreError> {
    if room <= 0 {
        return Err(CoreError::Validation(format!(
            "Room number must be positive, got {room}"
        )));
    }
    Ok(())
}

/// Validate a requested lock duration and convert it to a [`chrono::Duration`].
pub fn lock_duration(minutes: i64) -> Result<chrono::Duration, CoreError> {
    if !(1..=MAX_LOCK_MINUTES).contains(&minutes) {
        return Err(CoreError::Validation(format!(
            "Lock duration must be between 1 and {MAX_LOCK_MINUTES} minutes, got {minutes}"
        )));
    }
    Ok(chrono::Duration::minutes(minutes))
}

/// Values passed through to the external action as `key=value` pairs.
///
/// Only alphanumerics, hyphen, underscore and dot are accepted so a value
/// can never smuggle extra arguments into the playbook invocation.
pub fn validate_action_value(field: &str, value: &str) -> Result<(), CoreError> {
    let ok = !value.is_empty()
        && value.len() <= MAX_ACTION_VALUE_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !ok {
        return Err(CoreError::Validation(format!(
            "{field} must be 1-{MAX_ACTION_VALUE_LEN} characters of [A-Za-z0-9_.-]"
        )));
    }
    Ok(())
}

/// Parse a comma-separated roster such as `"11, 14,103"`.
///
/// Duplicates are removed while keeping first-seen order.
pub fn parse_roster(raw: &str) -> Result<Vec<RoomNumber>, CoreError> {
    let mut rooms = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let room: RoomNumber = part.parse().map_err(|_| {
            CoreError::Validation(format!("Invalid room number in roster: '{part}'"))
        })?;
        validate_room_number(room)?;
        if !rooms.contains(&room) {
            rooms.push(room);
        }
    }
    if rooms.is_empty() {
        return Err(CoreError::Validation("Roster must name at least one room".into()));
    }
    Ok(rooms)
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Time remaining until `unlock_time`, clamped to zero when already due.
pub fn delay_until(unlock_time: Timestamp, now: Timestamp) -> Duration {
    (unlock_time - now).to_std().unwrap_or(Duration::ZERO)
}
