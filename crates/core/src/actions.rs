//! Names and parameters of the external network actions.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::RoomNumber;

/// Parameter key always present on every action.
pub const PARAM_ROOM_NUMBER: &str = "room_number";
pub const PARAM_CLASS_NUMBER: &str = "class_number";
pub const PARAM_STATE: &str = "state";

/// `room_number` value used by the status query, which covers every room.
pub const ALL_ROOMS: &str = "all";

/// Marker the status playbook prints in front of the blocked room list.
pub const BLOCKED_ROOMS_MARKER: &str = "blocked_rooms:";

/// The fixed set of external actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Deny network access for a room.
    ApplyBlock,
    /// Restore network access for a room.
    RemoveBlock,
    /// Report which rooms are currently blocked.
    QueryStatus,
    /// Apply an arbitrary firewall class/state to a room.
    Configure,
}

impl ActionKind {
    /// Playbook file implementing this action.
    pub fn playbook(self) -> &'static str {
        match self {
            Self::ApplyBlock => "network_off.yaml",
            Self::RemoveBlock => "network_on.yaml",
            Self::QueryStatus => "network_status.yaml",
            Self::Configure => "firewall.yml",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApplyBlock => "apply-block",
            Self::RemoveBlock => "remove-block",
            Self::QueryStatus => "query-status",
            Self::Configure => "generic-configure",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered key/value parameters passed to an action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionParams(BTreeMap<String, String>);

impl ActionParams {
    /// Parameters targeting a single room.
    pub fn for_room(room: RoomNumber) -> Self {
        Self::default().with(PARAM_ROOM_NUMBER, room.to_string())
    }

    /// Parameters for the status query across all rooms.
    pub fn all_rooms() -> Self {
        Self::default().with(PARAM_ROOM_NUMBER, ALL_ROOMS)
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// `key=value` pairs in key order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as the playbooks' space-separated `var=value` string.
    ///
    /// The room comes first as `auditorium_number`; the remaining keys follow
    /// in key order under their playbook variable names.
    pub fn to_extra_vars(&self) -> String {
        let room = self.0.get_key_value(PARAM_ROOM_NUMBER);
        let rest = self.pairs().filter(|(k, _)| *k != PARAM_ROOM_NUMBER);
        room.map(|(k, v)| (k.as_str(), v.as_str()))
            .into_iter()
            .chain(rest)
            .map(|(k, v)| format!("{}={v}", playbook_var(k)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Variable name the playbooks read for a parameter key.
fn playbook_var(key: &str) -> &str {
    match key {
        PARAM_ROOM_NUMBER => "auditorium_number",
        PARAM_CLASS_NUMBER => "class",
        other => other,
    }
}

/// Extract the blocked room numbers from a status query's output.
///
/// Looks for every line containing [`BLOCKED_ROOMS_MARKER`] and reads the
/// comma/space separated integers after it. The first other character
/// (a closing quote, JSON punctuation) ends the list on that line. A missing
/// marker means nothing is blocked.
pub fn parse_blocked_rooms(output: &str) -> Vec<RoomNumber> {
    let mut rooms = Vec::new();
    for line in output.lines() {
        let Some(idx) = line.find(BLOCKED_ROOMS_MARKER) else {
            continue;
        };
        let rest = &line[idx + BLOCKED_ROOMS_MARKER.len()..];
        let list = rest
            .split(|c: char| !(c.is_ascii_digit() || c == ',' || c.is_whitespace()))
            .next()
            .unwrap_or_default();
        let parsed = list
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter_map(|token| token.parse::<RoomNumber>().ok())
            .filter(|room| *room > 0);
        for room in parsed {
            if !rooms.contains(&room) {
                rooms.push(room);
            }
        }
    }
    rooms
}
