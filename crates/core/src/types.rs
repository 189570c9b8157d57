/// Primary keys are SQLite `INTEGER PRIMARY KEY` rowids.
pub type DbId = i64;

/// Auditorium (room) identity as printed on the door.
pub type RoomNumber = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
