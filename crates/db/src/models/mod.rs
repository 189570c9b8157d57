//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row plus any DTOs used to insert it.

pub mod room_access;
pub mod user;
