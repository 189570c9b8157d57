//! Domain types and pure logic shared by every crate in the workspace.
//!
//! This crate has no internal dependencies and performs no I/O so that the
//! access rules can be unit tested in isolation.

pub mod access;
pub mod actions;
pub mod error;
pub mod types;
