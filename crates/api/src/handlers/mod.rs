//! Request handlers.
//!
//! Each submodule provides the async handler functions for one resource.
//! Handlers delegate to `audnet_db` repositories or to the
//! [`AccessService`](audnet_access::AccessService) and map errors via
//! [`AppError`](crate::error::AppError).

pub mod auditorium;
pub mod auth;
pub mod users;
