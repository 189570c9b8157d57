//! Auditorium access state machine and deferred-unlock scheduler.
//!
//! - [`service::AccessService`] -- lock, unlock, configure, status and the
//!   reconciliation sweep; the only entry point used by the HTTP layer.
//! - [`scheduler::UnlockScheduler`] -- arms one delayed re-enable per room.
//! - [`registry::TaskRegistry`] -- owns every scheduled task and drains them
//!   on shutdown.
//! - [`guards::RoomGuards`] -- per-room mutual exclusion.

pub mod error;
pub mod guards;
pub mod reconcile;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use error::AccessError;
pub use reconcile::RestoreReport;
pub use registry::{PendingUnlock, ShutdownReport, TaskRegistry};
pub use service::{AccessService, StartupReport};
