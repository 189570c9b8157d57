use audnet_core::error::CoreError;
use audnet_executor::ActionError;

/// Errors returned by the synchronous access operations.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Invalid input (room number, duration, action value).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The external action was missing or reported failure. The store was
    /// not modified.
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The scheduler has been drained and accepts no new work.
    #[error("Access service is shutting down")]
    ShuttingDown,
}
