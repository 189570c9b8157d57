use audnet_core::actions::ActionKind;

/// Failure of a single external action invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ActionError {
    /// The playbook or the executable that runs it does not exist.
    #[error("Action {action} not found: {what}")]
    NotFound { action: ActionKind, what: String },

    /// The action ran (or could not be started) and reported failure.
    #[error("Action {action} failed: {message}")]
    Failed { action: ActionKind, message: String },
}

impl ActionError {
    pub fn action(&self) -> ActionKind {
        match self {
            Self::NotFound { action, .. } | Self::Failed { action, .. } => *action,
        }
    }
}
