//! Executor used outside production: runs nothing.

use async_trait::async_trait;
use audnet_core::actions::{ActionKind, ActionParams, BLOCKED_ROOMS_MARKER};

use crate::{ActionError, ActionExecutor};

/// Returns a deterministic description of the action instead of running it.
///
/// The status query reports no blocked rooms.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedExecutor;

#[async_trait]
impl ActionExecutor for SimulatedExecutor {
    async fn apply(
        &self,
        action: ActionKind,
        params: &ActionParams,
    ) -> Result<String, ActionError> {
        tracing::debug!(%action, params = %params.to_extra_vars(), "Simulating action");
        let mut output = format!(
            "Simulated running playbook {} with {}",
            action.playbook(),
            params.to_extra_vars()
        );
        if action == ActionKind::QueryStatus {
            output.push('\n');
            output.push_str(BLOCKED_ROOMS_MARKER);
        }
        Ok(output)
    }
}
