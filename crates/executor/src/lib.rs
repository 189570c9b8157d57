//! Adapter around the external network actions.
//!
//! [`ActionExecutor`] is the seam the access service talks to. Two
//! production implementations exist, selected by [`ExecutorMode`]:
//! [`SimulatedExecutor`] describes what would have run, and
//! [`PlaybookExecutor`] runs `ansible-playbook`. With the `testing` feature,
//! `testing::ScriptedExecutor` records calls and injects failures for tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use audnet_core::actions::{ActionKind, ActionParams};

pub mod error;
pub mod playbook;
pub mod simulated;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::ActionError;
pub use playbook::PlaybookExecutor;
pub use simulated::SimulatedExecutor;

/// Runs one external action. One call is exactly one attempt; no retries.
///
/// Returns the action's textual output on success.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn apply(&self, action: ActionKind, params: &ActionParams) -> Result<String, ActionError>;
}

/// Process-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorMode {
    /// Describe the action without running anything.
    Simulate,
    /// Run the playbooks for real.
    Real,
}

impl ExecutorMode {
    /// Map the `MODE` setting: only `production` runs real actions.
    pub fn from_mode_str(mode: &str) -> Self {
        if mode.trim().eq_ignore_ascii_case("production") {
            Self::Real
        } else {
            Self::Simulate
        }
    }
}

/// Where and how playbooks are run in [`ExecutorMode::Real`].
#[derive(Debug, Clone)]
pub struct PlaybookConfig {
    /// Executable invoked for every action (default: `ansible-playbook`).
    pub binary: String,
    /// Directory containing the playbook files.
    pub playbook_dir: PathBuf,
}

/// Build the executor for the configured mode.
pub fn build_executor(mode: ExecutorMode, config: PlaybookConfig) -> Arc<dyn ActionExecutor> {
    match mode {
        ExecutorMode::Simulate => Arc::new(SimulatedExecutor),
        ExecutorMode::Real => Arc::new(PlaybookExecutor::new(config)),
    }
}
