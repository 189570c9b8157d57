//! Runs actions as `ansible-playbook <dir>/<playbook> -e "<k=v ...>"`.
//!
//! No timeout is applied: the call takes as long as the playbook does.
//! The process is started without a shell, so parameter values are passed
//! as a single argument and never interpreted.

use std::io::ErrorKind;
use std::time::Instant;

use async_trait::async_trait;
use audnet_core::actions::{ActionKind, ActionParams};
use tokio::process::Command;

use crate::{ActionError, ActionExecutor, PlaybookConfig};

/// Production executor backed by an external playbook runner.
#[derive(Debug, Clone)]
pub struct PlaybookExecutor {
    config: PlaybookConfig,
}

impl PlaybookExecutor {
    pub fn new(config: PlaybookConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ActionExecutor for PlaybookExecutor {
    async fn apply(
        &self,
        action: ActionKind,
        params: &ActionParams,
    ) -> Result<String, ActionError> {
        let playbook = self.config.playbook_dir.join(action.playbook());

        if tokio::fs::metadata(&playbook).await.is_err() {
            tracing::error!(%action, playbook = %playbook.display(), "Playbook missing");
            return Err(ActionError::NotFound {
                action,
                what: format!("playbook {}", playbook.display()),
            });
        }

        let extra_vars = params.to_extra_vars();
        tracing::info!(
            %action,
            playbook = %playbook.display(),
            extra_vars = %extra_vars,
            "Running playbook",
        );

        let start = Instant::now();
        let result = Command::new(&self.config.binary)
            .arg(&playbook)
            .arg("-e")
            .arg(&extra_vars)
            .output()
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::error!(%action, binary = %self.config.binary, "Playbook runner not found");
                return Err(ActionError::NotFound {
                    action,
                    what: format!("executable {}", self.config.binary),
                });
            }
            Err(e) => {
                tracing::error!(%action, error = %e, "Failed to launch playbook runner");
                return Err(ActionError::Failed {
                    action,
                    message: format!("Failed to execute {}: {e}", self.config.binary),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            tracing::info!(%action, elapsed_ms, "Playbook succeeded");
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        let exit_code = output.status.code().unwrap_or(-1);
        tracing::error!(%action, elapsed_ms, exit_code, detail = %detail, "Playbook failed");

        Err(ActionError::Failed {
            action,
            message: format!("exit {exit_code}: {detail}"),
        })
    }
}
