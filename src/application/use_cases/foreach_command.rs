//! forall: run a shell command inside every selected project.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::application::operation::{OutcomeData, OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::command::{CommandRunner, CommandSpec};
use crate::infrastructure::git::GitOperations;

/// Foreach実行の設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeachOptions {
    /// 実行するコマンド（`sh -c` に渡す）
    pub command: String,
    /// 失敗しても結果として記録し、エラーにしない
    pub ignore_errors: bool,
}

#[derive(Debug, Clone)]
pub struct ForeachCommand {
    options: ForeachOptions,
    workspace_root: PathBuf,
    runner: CommandRunner,
}

impl ForeachCommand {
    pub fn new(
        options: ForeachOptions,
        workspace_root: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> DroverResult<Self> {
        if options.command.trim().is_empty() {
            return Err(DroverError::validation_error("command", "command is empty", None));
        }
        Ok(Self {
            options,
            workspace_root: workspace_root.into(),
            runner: CommandRunner::new(cancel),
        })
    }

    fn spec(&self, project: &ResolvedProject) -> CommandSpec {
        CommandSpec::new("sh")
            .args(["-c", self.options.command.as_str()])
            .current_dir(&project.path)
            .envs(project.env_vars(&self.workspace_root))
    }
}

#[async_trait]
impl ProjectOperation for ForeachCommand {
    fn name(&self) -> &'static str {
        "forall"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        if !git.is_repository(&project.path).await {
            return Ok(ProjectOutcome::skipped(&project.name, "not cloned"));
        }

        tracing::debug!(project = %project.name, "running '{}'", self.options.command);
        let output = self.runner.run(&self.spec(project)).await?;

        if !output.success && !self.options.ignore_errors {
            return Err(DroverError::command_error(
                output.stderr.trim().to_string(),
                self.options.command.clone(),
                output.exit_code,
            ));
        }

        let mut outcome = ProjectOutcome::new(&project.name, OutcomeKind::Done);
        if !output.success {
            outcome = outcome.with_message(match output.exit_code {
                Some(code) => format!("command exited with {}", code),
                None => "command was terminated by a signal".to_string(),
            });
        }
        Ok(outcome.with_data(OutcomeData::Output {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
        }))
    }
}
