//! Cancellable subprocess execution.
//!
//! Every command is spawned in its own process group and raced against a
//! [`CancellationToken`]. When the token fires the whole group is terminated
//! (SIGTERM, then SIGKILL after a short grace period) before the call returns
//! [`DroverError::Interrupted`], so hooks, credential helpers and other
//! grandchildren git starts go down with it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::common::error::DroverError;
use crate::common::result::DroverResult;

/// SIGKILL escalation delay after SIGTERM
const SIGKILL_TIMEOUT_MS: u64 = 200;

/// 実行するコマンドの定義
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
    /// Capture stdout/stderr instead of inheriting the terminal.
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            envs: Vec::new(),
            capture: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.envs.extend(vars);
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.capture = false;
        self
    }

    /// `git fetch origin` style rendering for logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// コマンドの実行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Runs commands under a shared cancellation token.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    cancel: CancellationToken,
}

impl CommandRunner {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run to completion. A non-zero exit is reported in the output, not as an error.
    pub async fn run(&self, spec: &CommandSpec) -> DroverResult<CommandOutput> {
        if self.cancel.is_cancelled() {
            return Err(DroverError::Interrupted);
        }

        let mut command = build_command(spec);
        debug!(command = %spec.display(), cwd = ?spec.working_dir, "spawning");

        let child = command.spawn().map_err(|e| {
            DroverError::command_error_with_source(
                format!("failed to spawn '{}'", spec.program),
                spec.display(),
                e,
            )
        })?;
        let pid = child.id();

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output.map_err(|e| {
                    DroverError::command_error_with_source("failed to wait for command", spec.display(), e)
                })?;
                Ok(CommandOutput {
                    exit_code: output.status.code(),
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            _ = self.cancel.cancelled() => {
                debug!(command = %spec.display(), ?pid, "cancelled, terminating process group");
                if let Some(pid) = pid {
                    kill_process_group(pid).await;
                }
                Err(DroverError::Interrupted)
            }
        }
    }

    /// Run and turn a non-zero exit into a `CommandError`.
    pub async fn run_checked(&self, spec: &CommandSpec) -> DroverResult<CommandOutput> {
        let output = self.run(spec).await?;
        if output.success {
            Ok(output)
        } else {
            Err(DroverError::command_error(
                output.stderr.trim().to_string(),
                spec.display(),
                output.exit_code,
            ))
        }
    }
}

fn build_command(spec: &CommandSpec) -> tokio::process::Command {
    let mut std_command = std::process::Command::new(&spec.program);
    std_command.args(&spec.args).stdin(Stdio::null());

    if spec.capture {
        std_command.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        std_command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }
    if let Some(dir) = &spec.working_dir {
        std_command.current_dir(dir);
    }
    for (key, value) in &spec.envs {
        std_command.env(key, value);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_command.process_group(0);
    }

    let mut command = tokio::process::Command::from(std_command);
    command.kill_on_drop(true);
    command
}

/// Terminate a process group led by `pid`: SIGTERM, short grace, SIGKILL.
#[cfg(unix)]
pub async fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(pid as i32);

    match killpg(pgid, Signal::SIGTERM) {
        Ok(()) => debug!(pid, "sent SIGTERM to process group"),
        Err(Errno::ESRCH) => return,
        Err(e) => warn!(pid, error = %e, "failed to send SIGTERM to process group"),
    }

    tokio::time::sleep(Duration::from_millis(SIGKILL_TIMEOUT_MS)).await;

    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => debug!(pid, "sent SIGKILL to process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "failed to send SIGKILL to process group"),
    }
}

/// Non-unix platforms rely on `kill_on_drop` for the direct child.
#[cfg(not(unix))]
pub async fn kill_process_group(_pid: u32) {
    tokio::time::sleep(Duration::from_millis(SIGKILL_TIMEOUT_MS)).await;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_run_captures_output() {
        let runner = CommandRunner::default();
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);

        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.stdout_trimmed(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success);

        let err = runner.run_checked(&spec).await.unwrap_err();
        assert!(matches!(err, DroverError::CommandError { exit_code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_env_and_working_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let runner = CommandRunner::default();
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo $PROJECT_NAME; pwd"])
            .env("PROJECT_NAME", "kit")
            .current_dir(temp_dir.path());

        let output = runner.run_checked(&spec).await.unwrap();
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("kit"));
        let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(pwd, std::fs::canonicalize(temp_dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_token_refuses_to_spawn() {
        let token = CancellationToken::new();
        token.cancel();
        let runner = CommandRunner::new(token);
        let err = runner.run(&CommandSpec::new("true")).await.unwrap_err();
        assert!(matches!(err, DroverError::Interrupted));
    }

    #[tokio::test]
    async fn test_cancellation_kills_grandchildren() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let marker = temp_dir.path().join("survived");
        let token = CancellationToken::new();
        let runner = CommandRunner::new(token.clone());

        // The inner sh is a grandchild of the runner; it must die with the group.
        let script = format!("sh -c 'sleep 2; touch {}' & wait", marker.display());
        let spec = CommandSpec::new("sh").args(["-c", script.as_str()]);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            token.cancel();
        });

        let started = Instant::now();
        let err = runner.run(&spec).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, DroverError::Interrupted));
        assert!(started.elapsed() < Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_command_error() {
        let runner = CommandRunner::default();
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-binary-drover"))
            .await
            .unwrap_err();
        assert!(matches!(err, DroverError::CommandError { .. }));
    }
}
