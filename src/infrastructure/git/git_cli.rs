use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::command::{CommandOutput, CommandRunner, CommandSpec};
use super::operations::{
    BranchScope, CleanOptions, CloneOptions, FetchOptions, GitOperations, HistoryQuery,
};
use crate::common::error::DroverError;
use crate::common::result::{DroverResult, ResultExt};

/// `git` コマンドラインを使ったGitOperationsの実装
#[derive(Debug, Clone)]
pub struct GitCli {
    git_executable: String,
    runner: CommandRunner,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl GitCli {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            git_executable: "git".to_string(),
            runner: CommandRunner::new(cancel),
        }
    }

    fn spec(&self, working_dir: Option<&Path>, args: &[&str]) -> CommandSpec {
        let spec = CommandSpec::new(&self.git_executable)
            .args(args.iter().copied())
            .env("GIT_TERMINAL_PROMPT", "0");
        match working_dir {
            Some(dir) => spec.current_dir(dir),
            None => spec,
        }
    }

    /// Run git and return the raw output whatever the exit status.
    async fn git_output(&self, working_dir: Option<&Path>, args: &[&str]) -> DroverResult<CommandOutput> {
        let spec = self.spec(working_dir, args);
        debug!(cwd = ?working_dir, "{}", spec.display());
        self.runner.run(&spec).await.map_err(|e| match e {
            DroverError::CommandError { message, command, exit_code, .. } => {
                DroverError::git_command_failed(command, exit_code, message)
            }
            other => other,
        })
    }

    /// Run git, failing on non-zero exit, and return trimmed stdout.
    async fn git(&self, working_dir: Option<&Path>, args: &[&str]) -> DroverResult<String> {
        let output = self.git_output(working_dir, args).await?;
        if !output.success {
            return Err(DroverError::git_command_failed(
                self.spec(working_dir, args).display(),
                output.exit_code,
                output.stderr,
            ));
        }
        Ok(output.stdout_trimmed().to_string())
    }

    /// `git ls-remote --exit-code` answers 2 when nothing matched.
    async fn ls_remote(&self, working_dir: Option<&Path>, args: &[&str]) -> DroverResult<bool> {
        let output = self.git_output(working_dir, args).await?;
        match output.exit_code {
            Some(0) => Ok(!output.stdout_trimmed().is_empty()),
            Some(2) => Ok(false),
            code => Err(DroverError::git_command_failed(
                self.spec(working_dir, args).display(),
                code,
                output.stderr,
            )),
        }
    }

    async fn git_path_exists(&self, path: &Path, name: &str) -> DroverResult<bool> {
        let git_path = self.git(Some(path), &["rev-parse", "--git-path", name]).await?;
        let git_path = PathBuf::from(git_path);
        let resolved = if git_path.is_absolute() {
            git_path
        } else {
            path.join(git_path)
        };
        Ok(resolved.exists())
    }
}

#[async_trait]
impl GitOperations for GitCli {
    async fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    async fn clone_repo(&self, url: &str, path: &Path, options: &CloneOptions) -> DroverResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_filesystem_error("Failed to create clone parent directory", Some(parent.to_path_buf()))?;
        }

        let depth = options.depth.to_string();
        let dest = path.to_string_lossy().to_string();
        let mut args = vec!["clone", "--origin", options.remote.as_str()];
        if let Some(branch) = &options.branch {
            args.extend(["--branch", branch.as_str()]);
        }
        if options.depth > 0 {
            args.extend(["--depth", depth.as_str(), "--no-single-branch"]);
        }
        args.extend([url, dest.as_str()]);

        self.git(None, &args).await.map(|_| ())
    }

    async fn remote_url(&self, path: &Path, remote: &str) -> DroverResult<Option<String>> {
        let output = self.git_output(Some(path), &["remote", "get-url", remote]).await?;
        Ok(output
            .success
            .then(|| output.stdout_trimmed().to_string())
            .filter(|url| !url.is_empty()))
    }

    async fn add_remote(&self, path: &Path, remote: &str, url: &str) -> DroverResult<()> {
        self.git(Some(path), &["remote", "add", remote, url]).await.map(|_| ())
    }

    async fn set_remote_url(&self, path: &Path, remote: &str, url: &str) -> DroverResult<()> {
        self.git(Some(path), &["remote", "set-url", remote, url]).await.map(|_| ())
    }

    async fn fetch(&self, path: &Path, remote: &str, options: &FetchOptions) -> DroverResult<()> {
        let depth = options.depth.to_string();
        let mut args = vec!["fetch"];
        if options.prune {
            args.push("--prune");
        }
        if options.tags {
            args.push("--tags");
        }
        if options.depth > 0 {
            args.extend(["--depth", depth.as_str()]);
        }
        args.push(remote);
        self.git(Some(path), &args).await.map(|_| ())
    }

    async fn ls_remote_ref(&self, url: &str, refname: &str) -> DroverResult<bool> {
        self.ls_remote(None, &["ls-remote", "--exit-code", url, refname]).await
    }

    async fn has_remote_branch(&self, path: &Path, remote: &str, branch: &str) -> DroverResult<bool> {
        let refname = format!("refs/heads/{}", branch);
        self.ls_remote(Some(path), &["ls-remote", "--exit-code", "--heads", remote, refname.as_str()])
            .await
    }

    async fn has_remote_tag(&self, path: &Path, remote: &str, tag: &str) -> DroverResult<bool> {
        let refname = format!("refs/tags/{}", tag);
        self.ls_remote(Some(path), &["ls-remote", "--exit-code", "--tags", remote, refname.as_str()])
            .await
    }

    async fn has_local_branch(&self, path: &Path, branch: &str) -> DroverResult<bool> {
        let refname = format!("refs/heads/{}", branch);
        let output = self
            .git_output(Some(path), &["rev-parse", "--verify", "--quiet", refname.as_str()])
            .await?;
        Ok(output.success)
    }

    async fn has_ref(&self, path: &Path, refname: &str) -> DroverResult<bool> {
        let commit = format!("{}^{{commit}}", refname);
        let output = self
            .git_output(Some(path), &["rev-parse", "--verify", "--quiet", commit.as_str()])
            .await?;
        Ok(output.success)
    }

    async fn tracking_branch(&self, path: &Path, branch: &str) -> DroverResult<Option<String>> {
        let refname = format!("refs/heads/{}", branch);
        let upstream = self
            .git(Some(path), &["for-each-ref", "--format=%(upstream:short)", refname.as_str()])
            .await?;
        Ok((!upstream.is_empty()).then_some(upstream))
    }

    async fn create_branch(&self, path: &Path, branch: &str) -> DroverResult<()> {
        self.git(Some(path), &["branch", branch]).await.map(|_| ())
    }

    async fn create_tracking_branch(&self, path: &Path, branch: &str, remote: &str) -> DroverResult<()> {
        let start = format!("{}/{}", remote, branch);
        self.git(Some(path), &["branch", "--track", branch, start.as_str()])
            .await
            .map(|_| ())
    }

    async fn set_upstream(&self, path: &Path, branch: &str, remote: &str) -> DroverResult<()> {
        let upstream = format!("--set-upstream-to={}/{}", remote, branch);
        self.git(Some(path), &["branch", upstream.as_str(), branch])
            .await
            .map(|_| ())
    }

    async fn checkout(&self, path: &Path, target: &str) -> DroverResult<()> {
        self.git(Some(path), &["checkout", "-q", target]).await.map(|_| ())
    }

    async fn current_branch(&self, path: &Path) -> DroverResult<Option<String>> {
        let output = self
            .git_output(Some(path), &["symbolic-ref", "--short", "-q", "HEAD"])
            .await?;
        Ok(output
            .success
            .then(|| output.stdout_trimmed().to_string())
            .filter(|b| !b.is_empty()))
    }

    async fn pull(&self, path: &Path, remote: &str, branch: &str, rebase: bool) -> DroverResult<()> {
        let mode = if rebase { "--rebase" } else { "--no-rebase" };
        self.git(Some(path), &["pull", mode, remote, branch]).await.map(|_| ())
    }

    async fn push(&self, path: &Path, remote: &str, branch: &str, set_upstream: bool) -> DroverResult<()> {
        let mut args = vec!["push"];
        if set_upstream {
            args.push("-u");
        }
        args.extend([remote, branch]);
        self.git(Some(path), &args).await.map(|_| ())
    }

    async fn delete_local_branch(&self, path: &Path, branch: &str, force: bool) -> DroverResult<()> {
        let flag = if force { "-D" } else { "-d" };
        self.git(Some(path), &["branch", flag, branch]).await.map(|_| ())
    }

    async fn delete_remote_branch(&self, path: &Path, remote: &str, branch: &str) -> DroverResult<()> {
        self.git(Some(path), &["push", remote, "--delete", branch])
            .await
            .map(|_| ())
    }

    async fn reset_hard(&self, path: &Path, target: &str) -> DroverResult<()> {
        self.git(Some(path), &["reset", "--hard", target]).await.map(|_| ())
    }

    async fn clean(&self, path: &Path, options: &CleanOptions) -> DroverResult<()> {
        self.git(Some(path), &options.to_args()).await.map(|_| ())
    }

    async fn is_rebase_in_progress(&self, path: &Path) -> DroverResult<bool> {
        Ok(self.git_path_exists(path, "rebase-merge").await?
            || self.git_path_exists(path, "rebase-apply").await?)
    }

    async fn abort_rebase(&self, path: &Path) -> DroverResult<()> {
        self.git(Some(path), &["rebase", "--abort"]).await.map(|_| ())
    }

    async fn update_submodules(&self, path: &Path, recursive: bool, depth: u32) -> DroverResult<()> {
        let mut sync = vec!["submodule", "sync"];
        if recursive {
            sync.push("--recursive");
        }
        self.git(Some(path), &sync).await?;

        let depth_arg = depth.to_string();
        let mut update = vec!["submodule", "update", "--init"];
        if recursive {
            update.push("--recursive");
        }
        if depth > 0 {
            update.extend(["--depth", depth_arg.as_str()]);
        }
        self.git(Some(path), &update).await.map(|_| ())
    }

    async fn submodule_foreach(&self, path: &Path, command: &str, recursive: bool) -> DroverResult<()> {
        let mut args = vec!["submodule", "foreach"];
        if recursive {
            args.push("--recursive");
        }
        args.push(command);
        self.git(Some(path), &args).await.map(|_| ())
    }

    async fn set_config(&self, path: &Path, key: &str, value: &str) -> DroverResult<()> {
        self.git(Some(path), &["config", "--local", key, value])
            .await
            .map(|_| ())
    }

    async fn lfs_install(&self, path: &Path) -> DroverResult<()> {
        self.git(Some(path), &["lfs", "install", "--local"]).await.map(|_| ())
    }

    async fn lfs_pull(&self, path: &Path) -> DroverResult<()> {
        self.git(Some(path), &["lfs", "pull"]).await.map(|_| ())
    }

    async fn rev_parse(&self, path: &Path, rev: &str) -> DroverResult<String> {
        self.git(Some(path), &["rev-parse", rev]).await
    }

    async fn ahead_behind(&self, path: &Path, branch: &str, upstream: &str) -> DroverResult<(usize, usize)> {
        let range = format!("{}...{}", branch, upstream);
        let counts = self
            .git(Some(path), &["rev-list", "--left-right", "--count", range.as_str()])
            .await?;
        let mut parts = counts.split_whitespace().map(str::parse::<usize>);
        match (parts.next(), parts.next()) {
            (Some(Ok(ahead)), Some(Ok(behind))) => Ok((ahead, behind)),
            _ => Err(DroverError::git_error(format!(
                "unexpected rev-list output '{}'",
                counts
            ))),
        }
    }

    async fn commit_before(&self, path: &Path, query: &HistoryQuery) -> DroverResult<Option<String>> {
        let before = format!("--before={}", query.before);
        let author = query.author.as_ref().map(|a| format!("--author={}", a));
        let mut args = vec!["rev-list", "-n", "1", before.as_str()];
        if let Some(author) = &author {
            args.push(author.as_str());
        }
        args.push(query.reference.as_str());

        let sha = self.git(Some(path), &args).await?;
        Ok((!sha.is_empty()).then_some(sha))
    }

    async fn merge_ff_only(&self, path: &Path, target: &str) -> DroverResult<()> {
        self.git(Some(path), &["merge", "--ff-only", target]).await.map(|_| ())
    }

    async fn rebase(&self, path: &Path, onto: &str) -> DroverResult<()> {
        self.git(Some(path), &["rebase", onto]).await.map(|_| ())
    }

    async fn is_dirty(&self, path: &Path) -> DroverResult<bool> {
        let status = self.git(Some(path), &["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }

    async fn list_branches(&self, path: &Path, scope: BranchScope) -> DroverResult<Vec<String>> {
        let mut args = vec!["branch", "--format=%(refname:short)"];
        match scope {
            BranchScope::Local => {}
            BranchScope::Remote => args.push("-r"),
            BranchScope::All => args.push("-a"),
        }
        let listing = self.git(Some(path), &args).await?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|b| !b.is_empty() && !b.ends_with("/HEAD") && !b.starts_with('('))
            .map(str::to_string)
            .collect())
    }

    async fn stash(&self, path: &Path) -> DroverResult<()> {
        self.git(Some(path), &["stash", "push"]).await.map(|_| ())
    }
}
