use async_trait::async_trait;
use std::path::Path;

use crate::common::result::DroverResult;

/// clone時のオプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// `--branch`; omitted to take the host's default branch
    pub branch: Option<String>,
    /// Remote name given to `--origin`
    pub remote: String,
    /// 0 means a full clone.
    pub depth: u32,
}

/// fetch時のオプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub depth: u32,
    pub tags: bool,
    pub prune: bool,
}

/// `git clean` flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// `-d`
    pub directories: bool,
    /// `-x`
    pub ignored: bool,
    /// `-X`
    pub only_ignored: bool,
    /// second `-f`, removes nested repositories
    pub force_nested: bool,
}

impl CleanOptions {
    pub fn to_args(&self) -> Vec<&'static str> {
        let mut args = vec!["clean", "-f"];
        if self.force_nested {
            args.push("-f");
        }
        if self.directories {
            args.push("-d");
        }
        if self.only_ignored {
            args.push("-X");
        } else if self.ignored {
            args.push("-x");
        }
        args
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchScope {
    #[default]
    Local,
    Remote,
    All,
}

/// Query for the newest commit on a ref before a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub reference: String,
    /// Anything `git rev-list --before` accepts.
    pub before: String,
    pub author: Option<String>,
}

/// Gitプリミティブ操作のインターフェース
///
/// The reconciliation engine composes these; nothing here decides policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitOperations: Send + Sync {
    async fn is_repository(&self, path: &Path) -> bool;

    async fn clone_repo(&self, url: &str, path: &Path, options: &CloneOptions) -> DroverResult<()>;

    async fn remote_url(&self, path: &Path, remote: &str) -> DroverResult<Option<String>>;

    async fn add_remote(&self, path: &Path, remote: &str, url: &str) -> DroverResult<()>;

    async fn set_remote_url(&self, path: &Path, remote: &str, url: &str) -> DroverResult<()>;

    async fn fetch(&self, path: &Path, remote: &str, options: &FetchOptions) -> DroverResult<()>;

    /// Check a fully qualified ref against a URL without a working tree.
    async fn ls_remote_ref(&self, url: &str, refname: &str) -> DroverResult<bool>;

    async fn has_remote_branch(&self, path: &Path, remote: &str, branch: &str) -> DroverResult<bool>;

    async fn has_remote_tag(&self, path: &Path, remote: &str, tag: &str) -> DroverResult<bool>;

    async fn has_local_branch(&self, path: &Path, branch: &str) -> DroverResult<bool>;

    /// Whether `refname` resolves to a commit in the working copy.
    async fn has_ref(&self, path: &Path, refname: &str) -> DroverResult<bool>;

    /// `remote/branch` the local branch tracks, if any. The name is read from
    /// config and may point at a ref that no longer exists.
    async fn tracking_branch(&self, path: &Path, branch: &str) -> DroverResult<Option<String>>;

    /// Create `branch` at HEAD.
    async fn create_branch(&self, path: &Path, branch: &str) -> DroverResult<()>;

    /// Create `branch` from `remote/branch`, tracking it.
    async fn create_tracking_branch(&self, path: &Path, branch: &str, remote: &str) -> DroverResult<()>;

    async fn set_upstream(&self, path: &Path, branch: &str, remote: &str) -> DroverResult<()>;

    async fn checkout(&self, path: &Path, target: &str) -> DroverResult<()>;

    /// `None` when HEAD is detached.
    async fn current_branch(&self, path: &Path) -> DroverResult<Option<String>>;

    async fn pull(&self, path: &Path, remote: &str, branch: &str, rebase: bool) -> DroverResult<()>;

    async fn push(&self, path: &Path, remote: &str, branch: &str, set_upstream: bool) -> DroverResult<()>;

    async fn delete_local_branch(&self, path: &Path, branch: &str, force: bool) -> DroverResult<()>;

    async fn delete_remote_branch(&self, path: &Path, remote: &str, branch: &str) -> DroverResult<()>;

    async fn reset_hard(&self, path: &Path, target: &str) -> DroverResult<()>;

    async fn clean(&self, path: &Path, options: &CleanOptions) -> DroverResult<()>;

    async fn is_rebase_in_progress(&self, path: &Path) -> DroverResult<bool>;

    async fn abort_rebase(&self, path: &Path) -> DroverResult<()>;

    async fn update_submodules(&self, path: &Path, recursive: bool, depth: u32) -> DroverResult<()>;

    /// Run a git subcommand line in every submodule.
    async fn submodule_foreach(&self, path: &Path, command: &str, recursive: bool) -> DroverResult<()>;

    async fn set_config(&self, path: &Path, key: &str, value: &str) -> DroverResult<()>;

    async fn lfs_install(&self, path: &Path) -> DroverResult<()>;

    async fn lfs_pull(&self, path: &Path) -> DroverResult<()>;

    async fn rev_parse(&self, path: &Path, rev: &str) -> DroverResult<String>;

    /// Commits (ahead, behind) of `branch` relative to `upstream`.
    async fn ahead_behind(&self, path: &Path, branch: &str, upstream: &str) -> DroverResult<(usize, usize)>;

    async fn commit_before(&self, path: &Path, query: &HistoryQuery) -> DroverResult<Option<String>>;

    async fn merge_ff_only(&self, path: &Path, target: &str) -> DroverResult<()>;

    async fn rebase(&self, path: &Path, onto: &str) -> DroverResult<()>;

    async fn is_dirty(&self, path: &Path) -> DroverResult<bool>;

    async fn list_branches(&self, path: &Path, scope: BranchScope) -> DroverResult<Vec<String>>;

    async fn stash(&self, path: &Path) -> DroverResult<()>;
}
