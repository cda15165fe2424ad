//! Recording git fake
//!
//! Keeps a small in-memory model of each working copy (remotes, branches,
//! HEAD) and records every call as a short string, so tests can assert on
//! the order the engine talks to git in.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drover::common::error::DroverError;
use drover::common::result::DroverResult;
use drover::infrastructure::git::operations::{
    BranchScope, CleanOptions, CloneOptions, FetchOptions, HistoryQuery,
};
use drover::infrastructure::git::GitOperations;

/// 1作業コピーの状態
#[derive(Debug, Clone, Default)]
pub struct FakeRepo {
    pub remotes: BTreeMap<String, String>,
    /// `None` when HEAD is detached.
    pub branch: Option<String>,
    pub local_branches: BTreeSet<String>,
    pub tracking: BTreeMap<String, String>,
    pub head: String,
    pub dirty: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    repos: BTreeMap<PathBuf, FakeRepo>,
    calls: Vec<String>,
    /// Branch or tag names missing on every remote.
    missing_refs: BTreeSet<String>,
    /// Projects whose clone and fetch fail.
    failing: BTreeSet<PathBuf>,
}

/// Recording fake of [`GitOperations`]
#[derive(Debug, Clone, Default)]
pub struct FakeGit {
    state: Arc<Mutex<FakeState>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

fn short(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn fake_sha(path: &Path) -> String {
    let seed: usize = path.to_string_lossy().bytes().map(usize::from).sum();
    format!("{:040x}", seed)
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every clone and fetch sleeps for `delay`, to make overlap observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register an already cloned working copy on `branch`.
    pub fn with_existing(self, path: &Path, remote: &str, url: &str, branch: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let repo = FakeRepo {
                remotes: [(remote.to_string(), url.to_string())].into_iter().collect(),
                branch: Some(branch.to_string()),
                local_branches: [branch.to_string()].into_iter().collect(),
                tracking: [(branch.to_string(), format!("{}/{}", remote, branch))]
                    .into_iter()
                    .collect(),
                head: fake_sha(path),
                dirty: false,
            };
            state.repos.insert(path.to_path_buf(), repo);
        }
        self
    }

    pub fn with_missing_ref(self, name: &str) -> Self {
        self.state.lock().unwrap().missing_refs.insert(name.to_string());
        self
    }

    pub fn failing_on(self, path: &Path) -> Self {
        self.state.lock().unwrap().failing.insert(path.to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls whose verb is `verb`, e.g. `"clone"`.
    pub fn calls_for(&self, verb: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split_whitespace().next() == Some(verb))
            .collect()
    }

    pub fn repo(&self, path: &Path) -> Option<FakeRepo> {
        self.state.lock().unwrap().repos.get(path).cloned()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check_failing(&self, path: &Path, command: &str) -> DroverResult<()> {
        if self.state.lock().unwrap().failing.contains(path) {
            return Err(DroverError::git_command_failed(
                command,
                Some(128),
                format!("fatal: could not read from remote for {}", short(path)),
            ));
        }
        Ok(())
    }

    async fn network(&self) {
        let Some(delay) = self.delay else {
            return;
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn with_repo<T>(&self, path: &Path, f: impl FnOnce(&mut FakeRepo) -> T) -> DroverResult<T> {
        let mut state = self.state.lock().unwrap();
        state
            .repos
            .get_mut(path)
            .map(f)
            .ok_or_else(|| DroverError::git_error(format!("{} is not a repository", path.display())))
    }

    fn is_missing(&self, name: &str) -> bool {
        self.state.lock().unwrap().missing_refs.contains(name)
    }
}

#[async_trait]
impl GitOperations for FakeGit {
    async fn is_repository(&self, path: &Path) -> bool {
        self.state.lock().unwrap().repos.contains_key(path)
    }

    async fn clone_repo(&self, url: &str, path: &Path, options: &CloneOptions) -> DroverResult<()> {
        self.record(format!("clone {} {}", short(path), url));
        self.network().await;
        self.check_failing(path, "git clone")?;

        let branch = options.branch.clone().unwrap_or_else(|| "master".to_string());
        let repo = FakeRepo {
            remotes: [(options.remote.clone(), url.to_string())].into_iter().collect(),
            branch: Some(branch.clone()),
            local_branches: [branch.clone()].into_iter().collect(),
            tracking: [(branch.clone(), format!("{}/{}", options.remote, branch))]
                .into_iter()
                .collect(),
            head: fake_sha(path),
            dirty: false,
        };
        self.state.lock().unwrap().repos.insert(path.to_path_buf(), repo);
        Ok(())
    }

    async fn remote_url(&self, path: &Path, remote: &str) -> DroverResult<Option<String>> {
        self.with_repo(path, |repo| repo.remotes.get(remote).cloned())
    }

    async fn add_remote(&self, path: &Path, remote: &str, url: &str) -> DroverResult<()> {
        self.record(format!("remote-add {} {}", short(path), remote));
        self.with_repo(path, |repo| {
            repo.remotes.insert(remote.to_string(), url.to_string());
        })
    }

    async fn set_remote_url(&self, path: &Path, remote: &str, url: &str) -> DroverResult<()> {
        self.record(format!("remote-set-url {} {}", short(path), remote));
        self.with_repo(path, |repo| {
            repo.remotes.insert(remote.to_string(), url.to_string());
        })
    }

    async fn fetch(&self, path: &Path, remote: &str, _options: &FetchOptions) -> DroverResult<()> {
        self.record(format!("fetch {} {}", short(path), remote));
        self.network().await;
        self.check_failing(path, "git fetch")
    }

    async fn ls_remote_ref(&self, _url: &str, refname: &str) -> DroverResult<bool> {
        let name = refname
            .strip_prefix("refs/heads/")
            .or_else(|| refname.strip_prefix("refs/tags/"))
            .unwrap_or(refname);
        Ok(!self.is_missing(name))
    }

    async fn has_remote_branch(&self, _path: &Path, _remote: &str, branch: &str) -> DroverResult<bool> {
        Ok(!self.is_missing(branch))
    }

    async fn has_remote_tag(&self, _path: &Path, _remote: &str, tag: &str) -> DroverResult<bool> {
        Ok(!self.is_missing(tag))
    }

    async fn has_local_branch(&self, path: &Path, branch: &str) -> DroverResult<bool> {
        self.with_repo(path, |repo| repo.local_branches.contains(branch))
    }

    /// Remote-tracking refs exist unless the branch is missing everywhere.
    async fn has_ref(&self, _path: &Path, refname: &str) -> DroverResult<bool> {
        let name = refname.strip_prefix("refs/remotes/").unwrap_or(refname);
        let name = name.split_once('/').map_or(name, |(_, branch)| branch);
        Ok(!self.is_missing(name))
    }

    async fn tracking_branch(&self, path: &Path, branch: &str) -> DroverResult<Option<String>> {
        self.with_repo(path, |repo| repo.tracking.get(branch).cloned())
    }

    async fn create_branch(&self, path: &Path, branch: &str) -> DroverResult<()> {
        self.record(format!("branch {} {}", short(path), branch));
        self.with_repo(path, |repo| {
            repo.local_branches.insert(branch.to_string());
        })
    }

    async fn create_tracking_branch(&self, path: &Path, branch: &str, remote: &str) -> DroverResult<()> {
        self.record(format!("branch {} {} {}/{}", short(path), branch, remote, branch));
        self.with_repo(path, |repo| {
            repo.local_branches.insert(branch.to_string());
            repo.tracking
                .insert(branch.to_string(), format!("{}/{}", remote, branch));
        })
    }

    async fn set_upstream(&self, path: &Path, branch: &str, remote: &str) -> DroverResult<()> {
        self.record(format!("set-upstream {} {}/{}", short(path), remote, branch));
        self.with_repo(path, |repo| {
            repo.tracking
                .insert(branch.to_string(), format!("{}/{}", remote, branch));
        })
    }

    async fn checkout(&self, path: &Path, target: &str) -> DroverResult<()> {
        self.record(format!("checkout {} {}", short(path), target));
        self.with_repo(path, |repo| {
            repo.branch = repo
                .local_branches
                .contains(target)
                .then(|| target.to_string());
        })
    }

    async fn current_branch(&self, path: &Path) -> DroverResult<Option<String>> {
        self.with_repo(path, |repo| repo.branch.clone())
    }

    async fn pull(&self, path: &Path, remote: &str, branch: &str, rebase: bool) -> DroverResult<()> {
        let mode = if rebase { "--rebase" } else { "--ff-only" };
        self.record(format!("pull {} {}/{} {}", short(path), remote, branch, mode));
        Ok(())
    }

    async fn push(&self, path: &Path, remote: &str, branch: &str, set_upstream: bool) -> DroverResult<()> {
        let flag = if set_upstream { " -u" } else { "" };
        self.record(format!("push {} {}/{}{}", short(path), remote, branch, flag));
        Ok(())
    }

    async fn delete_local_branch(&self, path: &Path, branch: &str, _force: bool) -> DroverResult<()> {
        self.record(format!("branch-delete {} {}", short(path), branch));
        self.with_repo(path, |repo| {
            repo.local_branches.remove(branch);
        })
    }

    async fn delete_remote_branch(&self, path: &Path, remote: &str, branch: &str) -> DroverResult<()> {
        self.record(format!("push-delete {} {}/{}", short(path), remote, branch));
        Ok(())
    }

    async fn reset_hard(&self, path: &Path, target: &str) -> DroverResult<()> {
        self.record(format!("reset {} {}", short(path), target));
        self.with_repo(path, |repo| repo.dirty = false)
    }

    async fn clean(&self, path: &Path, options: &CleanOptions) -> DroverResult<()> {
        self.record(format!("clean {} {}", short(path), options.to_args().join(" ")));
        Ok(())
    }

    async fn is_rebase_in_progress(&self, _path: &Path) -> DroverResult<bool> {
        Ok(false)
    }

    async fn abort_rebase(&self, path: &Path) -> DroverResult<()> {
        self.record(format!("rebase-abort {}", short(path)));
        Ok(())
    }

    async fn update_submodules(&self, path: &Path, _recursive: bool, _depth: u32) -> DroverResult<()> {
        self.record(format!("submodule-update {}", short(path)));
        Ok(())
    }

    async fn submodule_foreach(&self, path: &Path, command: &str, _recursive: bool) -> DroverResult<()> {
        self.record(format!("submodule-foreach {} {}", short(path), command));
        Ok(())
    }

    async fn set_config(&self, path: &Path, key: &str, value: &str) -> DroverResult<()> {
        self.record(format!("config {} {}={}", short(path), key, value));
        Ok(())
    }

    async fn lfs_install(&self, path: &Path) -> DroverResult<()> {
        self.record(format!("lfs-install {}", short(path)));
        Ok(())
    }

    async fn lfs_pull(&self, path: &Path) -> DroverResult<()> {
        self.record(format!("lfs-pull {}", short(path)));
        Ok(())
    }

    async fn rev_parse(&self, path: &Path, _rev: &str) -> DroverResult<String> {
        self.with_repo(path, |repo| repo.head.clone())
    }

    async fn ahead_behind(&self, _path: &Path, _branch: &str, _upstream: &str) -> DroverResult<(usize, usize)> {
        Ok((0, 0))
    }

    async fn commit_before(&self, path: &Path, _query: &HistoryQuery) -> DroverResult<Option<String>> {
        self.with_repo(path, |repo| Some(repo.head.clone()))
    }

    async fn merge_ff_only(&self, path: &Path, target: &str) -> DroverResult<()> {
        self.record(format!("merge {} {}", short(path), target));
        Ok(())
    }

    async fn rebase(&self, path: &Path, onto: &str) -> DroverResult<()> {
        self.record(format!("rebase {} {}", short(path), onto));
        Ok(())
    }

    async fn is_dirty(&self, path: &Path) -> DroverResult<bool> {
        self.with_repo(path, |repo| repo.dirty)
    }

    async fn list_branches(&self, path: &Path, _scope: BranchScope) -> DroverResult<Vec<String>> {
        self.with_repo(path, |repo| repo.local_branches.iter().cloned().collect())
    }

    async fn stash(&self, path: &Path) -> DroverResult<()> {
        self.record(format!("stash {}", short(path)));
        self.with_repo(path, |repo| repo.dirty = false)
    }
}
