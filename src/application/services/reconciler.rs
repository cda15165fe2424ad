//! Shared sub-steps of the per-project state machines.
//!
//! A [`Reconciler`] is created for one project, drives the git primitives in
//! order and collects plain notices for the outcome.

use std::path::Path;
use tracing::{info, warn};

use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::{ResolvedGitSettings, ResolvedProject};
use crate::domain::value_objects::git_ref::GitRef;
use crate::domain::value_objects::git_url::{same_remote, same_repository};
use crate::infrastructure::git::operations::FetchOptions;
use crate::infrastructure::git::GitOperations;

pub struct Reconciler<'a> {
    git: &'a dyn GitOperations,
    project: &'a ResolvedProject,
    messages: Vec<String>,
}

impl<'a> Reconciler<'a> {
    pub fn new(git: &'a dyn GitOperations, project: &'a ResolvedProject) -> Self {
        Self {
            git,
            project,
            messages: Vec::new(),
        }
    }

    pub fn path(&self) -> &'a Path {
        &self.project.path
    }

    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(project = %self.project.name, "{}", message);
        self.messages.push(message);
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }

    /// Add `remote` when it is absent.
    ///
    /// An existing remote for the same repository over another protocol is
    /// switched to `url`. One pointing at a different repository is an error;
    /// it is left for the user to fix.
    pub async fn ensure_remote(&mut self, remote: &str, url: &str) -> DroverResult<()> {
        match self.git.remote_url(self.path(), remote).await? {
            None => {
                self.git.add_remote(self.path(), remote, url).await?;
                self.note(format!("added remote '{}' ({})", remote, url));
            }
            Some(existing) if same_remote(&existing, url) => {}
            Some(existing) if same_repository(&existing, url) => {
                warn!(project = %self.project.name, remote, from = %existing, to = %url, "switching remote url");
                self.git.set_remote_url(self.path(), remote, url).await?;
                self.note(format!("remote '{}' switched from {} to {}", remote, existing, url));
            }
            Some(existing) => {
                return Err(DroverError::git_error(format!(
                    "remote '{}' points at {}, expected {}",
                    remote, existing, url
                )));
            }
        }
        Ok(())
    }

    pub async fn fetch(&mut self, remote: &str, depth: u32) -> DroverResult<()> {
        let options = FetchOptions {
            depth,
            tags: true,
            prune: true,
        };
        self.git.fetch(self.path(), remote, &options).await
    }

    /// Make `branch` exist locally, check it out, give it a tracking branch
    /// on `remote` and bring it up to date.
    ///
    /// A branch missing on the remote is created locally and left without a
    /// tracking branch; there is nothing to pull from.
    pub async fn reconcile_branch(&mut self, remote: &str, branch: &str, rebase: bool) -> DroverResult<()> {
        let path = self.path();
        let on_remote = self.git.has_remote_branch(path, remote, branch).await?;

        if !self.git.has_local_branch(path, branch).await? {
            if on_remote {
                self.git.create_tracking_branch(path, branch, remote).await?;
                self.note(format!("created branch '{}' tracking {}/{}", branch, remote, branch));
            } else {
                self.git.create_branch(path, branch).await?;
                self.note(format!(
                    "created local branch '{}'; {}/{} does not exist",
                    branch, remote, branch
                ));
            }
        }

        self.checkout_branch(branch).await?;

        if !on_remote {
            self.note(format!("no {}/{} to pull from", remote, branch));
            return Ok(());
        }

        let expected = format!("{}/{}", remote, branch);
        match self.git.tracking_branch(path, branch).await? {
            None => {
                self.git.set_upstream(path, branch, remote).await?;
                self.note(format!("'{}' now tracks {}", branch, expected));
            }
            Some(tracking) if tracking != expected => {
                self.note(format!("'{}' tracks {}, pulling from {}", branch, tracking, expected));
            }
            Some(_) => {}
        }

        self.git.pull(path, remote, branch, rebase).await
    }

    /// Pull `remote/branch` into whatever is checked out, if it exists.
    pub async fn pull_from(&mut self, remote: &str, branch: &str, rebase: bool) -> DroverResult<()> {
        if self.git.has_remote_branch(self.path(), remote, branch).await? {
            self.git.pull(self.path(), remote, branch, rebase).await
        } else {
            self.note(format!("{}/{} does not exist", remote, branch));
            Ok(())
        }
    }

    pub async fn checkout_branch(&mut self, branch: &str) -> DroverResult<()> {
        let current = self.git.current_branch(self.path()).await?;
        if current.as_deref() != Some(branch) {
            self.git.checkout(self.path(), branch).await?;
        }
        Ok(())
    }

    /// Check out a tag or commit, leaving HEAD detached.
    pub async fn checkout_detached(&mut self, git_ref: &GitRef) -> DroverResult<()> {
        self.git.checkout(self.path(), &git_ref.checkout_target()).await
    }

    /// Submodules, local config and LFS, in that order.
    pub async fn apply_git_settings(&mut self, settings: &ResolvedGitSettings, depth: u32) -> DroverResult<()> {
        let path = self.path();
        if settings.submodules {
            self.git.update_submodules(path, settings.recursive, depth).await?;
        }
        for (key, value) in &settings.config {
            self.git.set_config(path, key, value).await?;
        }
        if settings.lfs {
            self.git.lfs_install(path).await?;
            self.git.lfs_pull(path).await?;
        }
        Ok(())
    }
}
