//! sync: herd a fork, then bring its branch level with the upstream branch.

use async_trait::async_trait;

use crate::application::operation::{OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::application::use_cases::herd::{Herd, HerdOptions};
use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::GitOperations;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Rebase onto the upstream branch instead of fast-forwarding.
    pub rebase: bool,
    /// Push the result to the project's own remote.
    pub push: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            rebase: false,
            push: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncFork {
    options: SyncOptions,
    herd: Herd,
}

impl SyncFork {
    pub fn new(options: SyncOptions) -> DroverResult<Self> {
        let herd = Herd::new(HerdOptions {
            rebase: options.rebase,
            ..Default::default()
        })?
        .without_upstream_pull();
        Ok(Self { options, herd })
    }
}

#[async_trait]
impl ProjectOperation for SyncFork {
    fn name(&self) -> &'static str {
        "sync"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        let Some(upstream) = &project.upstream else {
            return Ok(ProjectOutcome::skipped(&project.name, "no upstream configured"));
        };
        let (Some(branch), Some(upstream_branch)) = (project.branch(), upstream.git_ref.as_branch()) else {
            return Ok(ProjectOutcome::skipped(
                &project.name,
                "fork sync needs a branch on both the project and its upstream",
            ));
        };

        let herded = self.herd.run(git, project).await?;
        let path = &project.path;

        if !git.has_remote_branch(path, &upstream.remote, upstream_branch).await? {
            return Err(DroverError::git_error(format!(
                "upstream branch {}/{} does not exist",
                upstream.remote, upstream_branch
            )));
        }

        let target = format!("{}/{}", upstream.remote, upstream_branch);
        if self.options.rebase {
            git.rebase(path, &target).await?;
        } else {
            git.merge_ff_only(path, &target).await?;
        }

        let mut outcome = ProjectOutcome::new(&project.name, OutcomeKind::Updated)
            .with_messages(herded.messages)
            .with_message(format!("'{}' synced with {}", branch, target));

        if self.options.push {
            git.push(path, &project.remote, branch, false).await?;
            outcome = outcome.with_message(format!("pushed '{}' to {}", branch, project.remote));
        }
        Ok(outcome)
    }
}
