//! start: create and check out a new branch in each project.

use async_trait::async_trait;

use crate::application::operation::{OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::application::services::reconciler::Reconciler;
use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::GitOperations;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub branch: String,
    /// Also give the branch a tracking branch on the project's remote,
    /// pushing it there first if needed.
    pub tracking: bool,
}

#[derive(Debug, Clone)]
pub struct Start {
    options: StartOptions,
}

impl Start {
    pub fn new(mut options: StartOptions) -> DroverResult<Self> {
        options.branch = options.branch.trim().to_string();
        if options.branch.is_empty() {
            return Err(DroverError::validation_error("branch", "branch name is empty", None));
        }
        Ok(Self { options })
    }
}

#[async_trait]
impl ProjectOperation for Start {
    fn name(&self) -> &'static str {
        "start"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        if !git.is_repository(&project.path).await {
            return Ok(ProjectOutcome::skipped(&project.name, "not cloned"));
        }

        let branch = self.options.branch.as_str();
        let path = &project.path;
        let mut rec = Reconciler::new(git, project);

        if self.options.tracking {
            rec.fetch(&project.remote, project.git.depth).await?;
        }
        let on_remote = git.has_remote_branch(path, &project.remote, branch).await?;

        // リモートにはあるがまだfetchしていないブランチ
        let remote_ref = format!("refs/remotes/{}/{}", project.remote, branch);
        if on_remote && !git.has_ref(path, &remote_ref).await? {
            rec.fetch(&project.remote, project.git.depth).await?;
        }

        if !git.has_local_branch(path, branch).await? {
            if on_remote {
                git.create_tracking_branch(path, branch, &project.remote).await?;
            } else {
                git.create_branch(path, branch).await?;
            }
            rec.note(format!("created branch '{}'", branch));
        }
        rec.checkout_branch(branch).await?;

        if self.options.tracking && git.tracking_branch(path, branch).await?.is_none() {
            if on_remote {
                git.set_upstream(path, branch, &project.remote).await?;
            } else {
                git.push(path, &project.remote, branch, true).await?;
                rec.note(format!("pushed '{}' to {}", branch, project.remote));
            }
        }

        Ok(ProjectOutcome::new(&project.name, OutcomeKind::Done).with_messages(rec.into_messages()))
    }
}
