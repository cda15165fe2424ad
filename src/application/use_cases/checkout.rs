//! checkout: switch every project to an existing local branch.

use async_trait::async_trait;

use crate::application::operation::{OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::application::services::reconciler::Reconciler;
use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::GitOperations;

#[derive(Debug, Clone)]
pub struct Checkout {
    branch: String,
}

impl Checkout {
    pub fn new(branch: impl Into<String>) -> DroverResult<Self> {
        let branch = branch.into().trim().to_string();
        if branch.is_empty() {
            return Err(DroverError::validation_error("branch", "branch name is empty", None));
        }
        Ok(Self { branch })
    }
}

#[async_trait]
impl ProjectOperation for Checkout {
    fn name(&self) -> &'static str {
        "checkout"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        if !git.is_repository(&project.path).await {
            return Ok(ProjectOutcome::skipped(&project.name, "not cloned"));
        }
        if !git.has_local_branch(&project.path, &self.branch).await? {
            return Ok(ProjectOutcome::skipped(
                &project.name,
                format!("no local branch '{}'", self.branch),
            ));
        }
        let mut rec = Reconciler::new(git, project);
        rec.checkout_branch(&self.branch).await?;
        Ok(ProjectOutcome::new(&project.name, OutcomeKind::Done))
    }
}
