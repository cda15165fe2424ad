//! branch: list branches per project.

use async_trait::async_trait;

use crate::application::operation::{OutcomeData, OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::operations::BranchScope;
use crate::infrastructure::git::GitOperations;

#[derive(Debug, Clone, Default)]
pub struct ListBranches {
    scope: BranchScope,
}

impl ListBranches {
    pub fn new(scope: BranchScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl ProjectOperation for ListBranches {
    fn name(&self) -> &'static str {
        "branch"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        if !git.is_repository(&project.path).await {
            return Ok(ProjectOutcome::skipped(&project.name, "not cloned"));
        }
        let current = git.current_branch(&project.path).await?;
        let branches = git.list_branches(&project.path, self.scope).await?;
        Ok(ProjectOutcome::new(&project.name, OutcomeKind::Done)
            .with_data(OutcomeData::Branches { current, branches }))
    }
}
