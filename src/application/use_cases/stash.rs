//! stash: shelve uncommitted changes in dirty projects.

use async_trait::async_trait;

use crate::application::operation::{OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::GitOperations;

#[derive(Debug, Clone, Copy, Default)]
pub struct Stash;

#[async_trait]
impl ProjectOperation for Stash {
    fn name(&self) -> &'static str {
        "stash"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        if !git.is_repository(&project.path).await {
            return Ok(ProjectOutcome::skipped(&project.name, "not cloned"));
        }
        if !git.is_dirty(&project.path).await? {
            return Ok(ProjectOutcome::skipped(&project.name, "no local changes"));
        }
        git.stash(&project.path).await?;
        Ok(ProjectOutcome::new(&project.name, OutcomeKind::Done).with_message("stashed local changes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::resolved_project::fixtures;
    use crate::domain::value_objects::git_ref::GitRef;
    use crate::infrastructure::git::operations::MockGitOperations;
    use std::path::Path;

    #[tokio::test]
    async fn test_only_dirty_trees_are_stashed() {
        let project = fixtures::project("kit", Path::new("/ws"), GitRef::Branch("master".into()));

        let mut clean = MockGitOperations::new();
        clean.expect_is_repository().returning(|_| true);
        clean.expect_is_dirty().returning(|_| Ok(false));
        clean.expect_stash().never();
        assert_eq!(Stash.run(&clean, &project).await.unwrap().kind, OutcomeKind::Skipped);

        let mut dirty = MockGitOperations::new();
        dirty.expect_is_repository().returning(|_| true);
        dirty.expect_is_dirty().returning(|_| Ok(true));
        dirty.expect_stash().times(1).returning(|_| Ok(()));
        assert_eq!(Stash.run(&dirty, &project).await.unwrap().kind, OutcomeKind::Done);
    }
}
