//! clean: throw away uncommitted work and any rebase in progress.

use async_trait::async_trait;

use crate::application::operation::{OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::operations::CleanOptions;
use crate::infrastructure::git::GitOperations;

#[derive(Debug, Clone, Default)]
pub struct Clean {
    options: CleanOptions,
    /// Cascade into submodules even when the project is not `recursive`.
    recursive: bool,
}

impl Clean {
    pub fn new(options: CleanOptions, recursive: bool) -> Self {
        Self { options, recursive }
    }

    fn submodule_command(&self) -> String {
        format!("git {} && git reset --hard", self.options.to_args().join(" "))
    }
}

#[async_trait]
impl ProjectOperation for Clean {
    fn name(&self) -> &'static str {
        "clean"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        let path = &project.path;
        if !git.is_repository(path).await {
            return Ok(ProjectOutcome::skipped(&project.name, "not cloned"));
        }

        let mut outcome = ProjectOutcome::new(&project.name, OutcomeKind::Done);
        git.clean(path, &self.options).await?;
        git.reset_hard(path, "HEAD").await?;
        if git.is_rebase_in_progress(path).await? {
            git.abort_rebase(path).await?;
            outcome = outcome.with_message("aborted rebase in progress");
        }

        if self.recursive || (project.git.submodules && project.git.recursive) {
            git.submodule_foreach(path, &self.submodule_command(), true).await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::resolved_project::fixtures;
    use crate::domain::value_objects::git_ref::GitRef;
    use crate::infrastructure::git::operations::MockGitOperations;
    use mockall::predicate::{always, eq};
    use mockall::Sequence;
    use std::path::Path;

    fn kit() -> ResolvedProject {
        fixtures::project("jrgoodle/kit", Path::new("/ws"), GitRef::Branch("master".into()))
    }

    #[tokio::test]
    async fn test_clean_then_reset_then_abort_rebase() {
        let project = kit();
        let options = CleanOptions {
            directories: true,
            ..Default::default()
        };
        let mut git = MockGitOperations::new();
        let mut seq = Sequence::new();

        git.expect_is_repository().returning(|_| true);
        git.expect_clean()
            .with(always(), eq(options))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        git.expect_reset_hard()
            .with(always(), eq("HEAD"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        git.expect_is_rebase_in_progress()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        git.expect_abort_rebase()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        git.expect_submodule_foreach().never();

        let outcome = Clean::new(options, false).run(&git, &project).await.unwrap();
        assert_eq!(outcome.messages, vec!["aborted rebase in progress"]);
    }

    #[tokio::test]
    async fn test_recursive_project_cascades_into_submodules() {
        let mut project = kit();
        project.git.submodules = true;
        project.git.recursive = true;
        let mut git = MockGitOperations::new();

        git.expect_is_repository().returning(|_| true);
        git.expect_clean().returning(|_, _| Ok(()));
        git.expect_reset_hard().returning(|_, _| Ok(()));
        git.expect_is_rebase_in_progress().returning(|_| Ok(false));
        git.expect_submodule_foreach()
            .with(always(), eq("git clean -f && git reset --hard"), eq(true))
            .times(1)
            .returning(|_, _, _| Ok(()));

        Clean::default().run(&git, &project).await.unwrap();
    }
}
