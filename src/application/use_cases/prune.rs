//! prune: delete a branch locally and/or on the project's remote.

use async_trait::async_trait;

use crate::application::operation::{OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::application::services::reconciler::Reconciler;
use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::GitOperations;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOptions {
    pub branch: String,
    pub local: bool,
    pub remote: bool,
    /// `branch -D` instead of `-d`
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct Prune {
    options: PruneOptions,
}

impl Prune {
    /// Neither `local` nor `remote` means local only.
    pub fn new(mut options: PruneOptions) -> DroverResult<Self> {
        options.branch = options.branch.trim().to_string();
        if options.branch.is_empty() {
            return Err(DroverError::validation_error("branch", "branch name is empty", None));
        }
        if !options.local && !options.remote {
            options.local = true;
        }
        Ok(Self { options })
    }

    async fn prune_local(
        &self,
        git: &dyn GitOperations,
        rec: &mut Reconciler<'_>,
        project: &ResolvedProject,
    ) -> DroverResult<()> {
        let branch = &self.options.branch;
        if !git.has_local_branch(&project.path, branch).await? {
            rec.note(format!("local branch '{}' does not exist", branch));
            return Ok(());
        }

        if git.current_branch(&project.path).await?.as_deref() == Some(branch.as_str()) {
            git.checkout(&project.path, &project.git_ref.checkout_target()).await?;
            rec.note(format!("switched to {} before deleting '{}'", project.git_ref, branch));
        }
        git.delete_local_branch(&project.path, branch, self.options.force).await?;
        rec.note(format!("deleted local branch '{}'", branch));
        Ok(())
    }

    async fn prune_remote(
        &self,
        git: &dyn GitOperations,
        rec: &mut Reconciler<'_>,
        project: &ResolvedProject,
    ) -> DroverResult<()> {
        let branch = &self.options.branch;
        rec.fetch(&project.remote, project.git.depth).await?;
        if !git.has_remote_branch(&project.path, &project.remote, branch).await? {
            rec.note(format!("remote branch {}/{} does not exist", project.remote, branch));
            return Ok(());
        }
        git.delete_remote_branch(&project.path, &project.remote, branch).await?;
        rec.note(format!("deleted remote branch {}/{}", project.remote, branch));
        Ok(())
    }
}

#[async_trait]
impl ProjectOperation for Prune {
    fn name(&self) -> &'static str {
        "prune"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        if !git.is_repository(&project.path).await {
            return Ok(ProjectOutcome::skipped(&project.name, "not cloned"));
        }
        if project.branch() == Some(self.options.branch.as_str()) {
            return Ok(ProjectOutcome::skipped(
                &project.name,
                format!("'{}' is the project's default branch", self.options.branch),
            ));
        }

        let mut rec = Reconciler::new(git, project);
        if self.options.local {
            self.prune_local(git, &mut rec, project).await?;
        }
        if self.options.remote {
            self.prune_remote(git, &mut rec, project).await?;
        }
        Ok(ProjectOutcome::new(&project.name, OutcomeKind::Done).with_messages(rec.into_messages()))
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

    fn prune(local: bool, remote: bool) -> Prune {
        Prune::new(PruneOptions {
            branch: "feature".into(),
            local,
            remote,
            force: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_switches_off_current_branch_before_delete() {
        let project = kit();
        let mut git = MockGitOperations::new();
        let mut seq = Sequence::new();

        git.expect_is_repository().returning(|_| true);
        git.expect_has_local_branch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));
        git.expect_current_branch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some("feature".to_string())));
        git.expect_checkout()
            .with(always(), eq("master"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        git.expect_delete_local_branch()
            .with(always(), eq("feature"), eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let outcome = prune(true, false).run(&git, &project).await.unwrap();
        assert_eq!(outcome.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_branches_are_not_errors() {
        let project = kit();
        let mut git = MockGitOperations::new();

        git.expect_is_repository().returning(|_| true);
        git.expect_has_local_branch().returning(|_, _| Ok(false));
        git.expect_fetch().returning(|_, _, _| Ok(()));
        git.expect_has_remote_branch().returning(|_, _, _| Ok(false));
        git.expect_delete_local_branch().never();
        git.expect_delete_remote_branch().never();

        let outcome = prune(true, true).run(&git, &project).await.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Done);
        assert!(outcome.messages.iter().all(|m| m.contains("does not exist")));
    }

    #[tokio::test]
    async fn test_remote_only_deletes_remote_branch() {
        let project = kit();
        let mut git = MockGitOperations::new();

        git.expect_is_repository().returning(|_| true);
        git.expect_fetch().returning(|_, _, _| Ok(()));
        git.expect_has_remote_branch().returning(|_, _, _| Ok(true));
        git.expect_delete_remote_branch()
            .with(always(), eq("origin"), eq("feature"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        git.expect_has_local_branch().never();

        prune(false, true).run(&git, &project).await.unwrap();
    }

    #[tokio::test]
    async fn test_default_branch_is_never_pruned() {
        let project = kit();
        let mut git = MockGitOperations::new();
        git.expect_is_repository().returning(|_| true);
        git.expect_delete_local_branch().never();

        let prune = Prune::new(PruneOptions {
            branch: "master".into(),
            ..Default::default()
        })
        .unwrap();
        let outcome = prune.run(&git, &project).await.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Skipped);
    }

    #[test]
    fn test_empty_branch_rejected() {
        assert!(Prune::new(PruneOptions::default()).is_err());
    }
}
