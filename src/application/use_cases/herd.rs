//! herd: clone missing projects, bring existing ones onto their ref.

use async_trait::async_trait;

use crate::application::operation::{OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::application::services::reconciler::Reconciler;
use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::domain::value_objects::git_ref::GitRef;
use crate::infrastructure::git::operations::CloneOptions;
use crate::infrastructure::git::GitOperations;

/// herd実行時のオプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HerdOptions {
    /// Branch to use instead of the manifest ref, when the remote has it.
    pub branch: Option<String>,
    /// Tag to use instead of the manifest ref, when the remote has it.
    pub tag: Option<String>,
    /// Overrides the project's clone/fetch depth.
    pub depth: Option<u32>,
    pub rebase: bool,
}

impl HerdOptions {
    fn override_ref(&self) -> DroverResult<Option<GitRef>> {
        let invalid = |e: crate::domain::value_objects::git_ref::GitRefError| {
            DroverError::validation_error("ref", e.to_string(), None)
        };
        if let Some(branch) = &self.branch {
            return GitRef::branch(branch).map(Some).map_err(invalid);
        }
        if let Some(tag) = &self.tag {
            return GitRef::tag(tag).map(Some).map_err(invalid);
        }
        Ok(None)
    }
}

/// Clone-or-update reconciliation.
#[derive(Debug, Clone, Default)]
pub struct Herd {
    options: HerdOptions,
    skip_upstream_pull: bool,
}

impl Herd {
    pub fn new(options: HerdOptions) -> DroverResult<Self> {
        options.override_ref()?;
        Ok(Self {
            options,
            skip_upstream_pull: false,
        })
    }

    /// Fetch the upstream remote but leave merging it to the caller.
    pub(crate) fn without_upstream_pull(mut self) -> Self {
        self.skip_upstream_pull = true;
        self
    }

    pub fn options(&self) -> &HerdOptions {
        &self.options
    }

    /// The override ref if it differs from the manifest ref and exists on
    /// the remote; otherwise `None` with a notice.
    async fn checked_override(
        &self,
        git: &dyn GitOperations,
        rec: &mut Reconciler<'_>,
        project: &ResolvedProject,
        cloned: bool,
    ) -> DroverResult<Option<GitRef>> {
        let Some(candidate) = self.options.override_ref()? else {
            return Ok(None);
        };
        if candidate == project.git_ref {
            return Ok(None);
        }

        let exists = match (&candidate, cloned) {
            (GitRef::Branch(branch), true) => {
                git.has_remote_branch(&project.path, &project.remote, branch).await?
            }
            (GitRef::Tag(tag), true) => git.has_remote_tag(&project.path, &project.remote, tag).await?,
            _ => git.ls_remote_ref(&project.url, &candidate.full_ref()).await?,
        };

        if exists {
            Ok(Some(candidate))
        } else {
            rec.note(format!(
                "{} '{}' not found on {}, using {}",
                candidate.kind(),
                candidate,
                project.remote,
                project.git_ref
            ));
            Ok(None)
        }
    }

    async fn clone_missing(
        &self,
        git: &dyn GitOperations,
        rec: &mut Reconciler<'_>,
        project: &ResolvedProject,
        depth: u32,
    ) -> DroverResult<()> {
        let target = self
            .checked_override(git, rec, project, false)
            .await?
            .unwrap_or_else(|| project.git_ref.clone());

        let options = CloneOptions {
            branch: target.as_branch().map(str::to_string),
            remote: project.remote.clone(),
            depth,
        };
        git.clone_repo(&project.url, &project.path, &options).await?;
        rec.note(format!("cloned {} at {}", project.url, target));

        if target.is_detached() {
            rec.checkout_detached(&target).await?;
        }
        Ok(())
    }

    async fn update_existing(
        &self,
        git: &dyn GitOperations,
        rec: &mut Reconciler<'_>,
        project: &ResolvedProject,
        depth: u32,
    ) -> DroverResult<()> {
        rec.ensure_remote(&project.remote, &project.url).await?;
        rec.fetch(&project.remote, depth).await?;

        let target = self
            .checked_override(git, rec, project, true)
            .await?
            .unwrap_or_else(|| project.git_ref.clone());

        match &target {
            GitRef::Branch(branch) => {
                rec.reconcile_branch(&project.remote, branch, self.options.rebase)
                    .await
            }
            GitRef::Tag(_) | GitRef::Commit(_) => rec.checkout_detached(&target).await,
        }
    }

    /// Fetch the fork parent and pull its branch into the checked out branch.
    async fn herd_upstream(
        &self,
        git: &dyn GitOperations,
        rec: &mut Reconciler<'_>,
        project: &ResolvedProject,
        depth: u32,
    ) -> DroverResult<()> {
        let Some(upstream) = &project.upstream else {
            return Ok(());
        };
        rec.ensure_remote(&upstream.remote, &upstream.url).await?;
        rec.fetch(&upstream.remote, depth).await?;
        if self.skip_upstream_pull {
            return Ok(());
        }

        let (Some(branch), Some(upstream_branch)) = (project.branch(), upstream.git_ref.as_branch()) else {
            return Ok(());
        };
        if git.current_branch(&project.path).await?.as_deref() != Some(branch) {
            return Ok(());
        }
        rec.pull_from(&upstream.remote, upstream_branch, self.options.rebase)
            .await
    }
}

#[async_trait]
impl ProjectOperation for Herd {
    fn name(&self) -> &'static str {
        "herd"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        let depth = self.options.depth.unwrap_or(project.git.depth);
        let mut rec = Reconciler::new(git, project);

        let kind = if git.is_repository(&project.path).await {
            self.update_existing(git, &mut rec, project, depth).await?;
            OutcomeKind::Updated
        } else {
            self.clone_missing(git, &mut rec, project, depth).await?;
            OutcomeKind::Cloned
        };

        self.herd_upstream(git, &mut rec, project, depth).await?;
        rec.apply_git_settings(&project.git, depth).await?;

        Ok(ProjectOutcome::new(&project.name, kind).with_messages(rec.into_messages()))
    }
}
