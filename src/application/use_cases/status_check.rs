//! status: current ref, ahead/behind and dirty state per project.

use async_trait::async_trait;

use crate::application::operation::{
    OutcomeData, OutcomeKind, ProjectOperation, ProjectOutcome, ProjectStatus,
};
use crate::application::services::reconciler::Reconciler;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::GitOperations;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusOptions {
    /// Fetch the project's remote before counting.
    pub fetch: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StatusCheck {
    options: StatusOptions,
}

impl StatusCheck {
    pub fn new(options: StatusOptions) -> Self {
        Self { options }
    }

    fn missing(project: &ResolvedProject) -> ProjectStatus {
        ProjectStatus {
            name: project.name.clone(),
            path: project.relative_display(),
            current_ref: None,
            detached: false,
            tracking: None,
            upstream_gone: false,
            ahead: 0,
            behind: 0,
            dirty: false,
            missing: true,
        }
    }
}

#[async_trait]
impl ProjectOperation for StatusCheck {
    fn name(&self) -> &'static str {
        "status"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        let path = &project.path;
        if !git.is_repository(path).await {
            return Ok(ProjectOutcome::new(&project.name, OutcomeKind::Skipped)
                .with_data(OutcomeData::Status(Self::missing(project))));
        }

        let mut rec = Reconciler::new(git, project);
        if self.options.fetch {
            rec.fetch(&project.remote, project.git.depth).await?;
        }

        let branch = git.current_branch(path).await?;
        let (current_ref, detached) = match &branch {
            Some(branch) => (Some(branch.clone()), false),
            None => {
                let sha = git.rev_parse(path, "HEAD").await?;
                (Some(sha.chars().take(7).collect()), true)
            }
        };

        let tracking = match &branch {
            Some(branch) => git.tracking_branch(path, branch).await?,
            None => None,
        };
        let upstream_gone = match &tracking {
            Some(tracking) => !git.has_ref(path, tracking).await?,
            None => false,
        };
        if upstream_gone {
            if let Some(tracking) = &tracking {
                rec.note(format!("upstream '{}' is gone", tracking));
            }
        }
        let (ahead, behind) = match (&branch, &tracking) {
            (Some(branch), Some(tracking)) if !upstream_gone => {
                git.ahead_behind(path, branch, tracking).await?
            }
            _ => (0, 0),
        };

        let status = ProjectStatus {
            name: project.name.clone(),
            path: project.relative_display(),
            current_ref,
            detached,
            tracking,
            upstream_gone,
            ahead,
            behind,
            dirty: git.is_dirty(path).await?,
            missing: false,
        };

        Ok(ProjectOutcome::new(&project.name, OutcomeKind::Done)
            .with_messages(rec.into_messages())
            .with_data(OutcomeData::Status(status)))
    }
}
