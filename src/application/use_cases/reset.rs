//! reset: discard local history and match the remote ref.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::application::operation::{OutcomeKind, ProjectOperation, ProjectOutcome};
use crate::application::services::reconciler::Reconciler;
use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::domain::value_objects::git_ref::GitRef;
use crate::infrastructure::git::operations::HistoryQuery;
use crate::infrastructure::git::GitOperations;

/// reset実行時のオプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetOptions {
    /// Reset to the newest commit before this point in time instead of the
    /// tip of the ref.
    pub timestamp: Option<String>,
    /// Only consider commits by this author; falls back to the project's
    /// `timestamp_author`.
    pub timestamp_author: Option<String>,
    pub depth: Option<u32>,
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC) and `YYYY-MM-DD` (UTC midnight).
pub fn parse_timestamp(value: &str) -> DroverResult<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive).into());
    }
    if let Some(naive) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&naive).into());
    }
    Err(DroverError::validation_error(
        "timestamp",
        "expected an ISO-8601 date or RFC 3339 timestamp",
        Some(value.to_string()),
    ))
}

#[derive(Debug, Clone, Default)]
pub struct Reset {
    options: ResetOptions,
    before: Option<DateTime<FixedOffset>>,
}

impl Reset {
    pub fn new(options: ResetOptions) -> DroverResult<Self> {
        let before = options.timestamp.as_deref().map(parse_timestamp).transpose()?;
        Ok(Self { options, before })
    }

    async fn reset_to_timestamp(
        &self,
        git: &dyn GitOperations,
        rec: &mut Reconciler<'_>,
        project: &ResolvedProject,
        before: &DateTime<FixedOffset>,
    ) -> DroverResult<()> {
        let reference = match &project.git_ref {
            GitRef::Branch(branch) => format!("{}/{}", project.remote, branch),
            other => other.checkout_target(),
        };
        let query = HistoryQuery {
            reference: reference.clone(),
            before: before.to_rfc3339(),
            author: self
                .options
                .timestamp_author
                .clone()
                .or_else(|| project.timestamp_author.clone()),
        };

        let sha = git
            .commit_before(&project.path, &query)
            .await?
            .ok_or_else(|| {
                DroverError::git_error(format!("no commit on {} before {}", reference, query.before))
            })?;
        git.checkout(&project.path, &sha).await?;
        rec.note(format!("checked out {} ({} before {})", &sha[..7.min(sha.len())], reference, query.before));
        Ok(())
    }

    async fn reset_branch(
        &self,
        git: &dyn GitOperations,
        rec: &mut Reconciler<'_>,
        project: &ResolvedProject,
        branch: &str,
    ) -> DroverResult<()> {
        let path = &project.path;
        if !git.has_local_branch(path, branch).await?
            && git.has_remote_branch(path, &project.remote, branch).await?
        {
            git.create_tracking_branch(path, branch, &project.remote).await?;
            rec.note(format!("created branch '{}' tracking {}/{}", branch, project.remote, branch));
        }

        let tracking = git.tracking_branch(path, branch).await?.ok_or_else(|| {
            DroverError::git_error(format!("branch '{}' has no tracking branch to reset to", branch))
        })?;
        rec.checkout_branch(branch).await?;
        git.reset_hard(path, &tracking).await
    }
}

#[async_trait]
impl ProjectOperation for Reset {
    fn name(&self) -> &'static str {
        "reset"
    }

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome> {
        if !git.is_repository(&project.path).await {
            return Ok(ProjectOutcome::skipped(&project.name, "not cloned"));
        }

        let depth = self.options.depth.unwrap_or(project.git.depth);
        let mut rec = Reconciler::new(git, project);
        rec.ensure_remote(&project.remote, &project.url).await?;
        rec.fetch(&project.remote, depth).await?;

        match (&self.before, &project.git_ref) {
            (Some(before), _) => self.reset_to_timestamp(git, &mut rec, project, before).await?,
            (None, GitRef::Branch(branch)) => self.reset_branch(git, &mut rec, project, branch).await?,
            (None, detached) => rec.checkout_detached(detached).await?,
        }

        if project.git.submodules && project.git.recursive {
            git.update_submodules(&project.path, true, depth).await?;
            git.submodule_foreach(&project.path, "git reset --hard", true).await?;
        }

        Ok(ProjectOutcome::new(&project.name, OutcomeKind::Done).with_messages(rec.into_messages()))
    }
}
