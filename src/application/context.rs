//! Everything one invocation works against: the workspace, its manifest
//! resolved once, its settings, the git backend and the root cancellation
//! token.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::application::operation::{ProjectOperation, ProjectOutcome};
use crate::application::services::manifest_service::{ManifestService, ResolveOptions};
use crate::application::services::parallel_runner::{ParallelRunner, ProgressReporter};
use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::manifest::Manifest;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::domain::entities::source::SourceRegistry;
use crate::domain::entities::workspace::Workspace;
use crate::domain::value_objects::protocol::Protocol;
use crate::infrastructure::filesystem::config_store::{ConfigStore, WorkspaceSettings};
use crate::infrastructure::filesystem::manifest_store::ManifestStore;
use crate::infrastructure::git::{GitCli, GitOperations};

/// 実行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Serial,
    /// `None` uses one worker per CPU.
    Parallel { jobs: Option<usize> },
}

pub struct WorkspaceContext {
    pub workspace: Workspace,
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    pub registry: SourceRegistry,
    /// Every project, manifest order.
    pub projects: Vec<ResolvedProject>,
    pub settings: WorkspaceSettings,
    pub cancel: CancellationToken,
    git: Arc<dyn GitOperations>,
}

impl std::fmt::Debug for WorkspaceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceContext")
            .field("workspace", &self.workspace)
            .field("manifest_path", &self.manifest_path)
            .field("projects", &self.projects.len())
            .finish_non_exhaustive()
    }
}

impl WorkspaceContext {
    /// Find the workspace above `start`, read its settings and manifest and
    /// resolve every project.
    pub async fn load(
        start: &Path,
        protocol: Option<Protocol>,
        cancel: CancellationToken,
    ) -> DroverResult<Self> {
        let root = Workspace::discover_root(start).ok_or_else(|| {
            DroverError::workspace_error(
                format!("no drover.yml found in {} or any parent", start.display()),
                Some(start.to_path_buf()),
            )
        })?;
        let workspace = Workspace::new(root);
        let settings = ConfigStore::for_workspace(&workspace).load().await?;
        let loaded = ManifestStore::new()
            .read_manifest(workspace.manifest_file_path())
            .await?;

        Self::from_manifest(workspace, loaded.manifest, loaded.path, settings, protocol, cancel)
    }

    /// Protocol precedence: `protocol` argument, then settings, then the
    /// manifest's own default.
    pub fn from_manifest(
        workspace: Workspace,
        manifest: Manifest,
        manifest_path: PathBuf,
        settings: WorkspaceSettings,
        protocol: Option<Protocol>,
        cancel: CancellationToken,
    ) -> DroverResult<Self> {
        let options = ResolveOptions::new(&workspace.root_path)
            .with_protocol(protocol.or(settings.protocol));
        let resolved = ManifestService::resolve(&manifest, &options)?;
        let git: Arc<dyn GitOperations> = Arc::new(GitCli::new(cancel.clone()));

        Ok(Self {
            workspace,
            manifest,
            manifest_path,
            registry: resolved.registry,
            projects: resolved.projects,
            settings,
            cancel,
            git,
        })
    }

    /// Swap the git backend, mainly for tests.
    pub fn with_git(mut self, git: Arc<dyn GitOperations>) -> Self {
        self.git = git;
        self
    }

    pub fn git(&self) -> Arc<dyn GitOperations> {
        Arc::clone(&self.git)
    }

    pub fn root(&self) -> &Path {
        &self.workspace.root_path
    }

    /// Projects matching `filters`, or the configured default filter when
    /// none are given.
    pub fn select(&self, filters: &[String]) -> DroverResult<Vec<ResolvedProject>> {
        let filters = if filters.is_empty() {
            self.settings.projects.as_slice()
        } else {
            filters
        };
        ManifestService::select(&self.projects, filters)
    }

    /// Run `operation` over `projects`.
    ///
    /// Serial mode returns the first error unchanged; parallel mode returns
    /// [`DroverError::ParallelBatchError`] or [`DroverError::Interrupted`].
    pub async fn execute(
        &self,
        operation: Arc<dyn ProjectOperation>,
        projects: Vec<ResolvedProject>,
        mode: ExecutionMode,
        progress: Option<ProgressReporter>,
    ) -> DroverResult<Vec<ProjectOutcome>> {
        match mode {
            ExecutionMode::Serial => {
                ParallelRunner::run_serial(operation.as_ref(), self.git.as_ref(), &projects, &self.cancel)
                    .await
            }
            ExecutionMode::Parallel { jobs } => {
                let mut runner = ParallelRunner::new(jobs, self.cancel.clone());
                if let Some(progress) = progress {
                    runner = runner.with_progress(progress);
                }
                runner.run(operation, self.git(), projects).await.into_result()
            }
        }
    }
}
