//! `save`: pin every project of the manifest to the commit currently
//! checked out and write the result under `.drover/versions/<name>/`.

use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::common::error::DroverError;
use crate::common::result::{DroverResult, DroverResultExt, OptionExt};
use crate::domain::entities::manifest::Manifest;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::domain::entities::workspace::Workspace;
use crate::infrastructure::filesystem::manifest_store::ManifestStore;
use crate::infrastructure::git::GitOperations;

const RESERVED_VERSION: &str = "default";

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("static regex is valid"))
}

pub struct SnapshotService;

impl SnapshotService {
    pub fn validate_version(version: &str) -> DroverResult<()> {
        if version == RESERVED_VERSION {
            return Err(DroverError::validation_error(
                "version",
                format!("'{}' is reserved", RESERVED_VERSION),
                Some(version.to_string()),
            ));
        }
        if !version_regex().is_match(version) {
            return Err(DroverError::validation_error(
                "version",
                "use letters, digits, '.', '_' and '-' only",
                Some(version.to_string()),
            ));
        }
        Ok(())
    }

    /// Copy of `manifest` with each project pinned to its HEAD commit.
    ///
    /// `projects` must be the full resolution of `manifest`, in manifest
    /// order; every one of them has to be cloned.
    pub async fn capture(
        git: &dyn GitOperations,
        manifest: &Manifest,
        projects: &[ResolvedProject],
    ) -> DroverResult<Manifest> {
        if manifest.project_count() != projects.len() {
            return Err(DroverError::internal_error(format!(
                "manifest lists {} projects but {} were resolved",
                manifest.project_count(),
                projects.len()
            )));
        }

        let mut shas = Vec::with_capacity(projects.len());
        for project in projects {
            if !git.is_repository(&project.path).await {
                return Err(DroverError::workspace_error(
                    format!("project '{}' is not cloned; run herd first", project.name),
                    Some(project.path.clone()),
                ));
            }
            shas.push(git.rev_parse(&project.path, "HEAD").await.for_project(&project.name)?);
        }

        let mut snapshot = manifest.clone();
        let mut shas = shas.into_iter();
        snapshot.for_each_project_mut(|entry| {
            let sha = shas
                .next()
                .ok_or_internal_error("ran out of commits while pinning projects")?;
            entry.pin_commit(sha);
            Ok(())
        })?;
        Ok(snapshot)
    }

    pub async fn save(
        git: &dyn GitOperations,
        workspace: &Workspace,
        manifest: &Manifest,
        projects: &[ResolvedProject],
        version: &str,
    ) -> DroverResult<PathBuf> {
        Self::validate_version(version)?;
        let path = workspace.version_manifest_path(version);
        if path.exists() {
            return Err(DroverError::workspace_error(
                format!("version '{}' already exists", version),
                Some(path),
            ));
        }

        let snapshot = Self::capture(git, manifest, projects).await?;
        ManifestStore::new().write_manifest(&path, &snapshot, false).await?;
        tracing::info!("saved version '{}' to {}", version, path.display());
        Ok(path)
    }
}
