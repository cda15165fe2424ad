//! Test fixtures for creating test data
//!
//! Manifests used across the integration tests and helpers that turn them
//! into a workspace on disk or a ready [`WorkspaceContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use drover::application::context::WorkspaceContext;
use drover::application::services::manifest_service::ManifestService;
use drover::domain::entities::workspace::Workspace;
use drover::infrastructure::filesystem::config_store::WorkspaceSettings;
use drover::infrastructure::git::GitOperations;

/// Two sections, a tag pin, a nested path and a fork.
pub const CATS_MANIFEST: &str = r#"
name: cats
defaults:
  branch: main
  protocol: ssh
sections:
  - name: cats
    groups: [pets]
    projects:
      - name: jrgoodle/kit
        tag: v1.0
      - name: jrgoodle/kishka
        path: black-cats/kishka
      - name: jrgoodle/sasha
        upstream:
          name: JrGoodle/sasha
  - name: dogs
    defaults:
      branch: develop
    projects:
      - name: jrgoodle/rex
      - name: jrgoodle/buddy
        groups: [notdefault]
"#;

/// A manifest whose projects all sit on `main`.
pub fn flat_manifest(names: &[&str]) -> String {
    let mut manifest = String::from("name: flat\ndefaults:\n  branch: main\nprojects:\n");
    for name in names {
        manifest.push_str(&format!("  - name: {}\n", name));
    }
    manifest
}

/// Temporary workspace with `drover.yml` written at its root.
pub fn workspace_with_manifest(manifest: &str) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("drover.yml"), manifest).unwrap();
    temp_dir
}

/// Context over `manifest` rooted at `root`, talking to `git`.
pub fn context_with_git(root: &Path, manifest: &str, git: Arc<dyn GitOperations>) -> WorkspaceContext {
    let manifest = ManifestService::parse_str(manifest).unwrap();
    WorkspaceContext::from_manifest(
        Workspace::new(root),
        manifest,
        root.join("drover.yml"),
        WorkspaceSettings::default(),
        None,
        CancellationToken::new(),
    )
    .unwrap()
    .with_git(git)
}

pub fn project_path(root: &Path, relative: &str) -> PathBuf {
    root.join(relative)
}
