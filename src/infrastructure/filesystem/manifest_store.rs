use std::path::{Path, PathBuf};
use tokio::fs as async_fs;

use crate::application::services::manifest_service::ManifestService;
use crate::common::error::DroverError;
use crate::common::result::{DroverResult, ResultExt};
use crate::domain::entities::manifest::Manifest;

/// A manifest read from disk, with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    pub path: PathBuf,
}

/// マニフェストファイルの読み書き
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestStore;

impl ManifestStore {
    pub fn new() -> Self {
        Self
    }

    /// Read and parse manifest from YAML file
    pub async fn read_manifest<P: AsRef<Path>>(&self, manifest_path: P) -> DroverResult<LoadedManifest> {
        let manifest_path = manifest_path.as_ref();

        if !manifest_path.exists() {
            return Err(DroverError::manifest_error(
                format!("manifest file not found: {}", manifest_path.display()),
                Some(manifest_path.to_path_buf()),
            ));
        }

        let bytes = async_fs::read(manifest_path)
            .await
            .with_filesystem_error("failed to read manifest", Some(manifest_path.to_path_buf()))?;

        let manifest = ManifestService::parse(&bytes).map_err(|e| match e {
            DroverError::ManifestError { message, source, .. } => DroverError::ManifestError {
                message,
                file_path: Some(manifest_path.to_path_buf()),
                source,
            },
            other => other,
        })?;

        Ok(LoadedManifest {
            manifest,
            path: manifest_path.to_path_buf(),
        })
    }

    /// Write manifest to YAML file, creating parent directories.
    ///
    /// Refuses to replace an existing file unless `overwrite` is set.
    pub async fn write_manifest<P: AsRef<Path>>(
        &self,
        manifest_path: P,
        manifest: &Manifest,
        overwrite: bool,
    ) -> DroverResult<()> {
        let manifest_path = manifest_path.as_ref();

        if !overwrite && manifest_path.exists() {
            return Err(DroverError::filesystem_error(
                format!("{} already exists", manifest_path.display()),
                Some(manifest_path.to_path_buf()),
            ));
        }

        let yaml_content = ManifestService::to_yaml(manifest)?;

        if let Some(parent) = manifest_path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .with_filesystem_error("failed to create directory", Some(parent.to_path_buf()))?;
        }

        async_fs::write(manifest_path, yaml_content)
            .await
            .with_filesystem_error("failed to write manifest", Some(manifest_path.to_path_buf()))?;

        tracing::debug!("wrote manifest {}", manifest_path.display());
        Ok(())
    }

    pub fn manifest_exists<P: AsRef<Path>>(&self, manifest_path: P) -> bool {
        manifest_path.as_ref().is_file()
    }
}
