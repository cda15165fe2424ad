//! Per-workspace settings in `.drover/config.yml`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs as async_fs;
use validator::Validate;

use crate::common::error::DroverError;
use crate::common::result::{DroverResult, ResultExt};
use crate::domain::entities::workspace::Workspace;
use crate::domain::value_objects::protocol::Protocol;

/// ワークスペース設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    /// 並列ジョブ数
    #[validate(range(min = 1, max = 256))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// herdでpullの代わりにrebaseする
    #[serde(default)]
    pub rebase: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    /// 既定のプロジェクト／グループフィルタ
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
}

/// Keys accepted by `drover config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SettingKey {
    Jobs,
    Rebase,
    Protocol,
    Projects,
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingKey::Jobs => "jobs",
            SettingKey::Rebase => "rebase",
            SettingKey::Protocol => "protocol",
            SettingKey::Projects => "projects",
        };
        f.write_str(name)
    }
}

impl WorkspaceSettings {
    pub fn get(&self, key: SettingKey) -> Option<String> {
        match key {
            SettingKey::Jobs => self.jobs.map(|j| j.to_string()),
            SettingKey::Rebase => Some(self.rebase.to_string()),
            SettingKey::Protocol => self.protocol.map(|p| p.to_string()),
            SettingKey::Projects => {
                (!self.projects.is_empty()).then(|| self.projects.join(" "))
            }
        }
    }

    pub fn set(&mut self, key: SettingKey, values: &[String]) -> DroverResult<()> {
        let invalid = |value: &str, message: String| {
            DroverError::validation_error(key.to_string(), message, Some(value.to_string()))
        };

        match key {
            SettingKey::Jobs => {
                let value = single_value(key, values)?;
                let jobs = value
                    .parse::<usize>()
                    .map_err(|e| invalid(value, e.to_string()))?;
                self.jobs = Some(jobs);
            }
            SettingKey::Rebase => {
                let value = single_value(key, values)?;
                self.rebase = value
                    .parse::<bool>()
                    .map_err(|e| invalid(value, e.to_string()))?;
            }
            SettingKey::Protocol => {
                let value = single_value(key, values)?;
                self.protocol = Some(
                    Protocol::from_str(value).map_err(|e| invalid(value, e.to_string()))?,
                );
            }
            SettingKey::Projects => {
                if values.is_empty() {
                    return Err(invalid("", "expected at least one project or group".to_string()));
                }
                self.projects = values.to_vec();
            }
        }
        self.check()
    }

    /// Reset one key, or everything when `key` is `None`.
    pub fn clear(&mut self, key: Option<SettingKey>) {
        match key {
            None => *self = Self::default(),
            Some(SettingKey::Jobs) => self.jobs = None,
            Some(SettingKey::Rebase) => self.rebase = false,
            Some(SettingKey::Protocol) => self.protocol = None,
            Some(SettingKey::Projects) => self.projects.clear(),
        }
    }

    pub fn check(&self) -> DroverResult<()> {
        self.validate()
            .map_err(|e| DroverError::config_error_with_source(format!("invalid settings: {}", e), e))
    }
}

fn single_value(key: SettingKey, values: &[String]) -> DroverResult<&str> {
    match values {
        [value] => Ok(value.as_str()),
        _ => Err(DroverError::validation_error(
            key.to_string(),
            "expected exactly one value",
            Some(values.join(" ")),
        )),
    }
}

/// 設定ファイルの読み書き
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_workspace(workspace: &Workspace) -> Self {
        Self::new(workspace.config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file yields the defaults.
    pub async fn load(&self) -> DroverResult<WorkspaceSettings> {
        if !self.path.exists() {
            return Ok(WorkspaceSettings::default());
        }
        let content = async_fs::read_to_string(&self.path)
            .await
            .with_filesystem_error("failed to read settings", Some(self.path.clone()))?;
        if content.trim().is_empty() {
            return Ok(WorkspaceSettings::default());
        }

        let settings: WorkspaceSettings = serde_yaml::from_str(&content).map_err(|e| {
            DroverError::config_error_with_source(
                format!("invalid settings file {}", self.path.display()),
                e,
            )
        })?;
        settings.check()?;
        Ok(settings)
    }

    pub async fn save(&self, settings: &WorkspaceSettings) -> DroverResult<()> {
        settings.check()?;
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .with_filesystem_error("failed to create directory", Some(parent.to_path_buf()))?;
        }
        let yaml = serde_yaml::to_string(settings)?;
        async_fs::write(&self.path, yaml)
            .await
            .with_filesystem_error("failed to write settings", Some(self.path.clone()))
    }
}
