use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::domain::value_objects::git_ref::GitRef;
use crate::domain::value_objects::protocol::Protocol;

/// Implicit group every project belongs to unless tagged `notdefault`.
pub const ALL_GROUP: &str = "all";
pub const NOT_DEFAULT_GROUP: &str = "notdefault";

/// Fallbacks used when no scope sets a value.
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_UPSTREAM_REMOTE: &str = "upstream";
pub const DEFAULT_BRANCH: &str = "master";

/// 解決済みのGit設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedGitSettings {
    pub submodules: bool,
    pub recursive: bool,
    pub lfs: bool,
    /// 0 means a full clone.
    pub depth: u32,
    pub config: BTreeMap<String, String>,
}

/// 解決済みのUpstream（フォーク元）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUpstream {
    pub name: String,
    pub remote: String,
    pub url: String,
    pub source: String,
    pub protocol: Protocol,
    pub git_ref: GitRef,
}

/// エンジンが扱う、全てのデフォルトを適用済みのプロジェクト
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedProject {
    pub name: String,
    /// ワークスペースルートからの相対パス
    pub relative_path: PathBuf,
    pub path: PathBuf,
    pub remote: String,
    pub url: String,
    pub source: String,
    pub protocol: Protocol,
    pub git_ref: GitRef,
    pub git: ResolvedGitSettings,
    pub upstream: Option<ResolvedUpstream>,
    pub groups: BTreeSet<String>,
    pub timestamp_author: Option<String>,
}

impl ResolvedProject {
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.as_branch()
    }

    pub fn is_default(&self) -> bool {
        self.groups.contains(ALL_GROUP)
    }

    /// Whether any tag in `filters` names this project; empty filters mean `all`.
    pub fn matches_any<S: AsRef<str>>(&self, filters: &[S]) -> bool {
        if filters.is_empty() {
            return self.is_default();
        }
        filters.iter().any(|f| self.groups.contains(f.as_ref()))
    }

    pub fn is_fork(&self) -> bool {
        self.upstream.is_some()
    }

    pub fn relative_display(&self) -> String {
        self.relative_path.display().to_string()
    }

    /// Environment exported to `forall` commands.
    pub fn env_vars(&self, workspace_root: &std::path::Path) -> Vec<(String, String)> {
        let mut vars = vec![
            ("DROVER_PATH".to_string(), workspace_root.display().to_string()),
            ("PROJECT_NAME".to_string(), self.name.clone()),
            ("PROJECT_PATH".to_string(), self.relative_display()),
            ("PROJECT_REMOTE".to_string(), self.remote.clone()),
            ("PROJECT_REF".to_string(), self.git_ref.full_ref()),
        ];
        if let Some(upstream) = &self.upstream {
            vars.push(("UPSTREAM_NAME".to_string(), upstream.name.clone()));
            vars.push(("UPSTREAM_REMOTE".to_string(), upstream.remote.clone()));
            vars.push(("UPSTREAM_REF".to_string(), upstream.git_ref.full_ref()));
        }
        vars
    }
}
