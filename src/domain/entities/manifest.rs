use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::value_objects::git_ref::{GitRef, GitRefError};
use crate::domain::value_objects::protocol::Protocol;

/// マニフェスト全体（パース直後のツリー）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceEntry>,

    /// セクション（`groups` も同義）
    #[serde(default, alias = "groups", skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,

    /// フラットなプロジェクトリスト
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<ProjectEntry>>,
}

impl Manifest {
    /// 全プロジェクト数（ネストしたセクションを含む）
    pub fn project_count(&self) -> usize {
        let mut count = self.projects.as_ref().map(Vec::len).unwrap_or(0);
        if let Some(sections) = &self.sections {
            count += sections.iter().map(Section::project_count).sum::<usize>();
        }
        count
    }

    /// Visit every project entry depth-first, in manifest order.
    pub fn for_each_project_mut<F>(&mut self, mut f: F) -> DroverResult<()>
    where
        F: FnMut(&mut ProjectEntry) -> DroverResult<()>,
    {
        if let Some(projects) = &mut self.projects {
            for project in projects {
                f(project)?;
            }
        }
        if let Some(sections) = &mut self.sections {
            for section in sections {
                section.for_each_project_mut(&mut f)?;
            }
        }
        Ok(())
    }
}

/// ソース定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
}

/// `git.config` の値（スカラーのみ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Git関連の設定。各フィールドは独立にカスケードする
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submodules: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lfs: Option<bool>,

    /// 0 means a full clone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, ConfigValue>>,
}

/// Upstreamのデフォルト設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Any scope that may name a ref with `branch`, `tag`, `commit` or `ref`.
pub trait RefScope {
    fn branch(&self) -> Option<&str>;
    fn tag(&self) -> Option<&str>;
    fn commit(&self) -> Option<&str>;
    fn legacy_ref(&self) -> Option<&str>;

    fn ref_count(&self) -> usize {
        [self.branch(), self.tag(), self.commit(), self.legacy_ref()]
            .iter()
            .filter(|r| r.is_some())
            .count()
    }

    /// The ref this scope sets, by branch > tag > commit > ref.
    fn scoped_ref(&self, scope: &str) -> DroverResult<Option<GitRef>> {
        let invalid = |e: GitRefError| DroverError::manifest_error(format!("{}: {}", scope, e), None);

        if let Some(branch) = self.branch() {
            return GitRef::branch(branch).map(Some).map_err(invalid);
        }
        if let Some(tag) = self.tag() {
            return GitRef::tag(tag).map(Some).map_err(invalid);
        }
        if let Some(commit) = self.commit() {
            return GitRef::commit(commit).map(Some).map_err(invalid);
        }
        if let Some(full) = self.legacy_ref() {
            return GitRef::parse(full).map(Some).map_err(invalid);
        }
        Ok(None)
    }
}

macro_rules! impl_ref_scope {
    ($ty:ty) => {
        impl RefScope for $ty {
            fn branch(&self) -> Option<&str> {
                self.branch.as_deref()
            }
            fn tag(&self) -> Option<&str> {
                self.tag.as_deref()
            }
            fn commit(&self) -> Option<&str> {
                self.commit.as_deref()
            }
            fn legacy_ref(&self) -> Option<&str> {
                self.git_ref.as_deref()
            }
        }
    };
}

/// グローバル／セクションのデフォルト設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Only honoured in the top-level defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamDefaults>,
}

impl_ref_scope!(Defaults);

/// セクション（グループ）の定義
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Section {
    #[validate(length(min = 1))]
    pub name: String,

    /// 含まれるプロジェクトのパス接頭辞
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// セクションに付与するタグ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectEntry>,
}

impl Section {
    fn project_count(&self) -> usize {
        self.projects.len()
            + self
                .sections
                .as_ref()
                .map(|s| s.iter().map(Section::project_count).sum::<usize>())
                .unwrap_or(0)
    }

    fn for_each_project_mut<F>(&mut self, f: &mut F) -> DroverResult<()>
    where
        F: FnMut(&mut ProjectEntry) -> DroverResult<()>,
    {
        for project in &mut self.projects {
            f(project)?;
        }
        if let Some(sections) = &mut self.sections {
            for section in sections {
                section.for_each_project_mut(f)?;
            }
        }
        Ok(())
    }
}

/// マニフェストのプロジェクト定義
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProjectEntry {
    /// クローン識別子（例: `jrgoodle/kit`）
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamEntry>,
}

impl_ref_scope!(ProjectEntry);

impl ProjectEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Replace whatever ref the project names with a pinned commit.
    pub fn pin_commit(&mut self, sha: impl Into<String>) {
        self.branch = None;
        self.tag = None;
        self.git_ref = None;
        self.commit = Some(sha.into());
    }
}

/// フォーク元リポジトリの定義
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpstreamEntry {
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
}

impl_ref_scope!(UpstreamEntry);
