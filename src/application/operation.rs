//! The unit of work the orchestrator schedules: one operation applied to one
//! resolved project.

use async_trait::async_trait;
use serde::Serialize;

use crate::common::result::DroverResult;
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::GitOperations;

/// 1プロジェクトに対する処理結果の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Cloned,
    Updated,
    Skipped,
    Done,
}

/// Per-project status line data, rendered by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub name: String,
    pub path: String,
    /// Branch name, or a short sha when HEAD is detached.
    pub current_ref: Option<String>,
    pub detached: bool,
    pub tracking: Option<String>,
    /// The configured upstream no longer resolves, e.g. after a remote prune.
    pub upstream_gone: bool,
    pub ahead: usize,
    pub behind: usize,
    pub dirty: bool,
    pub missing: bool,
}

/// Extra data some operations hand back for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeData {
    Status(ProjectStatus),
    Branches {
        current: Option<String>,
        branches: Vec<String>,
    },
    Output {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },
}

/// 1プロジェクトに対する処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutcome {
    pub project: String,
    pub kind: OutcomeKind,
    /// Plain notices, no terminal formatting.
    pub messages: Vec<String>,
    pub data: Option<OutcomeData>,
}

impl ProjectOutcome {
    pub fn new(project: impl Into<String>, kind: OutcomeKind) -> Self {
        Self {
            project: project.into(),
            kind,
            messages: Vec::new(),
            data: None,
        }
    }

    pub fn skipped(project: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(project, OutcomeKind::Skipped).with_message(reason)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn with_messages(mut self, messages: impl IntoIterator<Item = String>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_data(mut self, data: OutcomeData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn status(&self) -> Option<&ProjectStatus> {
        match &self.data {
            Some(OutcomeData::Status(status)) => Some(status),
            _ => None,
        }
    }
}

/// プロジェクト単位の操作
///
/// Implementations hold their options and are shared read-only across
/// workers, so the same value runs against every selected project.
#[async_trait]
pub trait ProjectOperation: Send + Sync {
    /// Short verb used in progress output and logs.
    fn name(&self) -> &'static str;

    async fn run(&self, git: &dyn GitOperations, project: &ResolvedProject) -> DroverResult<ProjectOutcome>;
}
