use std::path::PathBuf;
use thiserror::Error;

/// Process exit statuses, one per error category, so scripts can tell them apart.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const MANIFEST: i32 = 3;
    pub const SOURCE: i32 = 4;
    pub const GIT_OPERATION: i32 = 5;
    pub const COMMAND: i32 = 6;
    pub const PARALLEL_BATCH: i32 = 7;
    pub const WORKSPACE: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Error, Debug)]
pub enum DroverError {
    #[error("Manifest error: {message}")]
    ManifestError {
        message: String,
        file_path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Source error: {message}")]
    SourceError {
        message: String,
        source_name: Option<String>,
    },

    #[error("Git operation failed{}: {message}", project.as_ref().map(|p| format!(" for '{}'", p)).unwrap_or_default())]
    GitOperationError {
        message: String,
        project: Option<String>,
        command: Option<String>,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("Batch failed at '{project}' ({completed} of {total} tasks finished): {source}")]
    ParallelBatchError {
        project: String,
        completed: usize,
        total: usize,
        #[source]
        source: Box<DroverError>,
    },

    #[error("Operation interrupted")]
    Interrupted,

    #[error("File system operation failed: {message}")]
    FileSystemError {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Workspace error: {message}")]
    WorkspaceError {
        message: String,
        workspace_path: Option<PathBuf>,
    },

    #[error("Validation error: {field} - {message}")]
    ValidationError {
        field: String,
        message: String,
        value: Option<String>,
    },

    #[error("Serialization error: {message}")]
    SerializationError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Command '{command}' failed{}: {message}", exit_code.map(|c| format!(" with exit code {}", c)).unwrap_or_default())]
    CommandError {
        message: String,
        command: String,
        exit_code: Option<i32>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DroverError {
    pub fn manifest_error(message: impl Into<String>, file_path: Option<PathBuf>) -> Self {
        Self::ManifestError {
            message: message.into(),
            file_path,
            source: None,
        }
    }

    pub fn manifest_error_with_source(
        message: impl Into<String>,
        file_path: Option<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ManifestError {
            message: message.into(),
            file_path,
            source: Some(Box::new(source)),
        }
    }

    pub fn source_error(message: impl Into<String>, source_name: Option<String>) -> Self {
        Self::SourceError {
            message: message.into(),
            source_name,
        }
    }

    pub fn git_error(message: impl Into<String>) -> Self {
        Self::GitOperationError {
            message: message.into(),
            project: None,
            command: None,
            exit_code: None,
            stderr: None,
        }
    }

    pub fn git_command_failed(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        let command = command.into();
        let stderr = stderr.into();
        let message = if stderr.trim().is_empty() {
            format!("'{}' exited unsuccessfully", command)
        } else {
            format!("'{}': {}", command, stderr.trim())
        };
        Self::GitOperationError {
            message,
            project: None,
            command: Some(command),
            exit_code,
            stderr: Some(stderr),
        }
    }

    /// Attach the project name to a git failure; other variants pass through.
    pub fn for_project(self, name: &str) -> Self {
        match self {
            Self::GitOperationError {
                message,
                project: None,
                command,
                exit_code,
                stderr,
            } => Self::GitOperationError {
                message,
                project: Some(name.to_string()),
                command,
                exit_code,
                stderr,
            },
            other => other,
        }
    }

    pub fn parallel_batch_error(
        project: impl Into<String>,
        completed: usize,
        total: usize,
        source: DroverError,
    ) -> Self {
        Self::ParallelBatchError {
            project: project.into(),
            completed,
            total,
            source: Box::new(source),
        }
    }

    pub fn filesystem_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn filesystem_error_with_source(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn workspace_error(message: impl Into<String>, workspace_path: Option<PathBuf>) -> Self {
        Self::WorkspaceError {
            message: message.into(),
            workspace_path,
        }
    }

    pub fn validation_error(
        field: impl Into<String>,
        message: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
            value,
        }
    }

    pub fn serialization_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn command_error(
        message: impl Into<String>,
        command: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandError {
            message: message.into(),
            command: command.into(),
            exit_code,
            source: None,
        }
    }

    pub fn command_error_with_source(
        message: impl Into<String>,
        command: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::CommandError {
            message: message.into(),
            command: command.into(),
            exit_code: None,
            source: Some(source),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InternalError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Exit status used by the binary for this error's category.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ManifestError { .. } => exit_codes::MANIFEST,
            Self::SourceError { .. } => exit_codes::SOURCE,
            Self::GitOperationError { .. } => exit_codes::GIT_OPERATION,
            Self::ParallelBatchError { .. } => exit_codes::PARALLEL_BATCH,
            Self::Interrupted => exit_codes::INTERRUPTED,
            Self::ConfigError { .. } | Self::ValidationError { .. } => exit_codes::CONFIG,
            Self::WorkspaceError { .. } => exit_codes::WORKSPACE,
            Self::CommandError { .. } => exit_codes::COMMAND,
            Self::FileSystemError { .. }
            | Self::SerializationError { .. }
            | Self::InternalError { .. } => exit_codes::GENERAL,
        }
    }

    /// Whether the error was raised while loading the manifest, before any git call.
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, Self::ManifestError { .. } | Self::SourceError { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Interrupted => true,
            Self::ParallelBatchError { source, .. } => source.is_interrupted(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for DroverError {
    fn from(error: std::io::Error) -> Self {
        Self::filesystem_error_with_source("File system operation failed", None, error)
    }
}

impl From<serde_yaml::Error> for DroverError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::serialization_error_with_source("YAML serialization failed", error)
    }
}

impl From<serde_json::Error> for DroverError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization_error_with_source("JSON serialization failed", error)
    }
}

impl From<validator::ValidationErrors> for DroverError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::manifest_error_with_source("Manifest failed validation", None, errors)
    }
}

impl From<tokio::task::JoinError> for DroverError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_cancelled() {
            Self::Interrupted
        } else {
            Self::internal_error_with_source("Worker task panicked", error)
        }
    }
}
