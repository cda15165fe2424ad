use crate::common::error::DroverError;

/// drover全体で使用するResult型のエイリアス
///
/// # Examples
///
/// ```
/// use drover::common::result::DroverResult;
/// use drover::common::error::DroverError;
///
/// fn resolve() -> DroverResult<String> {
///     Ok("master".to_string())
/// }
///
/// fn fail() -> DroverResult<()> {
///     Err(DroverError::internal_error("Something went wrong"))
/// }
/// ```
pub type DroverResult<T> = Result<T, DroverError>;

/// OptionをDroverResultに変換するためのヘルパー
pub trait OptionExt<T> {
    /// Noneの場合は指定したエラーを返す
    fn ok_or_drover(self, error: DroverError) -> DroverResult<T>;

    /// Noneの場合はInternalErrorを返す
    fn ok_or_internal_error(self, message: impl Into<String>) -> DroverResult<T>;

    /// Noneの場合はManifestErrorを返す
    ///
    /// ```
    /// use drover::common::result::{DroverResult, OptionExt};
    ///
    /// let remote: Option<String> = None;
    /// let result: DroverResult<String> = remote.ok_or_manifest_error("project has no remote");
    /// assert!(result.is_err());
    /// ```
    fn ok_or_manifest_error(self, message: impl Into<String>) -> DroverResult<T>;

    /// Noneの場合はValidationErrorを返す
    fn ok_or_validation_error(
        self,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> DroverResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_drover(self, error: DroverError) -> DroverResult<T> {
        self.ok_or(error)
    }

    fn ok_or_internal_error(self, message: impl Into<String>) -> DroverResult<T> {
        self.ok_or_else(|| DroverError::internal_error(message))
    }

    fn ok_or_manifest_error(self, message: impl Into<String>) -> DroverResult<T> {
        self.ok_or_else(|| DroverError::manifest_error(message, None))
    }

    fn ok_or_validation_error(
        self,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> DroverResult<T> {
        self.ok_or_else(|| DroverError::validation_error(field, message, None))
    }
}

/// 標準のResult型をDroverResultに変換するためのヘルパー
pub trait ResultExt<T, E> {
    fn map_drover_err<F>(self, f: F) -> DroverResult<T>
    where
        F: FnOnce(E) -> DroverError;

    fn with_internal_error(self, message: impl Into<String>) -> DroverResult<T>
    where
        E: std::error::Error + Send + Sync + 'static;

    /// ファイルシステムエラーとして変換
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<std::path::PathBuf>,
    ) -> DroverResult<T>
    where
        E: Into<std::io::Error>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn map_drover_err<F>(self, f: F) -> DroverResult<T>
    where
        F: FnOnce(E) -> DroverError,
    {
        self.map_err(f)
    }

    fn with_internal_error(self, message: impl Into<String>) -> DroverResult<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.map_err(|e| DroverError::internal_error_with_source(message, e))
    }

    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<std::path::PathBuf>,
    ) -> DroverResult<T>
    where
        E: Into<std::io::Error>,
    {
        self.map_err(|e| DroverError::filesystem_error_with_source(message, path, e.into()))
    }
}

/// DroverResult同士を連鎖させるためのヘルパー
pub trait DroverResultExt<T> {
    /// git失敗にプロジェクト名を付与する
    fn for_project(self, name: &str) -> DroverResult<T>;
}

impl<T> DroverResultExt<T> for DroverResult<T> {
    fn for_project(self, name: &str) -> DroverResult<T> {
        self.map_err(|e| e.for_project(name))
    }
}
