use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const HEADS_PREFIX: &str = "refs/heads/";
const TAGS_PREFIX: &str = "refs/tags/";

/// Ref関連のエラー
#[derive(Debug, Error, PartialEq)]
pub enum GitRefError {
    #[error("Invalid ref '{0}': expected refs/heads/<branch>, refs/tags/<tag> or a 40 character commit sha")]
    InvalidRef(String),

    #[error("Invalid commit '{0}': expected 40 hexadecimal characters")]
    InvalidCommit(String),

    #[error("Empty {0} name")]
    EmptyName(&'static str),
}

/// 解決済みのref。ブランチ・タグ・コミットのいずれか一つ
///
/// Serialized as `{type: branch, name: main}` in status reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum GitRef {
    Branch(String),
    Tag(String),
    Commit(String),
}

impl GitRef {
    /// ブランチrefを作成（`refs/heads/` 接頭辞は取り除く）
    pub fn branch(name: impl AsRef<str>) -> Result<Self, GitRefError> {
        let name = name.as_ref().trim();
        let name = name.strip_prefix(HEADS_PREFIX).unwrap_or(name);
        if name.is_empty() {
            return Err(GitRefError::EmptyName("branch"));
        }
        Ok(GitRef::Branch(name.to_string()))
    }

    /// タグrefを作成（`refs/tags/` 接頭辞は取り除く）
    pub fn tag(name: impl AsRef<str>) -> Result<Self, GitRefError> {
        let name = name.as_ref().trim();
        let name = name.strip_prefix(TAGS_PREFIX).unwrap_or(name);
        if name.is_empty() {
            return Err(GitRefError::EmptyName("tag"));
        }
        Ok(GitRef::Tag(name.to_string()))
    }

    /// コミットrefを作成。40桁の16進数のみ受け付ける
    pub fn commit(sha: impl AsRef<str>) -> Result<Self, GitRefError> {
        let sha = sha.as_ref().trim();
        if !is_commit_sha(sha) {
            return Err(GitRefError::InvalidCommit(sha.to_string()));
        }
        Ok(GitRef::Commit(sha.to_lowercase()))
    }

    /// Parse a fully qualified ref string.
    ///
    /// ```
    /// use drover::domain::value_objects::git_ref::GitRef;
    ///
    /// assert!(GitRef::parse("refs/heads/main").is_ok());
    /// assert!(GitRef::parse("refs/tags/v1.0").is_ok());
    /// assert!(GitRef::parse("main").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, GitRefError> {
        let value = value.trim();
        if let Some(branch) = value.strip_prefix(HEADS_PREFIX) {
            return GitRef::branch(branch).map_err(|_| GitRefError::InvalidRef(value.to_string()));
        }
        if let Some(tag) = value.strip_prefix(TAGS_PREFIX) {
            return GitRef::tag(tag).map_err(|_| GitRefError::InvalidRef(value.to_string()));
        }
        if is_commit_sha(value) {
            return Ok(GitRef::Commit(value.to_lowercase()));
        }
        Err(GitRefError::InvalidRef(value.to_string()))
    }

    pub fn is_valid(value: &str) -> bool {
        GitRef::parse(value).is_ok()
    }

    /// Branch, tag or sha without any `refs/...` prefix.
    pub fn short_name(&self) -> &str {
        match self {
            GitRef::Branch(name) | GitRef::Tag(name) | GitRef::Commit(name) => name,
        }
    }

    /// `refs/heads/<b>`, `refs/tags/<t>`, or the bare sha.
    pub fn full_ref(&self) -> String {
        match self {
            GitRef::Branch(name) => format!("{}{}", HEADS_PREFIX, name),
            GitRef::Tag(name) => format!("{}{}", TAGS_PREFIX, name),
            GitRef::Commit(sha) => sha.clone(),
        }
    }

    /// Argument handed to `git checkout` to reach this ref.
    pub fn checkout_target(&self) -> String {
        match self {
            GitRef::Branch(name) => name.clone(),
            GitRef::Tag(_) => self.full_ref(),
            GitRef::Commit(sha) => sha.clone(),
        }
    }

    pub fn as_branch(&self) -> Option<&str> {
        match self {
            GitRef::Branch(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&str> {
        match self {
            GitRef::Tag(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, GitRef::Branch(_))
    }

    /// Tags and commits leave HEAD detached after checkout.
    pub fn is_detached(&self) -> bool {
        !self.is_branch()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GitRef::Branch(_) => "branch",
            GitRef::Tag(_) => "tag",
            GitRef::Commit(_) => "commit",
        }
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitRef::Commit(sha) => write!(f, "{}", &sha[..7.min(sha.len())]),
            GitRef::Branch(name) | GitRef::Tag(name) => write!(f, "{}", name),
        }
    }
}

pub fn is_commit_sha(value: &str) -> bool {
    value.len() == 40 && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_ref_validity_rule() {
        assert_eq!(GitRef::parse("refs/heads/main"), Ok(GitRef::Branch("main".into())));
        assert_eq!(GitRef::parse("refs/tags/v1.0"), Ok(GitRef::Tag("v1.0".into())));
        assert_eq!(GitRef::parse(SHA), Ok(GitRef::Commit(SHA.into())));

        assert!(!GitRef::is_valid("main"));
        assert!(!GitRef::is_valid(&SHA[..39]));
        assert!(!GitRef::is_valid("refs/heads/"));
        assert!(!GitRef::is_valid("refs/remotes/origin/main"));
        assert!(!GitRef::is_valid("0123456789abcdef0123456789abcdef0123456g"));
    }

    #[test]
    fn test_commit_is_normalized_to_lowercase() {
        let upper = SHA.to_uppercase();
        assert_eq!(GitRef::commit(&upper), Ok(GitRef::Commit(SHA.into())));
        assert!(GitRef::commit("abc123").is_err());
    }

    #[test]
    fn test_branch_and_tag_strip_prefixes() {
        assert_eq!(GitRef::branch("refs/heads/release"), Ok(GitRef::Branch("release".into())));
        assert_eq!(GitRef::tag("refs/tags/v2"), Ok(GitRef::Tag("v2".into())));
        assert!(GitRef::branch("  ").is_err());
    }

    #[test]
    fn test_checkout_target_and_display() {
        let branch = GitRef::Branch("main".into());
        let tag = GitRef::Tag("v1.0".into());
        let commit = GitRef::Commit(SHA.into());

        assert_eq!(branch.checkout_target(), "main");
        assert_eq!(tag.checkout_target(), "refs/tags/v1.0");
        assert_eq!(commit.checkout_target(), SHA);

        assert_eq!(commit.to_string(), "0123456");
        assert_eq!(tag.full_ref(), "refs/tags/v1.0");
        assert!(tag.is_detached());
        assert!(!branch.is_detached());
    }

    #[test]
    fn test_serde_is_adjacently_tagged() {
        let json = serde_json::to_string(&GitRef::Branch("main".into())).unwrap();
        assert_eq!(json, r#"{"type":"branch","name":"main"}"#);
        let parsed: GitRef = serde_json::from_str(r#"{"type":"tag","name":"v1.0"}"#).unwrap();
        assert_eq!(parsed, GitRef::Tag("v1.0".into()));
    }
}
