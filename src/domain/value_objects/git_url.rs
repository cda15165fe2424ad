use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

use super::protocol::Protocol;

/// ソースURL関連のエラー
#[derive(Debug, Error, PartialEq)]
pub enum GitUrlError {
    #[error("Empty source URL")]
    Empty,

    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid characters in URL: {0}")]
    InvalidCharacters(String),
}

/// How a source URL is spelled, which decides how project names are appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum UrlForm {
    /// `github.com`: the protocol picks ssh or https layout
    HostOnly(String),
    /// `https://git.example.com/mirrors`, `ssh://...`, `file:///srv/git`
    Scheme,
    /// `git@host:` or `git@host:group`
    ScpLike,
    /// `/srv/git`
    LocalPath,
}

/// ソースのURLを表す値オブジェクト
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceUrl {
    raw: String,
    form: UrlForm,
}

fn scp_regex() -> &'static Regex {
    static SCP: OnceLock<Regex> = OnceLock::new();
    SCP.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._-]+@[A-Za-z0-9.-]+:.*$").expect("static regex is valid")
    })
}

fn host_regex() -> &'static Regex {
    static HOST: OnceLock<Regex> = OnceLock::new();
    HOST.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?(:[0-9]+)?$")
            .expect("static regex is valid")
    })
}

impl SourceUrl {
    /// 新しいSourceUrlインスタンスを作成
    pub fn new(url: &str) -> Result<Self, GitUrlError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(GitUrlError::Empty);
        }
        if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(GitUrlError::InvalidCharacters(trimmed.to_string()));
        }

        let form = if trimmed.contains("://") {
            let parsed =
                Url::parse(trimmed).map_err(|_| GitUrlError::InvalidFormat(trimmed.to_string()))?;
            if !matches!(parsed.scheme(), "https" | "http" | "git" | "ssh" | "file") {
                return Err(GitUrlError::UnsupportedScheme(parsed.scheme().to_string()));
            }
            UrlForm::Scheme
        } else if scp_regex().is_match(trimmed) {
            UrlForm::ScpLike
        } else if Path::new(trimmed).is_absolute() {
            UrlForm::LocalPath
        } else if host_regex().is_match(trimmed) {
            UrlForm::HostOnly(trimmed.to_string())
        } else {
            return Err(GitUrlError::InvalidFormat(trimmed.to_string()));
        };

        Ok(Self {
            raw: trimmed.trim_end_matches('/').to_string(),
            form,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_host_only(&self) -> bool {
        matches!(self.form, UrlForm::HostOnly(_))
    }

    /// Remote URL for the repository `name` on this source.
    ///
    /// ```
    /// use drover::domain::value_objects::git_url::SourceUrl;
    /// use drover::domain::value_objects::protocol::Protocol;
    ///
    /// let github = SourceUrl::new("github.com").unwrap();
    /// assert_eq!(github.remote_url("jrgoodle/kit", Protocol::Ssh), "git@github.com:jrgoodle/kit.git");
    /// assert_eq!(github.remote_url("jrgoodle/kit", Protocol::Https), "https://github.com/jrgoodle/kit.git");
    /// ```
    pub fn remote_url(&self, name: &str, protocol: Protocol) -> String {
        let name = name.trim_matches('/');
        match &self.form {
            UrlForm::HostOnly(host) => match protocol {
                Protocol::Ssh => format!("git@{}:{}.git", host, name),
                Protocol::Https => format!("https://{}/{}.git", host, name),
            },
            UrlForm::ScpLike if self.raw.ends_with(':') => format!("{}{}", self.raw, name),
            UrlForm::Scheme | UrlForm::ScpLike | UrlForm::LocalPath => {
                format!("{}/{}", self.raw, name)
            }
        }
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<&str> for SourceUrl {
    type Error = GitUrlError;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        SourceUrl::new(url)
    }
}

impl Serialize for SourceUrl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for SourceUrl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SourceUrl::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Compare two remote URLs ignoring a trailing `.git` and slash.
pub fn same_remote(a: &str, b: &str) -> bool {
    fn norm(url: &str) -> &str {
        let url = url.trim().trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url)
    }
    norm(a) == norm(b)
}

/// Whether two remote URLs name the same repository, possibly over
/// different protocols (`git@host:a/b.git` and `https://host/a/b`).
pub fn same_repository(a: &str, b: &str) -> bool {
    fn key(url: &str) -> String {
        let url = url.trim().trim_end_matches('/');
        let url = url.strip_suffix(".git").unwrap_or(url);
        if url.contains("://") {
            return match Url::parse(url) {
                Ok(parsed) => match parsed.host_str() {
                    Some(host) => format!("{}/{}", host, parsed.path().trim_start_matches('/')),
                    None => parsed.path().to_string(),
                },
                Err(_) => url.to_string(),
            };
        }
        if Path::new(url).is_absolute() {
            return url.to_string();
        }
        match url.split_once(':') {
            Some((host, path)) => {
                let host = host.rsplit('@').next().unwrap_or(host);
                format!("{}/{}", host, path.trim_start_matches('/'))
            }
            None => url.to_string(),
        }
    }
    same_remote(a, b) || key(a) == key(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_only_formats_per_protocol() {
        let gitlab = SourceUrl::new("gitlab.com").unwrap();
        assert!(gitlab.is_host_only());
        assert_eq!(
            gitlab.remote_url("cats/kit", Protocol::Ssh),
            "git@gitlab.com:cats/kit.git"
        );
        assert_eq!(
            gitlab.remote_url("cats/kit", Protocol::Https),
            "https://gitlab.com/cats/kit.git"
        );
    }

    #[test]
    fn test_scheme_urls_join_name_as_given() {
        let mirror = SourceUrl::new("https://git.example.com/mirrors/").unwrap();
        assert_eq!(mirror.as_str(), "https://git.example.com/mirrors");
        assert_eq!(
            mirror.remote_url("cats/kit", Protocol::Ssh),
            "https://git.example.com/mirrors/cats/kit"
        );

        let local = SourceUrl::new("file:///srv/git").unwrap();
        assert_eq!(local.remote_url("kit.git", Protocol::Https), "file:///srv/git/kit.git");
    }

    #[test]
    fn test_scp_like_and_absolute_paths() {
        let scp = SourceUrl::new("git@git.example.com:").unwrap();
        assert_eq!(scp.remote_url("cats/kit.git", Protocol::Https), "git@git.example.com:cats/kit.git");

        let scp_group = SourceUrl::new("git@git.example.com:cats").unwrap();
        assert_eq!(scp_group.remote_url("kit", Protocol::Ssh), "git@git.example.com:cats/kit");

        let path = SourceUrl::new("/srv/git").unwrap();
        assert_eq!(path.remote_url("kit", Protocol::Ssh), "/srv/git/kit");
    }

    #[test]
    fn test_invalid_urls() {
        assert_eq!(SourceUrl::new("  "), Err(GitUrlError::Empty));
        assert!(matches!(
            SourceUrl::new("ftp://example.com/repo"),
            Err(GitUrlError::UnsupportedScheme(_))
        ));
        assert!(SourceUrl::new("not a url").is_err());
        assert!(SourceUrl::new("relative/path").is_err());
    }

    #[test]
    fn test_same_remote() {
        assert!(same_remote("git@github.com:a/b.git", "git@github.com:a/b"));
        assert!(same_remote("https://h/a/b/", "https://h/a/b.git"));
        assert!(!same_remote("https://h/a/b", "https://h/a/c"));
    }

    #[test]
    fn test_same_repository_across_protocols() {
        assert!(same_repository(
            "git@github.com:jrgoodle/kit.git",
            "https://github.com/jrgoodle/kit"
        ));
        assert!(same_repository("ssh://git@github.com/jrgoodle/kit.git", "git@github.com:jrgoodle/kit"));
        assert!(same_repository("file:///srv/remotes/kit", "/srv/remotes/kit"));
        assert!(!same_repository("git@github.com:jrgoodle/kit.git", "git@github.com:someone/kit.git"));
        assert!(!same_repository("https://github.com/jrgoodle/kit", "https://gitlab.com/jrgoodle/kit"));
    }
}
