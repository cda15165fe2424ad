//! Named remote hosts and the registry that resolves project sources.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::value_objects::git_url::SourceUrl;
use crate::domain::value_objects::protocol::Protocol;

pub const GITHUB: &str = "github";
pub const GITLAB: &str = "gitlab";
pub const BITBUCKET: &str = "bitbucket";

/// Source used when no scope names one.
pub const DEFAULT_SOURCE: &str = GITHUB;

/// A remote host repositories are cloned from. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: SourceUrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
}

impl Source {
    pub fn new(name: impl Into<String>, url: SourceUrl) -> Self {
        Self {
            name: name.into(),
            url,
            protocol: None,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    fn builtin(name: &str, host: &str) -> DroverResult<Self> {
        let url = SourceUrl::new(host)
            .map_err(|e| DroverError::source_error(e.to_string(), Some(name.to_string())))?;
        Ok(Self::new(name, url))
    }
}

/// Registry of sources keyed by name.
///
/// Names are registered while the manifest is walked, either with a
/// definition or as a bare reference. [`SourceRegistry::validate`] runs once
/// and checks every reference is defined; after that the registry only
/// answers lookups.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Source>,
    /// Built-in definitions not yet overridden by the manifest.
    builtins: BTreeSet<String>,
    referenced: BTreeSet<String>,
    default_protocol: Option<Protocol>,
    validated: bool,
}

impl SourceRegistry {
    /// github, gitlab and bitbucket are pre-registered.
    pub fn new() -> DroverResult<Self> {
        let mut sources = BTreeMap::new();
        for (name, host) in [
            (GITHUB, "github.com"),
            (GITLAB, "gitlab.com"),
            (BITBUCKET, "bitbucket.org"),
        ] {
            sources.insert(name.to_string(), Source::builtin(name, host)?);
        }
        let builtins = sources.keys().cloned().collect();

        Ok(Self {
            sources,
            builtins,
            referenced: BTreeSet::new(),
            default_protocol: None,
            validated: false,
        })
    }

    pub fn with_default_protocol(mut self, protocol: Option<Protocol>) -> Self {
        self.default_protocol = protocol;
        self
    }

    /// Record a source name, optionally with its definition.
    pub fn register(&mut self, name: &str, source: Option<Source>) -> DroverResult<()> {
        if self.validated {
            return Err(DroverError::source_error(
                format!("cannot register source '{}' after validation", name),
                Some(name.to_string()),
            ));
        }
        if name.trim().is_empty() {
            return Err(DroverError::source_error("source name must not be empty", None));
        }

        self.referenced.insert(name.to_string());

        let Some(source) = source else {
            return Ok(());
        };

        if self.builtins.remove(name) {
            tracing::debug!("source '{}' overrides the built-in definition", name);
            self.sources.insert(name.to_string(), source);
            return Ok(());
        }

        match self.sources.get(name) {
            Some(existing) if existing != &source => Err(DroverError::source_error(
                format!("source '{}' is defined more than once with different settings", name),
                Some(name.to_string()),
            )),
            Some(_) => Ok(()),
            None => {
                self.sources.insert(name.to_string(), source);
                Ok(())
            }
        }
    }

    /// One-shot check that every referenced source has a definition.
    pub fn validate(&mut self) -> DroverResult<()> {
        if self.validated {
            return Err(DroverError::source_error("source registry is already validated", None));
        }

        let missing: Vec<&str> = self
            .referenced
            .iter()
            .filter(|name| !self.sources.contains_key(*name))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(DroverError::source_error(
                format!("undefined source(s): {}", missing.join(", ")),
                missing.first().map(|s| s.to_string()),
            ));
        }

        self.validated = true;
        Ok(())
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn lookup(&self, name: &str) -> DroverResult<&Source> {
        if !self.validated {
            return Err(DroverError::source_error(
                format!("source '{}' looked up before validation", name),
                Some(name.to_string()),
            ));
        }
        self.sources.get(name).ok_or_else(|| {
            DroverError::source_error(format!("unknown source '{}'", name), Some(name.to_string()))
        })
    }

    /// Explicit override if set, otherwise ssh.
    pub fn default_protocol(&self) -> Protocol {
        self.default_protocol.unwrap_or_default()
    }

    pub fn protocol_for(&self, source: &Source) -> Protocol {
        source.protocol.unwrap_or_else(|| self.default_protocol())
    }

    /// Resolve the clone URL of `repository` on source `name`.
    pub fn remote_url(&self, name: &str, repository: &str) -> DroverResult<(String, Protocol)> {
        let source = self.lookup(name)?;
        let protocol = self.protocol_for(source);
        Ok((source.url.remote_url(repository, protocol), protocol))
    }
}
