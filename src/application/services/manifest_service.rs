//! Manifest parsing, structural validation and resolution into
//! [`ResolvedProject`]s.
//!
//! Every cascading field is looked up independently with a first-present-wins
//! chain: project, then section defaults from the innermost section outwards,
//! then the top-level defaults, then a built-in fallback.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use validator::Validate;

use crate::common::error::DroverError;
use crate::common::result::DroverResult;
use crate::domain::entities::manifest::{
    Defaults, GitSettings, Manifest, ProjectEntry, RefScope, Section, UpstreamEntry,
};
use crate::domain::entities::resolved_project::{
    ResolvedGitSettings, ResolvedProject, ResolvedUpstream, ALL_GROUP, DEFAULT_BRANCH,
    DEFAULT_REMOTE, DEFAULT_UPSTREAM_REMOTE, NOT_DEFAULT_GROUP,
};
use crate::domain::entities::source::{Source, SourceRegistry, DEFAULT_SOURCE};
use crate::domain::value_objects::git_ref::GitRef;
use crate::domain::value_objects::git_url::SourceUrl;
use crate::domain::value_objects::protocol::Protocol;

/// 解決時のオプション
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub workspace_root: PathBuf,
    /// Overrides the manifest's `defaults.protocol`.
    pub protocol: Option<Protocol>,
}

impl ResolveOptions {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            protocol: None,
        }
    }

    pub fn with_protocol(mut self, protocol: Option<Protocol>) -> Self {
        self.protocol = protocol;
        self
    }
}

/// 解決済みマニフェスト
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub registry: SourceRegistry,
    /// Manifest order, depth-first.
    pub projects: Vec<ResolvedProject>,
}

/// Defaults overlays visible from one point of the tree.
#[derive(Debug, Clone, Default)]
struct Scope<'a> {
    /// Innermost first; the top-level defaults come last.
    defaults: Vec<(String, &'a Defaults)>,
    path_prefix: PathBuf,
    tags: Vec<String>,
}

impl<'a> Scope<'a> {
    fn root(manifest: &'a Manifest) -> Self {
        Self {
            defaults: manifest
                .defaults
                .iter()
                .map(|d| ("defaults".to_string(), d))
                .collect(),
            ..Default::default()
        }
    }

    fn enter(&self, section: &'a Section) -> DroverResult<Self> {
        let mut defaults = Vec::with_capacity(self.defaults.len() + 1);
        if let Some(d) = &section.defaults {
            defaults.push((format!("defaults of section '{}'", section.name), d));
        }
        defaults.extend(self.defaults.iter().cloned());

        let path_prefix = match &section.path {
            Some(path) => self
                .path_prefix
                .join(relative_path(path, &format!("section '{}'", section.name))?),
            None => self.path_prefix.clone(),
        };

        let mut tags = self.tags.clone();
        tags.push(section.name.clone());
        tags.extend(section.groups.iter().flatten().cloned());

        Ok(Self {
            defaults,
            path_prefix,
            tags,
        })
    }

    fn first<T>(&self, f: impl Fn(&Defaults) -> Option<T>) -> Option<T> {
        self.defaults.iter().find_map(|(_, d)| f(d))
    }

    fn first_git<T>(&self, f: impl Fn(&GitSettings) -> Option<T>) -> Option<T> {
        self.first(|d| d.git.as_ref().and_then(&f))
    }

    /// The first scope that sets any ref wins.
    fn first_ref(&self) -> DroverResult<Option<GitRef>> {
        for (label, defaults) in &self.defaults {
            if let Some(git_ref) = defaults.scoped_ref(label)? {
                return Ok(Some(git_ref));
            }
        }
        Ok(None)
    }
}

/// マニフェストの解析・解決を行うサービス
pub struct ManifestService;

impl ManifestService {
    /// Parse and structurally validate a manifest.
    pub fn parse(bytes: &[u8]) -> DroverResult<Manifest> {
        let manifest: Manifest = serde_yaml::from_slice(bytes).map_err(|e| {
            DroverError::manifest_error(format!("invalid manifest: {}", e), None)
        })?;
        Self::validate(&manifest)?;
        Ok(manifest)
    }

    pub fn parse_str(content: &str) -> DroverResult<Manifest> {
        Self::parse(content.as_bytes())
    }

    /// YAMLへシリアライズ
    pub fn to_yaml(manifest: &Manifest) -> DroverResult<String> {
        Self::validate(manifest)?;
        Ok(serde_yaml::to_string(manifest)?)
    }

    /// マニフェストの構造を検証
    pub fn validate(manifest: &Manifest) -> DroverResult<()> {
        check(manifest, "manifest")?;

        if manifest.sections.is_some() && manifest.projects.is_some() {
            return Err(DroverError::manifest_error(
                "a manifest lists either sections (groups) or projects, not both",
                None,
            ));
        }

        if let Some(defaults) = &manifest.defaults {
            Self::validate_defaults(defaults, "defaults", true)?;
        }
        for source in &manifest.sources {
            check(source, &format!("source '{}'", source.name))?;
        }
        for project in manifest.projects.iter().flatten() {
            Self::validate_project(project)?;
        }
        for section in manifest.sections.iter().flatten() {
            Self::validate_section(section)?;
        }
        Ok(())
    }

    fn validate_defaults(defaults: &Defaults, label: &str, top_level: bool) -> DroverResult<()> {
        if defaults.ref_count() > 1 {
            return Err(DroverError::manifest_error(
                format!("{} may set only one of branch, tag, commit or ref", label),
                None,
            ));
        }
        defaults.scoped_ref(label)?;

        if !top_level && defaults.protocol.is_some() {
            return Err(DroverError::manifest_error(
                format!("{}: protocol may only be set in the top-level defaults", label),
                None,
            ));
        }
        Ok(())
    }

    fn validate_section(section: &Section) -> DroverResult<()> {
        let label = format!("section '{}'", section.name);
        check(section, &label)?;
        if let Some(defaults) = &section.defaults {
            Self::validate_defaults(defaults, &format!("defaults of {}", label), false)?;
        }
        for project in &section.projects {
            Self::validate_project(project)?;
        }
        for nested in section.sections.iter().flatten() {
            Self::validate_section(nested)?;
        }
        Ok(())
    }

    fn validate_project(project: &ProjectEntry) -> DroverResult<()> {
        let label = format!("project '{}'", project.name);
        check(project, &label)?;
        project.scoped_ref(&label)?;
        if let Some(upstream) = &project.upstream {
            let label = format!("upstream '{}' of {}", upstream.name, label);
            check(upstream, &label)?;
            upstream.scoped_ref(&label)?;
        }
        Ok(())
    }

    /// Flatten the manifest into resolved projects.
    ///
    /// Either every project resolves or an error is returned; a partial set is
    /// never produced.
    pub fn resolve(manifest: &Manifest, options: &ResolveOptions) -> DroverResult<ResolvedManifest> {
        let protocol = options
            .protocol
            .or_else(|| manifest.defaults.as_ref().and_then(|d| d.protocol));
        let mut registry = SourceRegistry::new()?.with_default_protocol(protocol);
        Self::register_sources(manifest, &mut registry)?;
        registry.validate()?;

        let resolver = Resolver {
            registry: &registry,
            workspace_root: &options.workspace_root,
        };

        let root = Scope::root(manifest);
        let mut projects = Vec::with_capacity(manifest.project_count());
        for project in manifest.projects.iter().flatten() {
            projects.push(resolver.project(project, &root)?);
        }
        for section in manifest.sections.iter().flatten() {
            resolver.section(section, &root, &mut projects)?;
        }

        Self::check_conflicts(&projects)?;
        tracing::debug!("resolved {} project(s)", projects.len());

        Ok(ResolvedManifest { registry, projects })
    }

    fn register_sources(manifest: &Manifest, registry: &mut SourceRegistry) -> DroverResult<()> {
        for entry in &manifest.sources {
            let url = SourceUrl::new(&entry.url).map_err(|e| {
                DroverError::source_error(
                    format!("source '{}': {}", entry.name, e),
                    Some(entry.name.clone()),
                )
            })?;
            let mut source = Source::new(&entry.name, url);
            source.protocol = entry.protocol;
            registry.register(&entry.name, Some(source))?;
        }

        registry.register(DEFAULT_SOURCE, None)?;

        let mut referenced = Vec::new();
        collect_defaults_sources(manifest.defaults.as_ref(), &mut referenced);
        for project in manifest.projects.iter().flatten() {
            collect_project_sources(project, &mut referenced);
        }
        for section in manifest.sections.iter().flatten() {
            collect_section_sources(section, &mut referenced);
        }
        for name in referenced {
            registry.register(name, None)?;
        }
        Ok(())
    }

    fn check_conflicts(projects: &[ResolvedProject]) -> DroverResult<()> {
        let mut paths: HashMap<&Path, &str> = HashMap::with_capacity(projects.len());
        for project in projects {
            if let Some(other) = paths.insert(project.path.as_path(), project.name.as_str()) {
                return Err(DroverError::manifest_error(
                    format!(
                        "projects '{}' and '{}' both resolve to path '{}'",
                        other,
                        project.name,
                        project.relative_display()
                    ),
                    None,
                ));
            }

            if let Some(upstream) = &project.upstream {
                if upstream.remote == project.remote {
                    return Err(DroverError::manifest_error(
                        format!(
                            "project '{}' and its upstream '{}' both use remote name '{}'",
                            project.name, upstream.name, project.remote
                        ),
                        None,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Projects whose group tags intersect `filters`, in manifest order.
    ///
    /// Empty filters select the implicit `all` group. A filter matching no
    /// project is an error.
    pub fn select(projects: &[ResolvedProject], filters: &[String]) -> DroverResult<Vec<ResolvedProject>> {
        let unknown: Vec<&str> = filters
            .iter()
            .filter(|f| !projects.iter().any(|p| p.groups.contains(f.as_str())))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(DroverError::validation_error(
                "projects",
                format!("no project or group named {}", unknown.join(", ")),
                None,
            ));
        }

        Ok(projects
            .iter()
            .filter(|p| p.matches_any(filters))
            .cloned()
            .collect())
    }

    /// Every group tag in use, sorted.
    pub fn list_groups(projects: &[ResolvedProject]) -> Vec<String> {
        projects
            .iter()
            .flat_map(|p| p.groups.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

struct Resolver<'r> {
    registry: &'r SourceRegistry,
    workspace_root: &'r Path,
}

impl<'r> Resolver<'r> {
    fn section<'a>(
        &self,
        section: &'a Section,
        parent: &Scope<'a>,
        out: &mut Vec<ResolvedProject>,
    ) -> DroverResult<()> {
        let scope = parent.enter(section)?;
        for project in &section.projects {
            out.push(self.project(project, &scope)?);
        }
        for nested in section.sections.iter().flatten() {
            self.section(nested, &scope, out)?;
        }
        Ok(())
    }

    fn project(&self, entry: &ProjectEntry, scope: &Scope<'_>) -> DroverResult<ResolvedProject> {
        let name = entry.name.trim().to_string();
        let label = format!("project '{}'", name);

        let dir = match &entry.path {
            Some(path) => relative_path(path, &label)?,
            None => relative_path(default_dir(&name), &label)?,
        };
        let relative_path = scope.path_prefix.join(dir);
        let path = self.workspace_root.join(&relative_path);

        let remote = entry
            .remote
            .clone()
            .or_else(|| scope.first(|d| d.remote.clone()))
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
        let source = entry
            .source
            .clone()
            .or_else(|| scope.first(|d| d.source.clone()))
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let (url, protocol) = self.registry.remote_url(&source, &name)?;

        let git_ref = match entry.scoped_ref(&label)? {
            Some(git_ref) => git_ref,
            None => match scope.first_ref()? {
                Some(git_ref) => git_ref,
                None => GitRef::Branch(DEFAULT_BRANCH.to_string()),
            },
        };

        let git = resolve_git(entry.git.as_ref(), scope);

        let timestamp_author = entry
            .timestamp_author
            .clone()
            .or_else(|| scope.first(|d| d.timestamp_author.clone()));

        let upstream = match &entry.upstream {
            Some(upstream) => Some(self.upstream(upstream, &source, &git_ref, scope, &label)?),
            None => None,
        };

        let mut groups: BTreeSet<String> = [ALL_GROUP.to_string(), name.clone()]
            .into_iter()
            .chain(std::iter::once(relative_path.display().to_string()))
            .chain(scope.tags.iter().cloned())
            .chain(entry.groups.iter().flatten().cloned())
            .collect();
        if groups.contains(NOT_DEFAULT_GROUP) {
            groups.remove(ALL_GROUP);
        }

        Ok(ResolvedProject {
            name,
            relative_path,
            path,
            remote,
            url,
            source,
            protocol,
            git_ref,
            git,
            upstream,
            groups,
            timestamp_author,
        })
    }

    fn upstream(
        &self,
        entry: &UpstreamEntry,
        project_source: &str,
        project_ref: &GitRef,
        scope: &Scope<'_>,
        label: &str,
    ) -> DroverResult<ResolvedUpstream> {
        let remote = entry
            .remote
            .clone()
            .or_else(|| scope.first(|d| d.upstream.as_ref().and_then(|u| u.remote.clone())))
            .unwrap_or_else(|| DEFAULT_UPSTREAM_REMOTE.to_string());
        let source = entry
            .source
            .clone()
            .or_else(|| scope.first(|d| d.upstream.as_ref().and_then(|u| u.source.clone())))
            .unwrap_or_else(|| project_source.to_string());

        let name = entry.name.trim().to_string();
        let (url, protocol) = self.registry.remote_url(&source, &name)?;
        let git_ref = entry
            .scoped_ref(&format!("upstream of {}", label))?
            .unwrap_or_else(|| project_ref.clone());

        Ok(ResolvedUpstream {
            name,
            remote,
            url,
            source,
            protocol,
            git_ref,
        })
    }
}

fn check(value: &impl Validate, label: &str) -> DroverResult<()> {
    value
        .validate()
        .map_err(|e| DroverError::manifest_error(format!("{}: {}", label, e), None))
}

fn resolve_git(project: Option<&GitSettings>, scope: &Scope<'_>) -> ResolvedGitSettings {
    fn pick<T>(
        project: Option<&GitSettings>,
        scope: &Scope<'_>,
        f: impl Fn(&GitSettings) -> Option<T>,
    ) -> Option<T> {
        project.and_then(&f).or_else(|| scope.first_git(&f))
    }

    let config: BTreeMap<String, String> = pick(project, scope, |g| g.config.clone())
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();

    ResolvedGitSettings {
        submodules: pick(project, scope, |g| g.submodules).unwrap_or(false),
        recursive: pick(project, scope, |g| g.recursive).unwrap_or(false),
        lfs: pick(project, scope, |g| g.lfs).unwrap_or(false),
        depth: pick(project, scope, |g| g.depth).unwrap_or(0),
        config,
    }
}

/// Last component of the project name, without a `.git` suffix.
fn default_dir(name: &str) -> &str {
    let last = name.trim_end_matches('/').rsplit('/').next().unwrap_or(name);
    last.strip_suffix(".git").unwrap_or(last)
}

/// Reject absolute paths and anything climbing out with `..`.
fn relative_path(raw: &str, label: &str) -> DroverResult<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in Path::new(raw.trim()).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DroverError::manifest_error(
                    format!("{}: path '{}' must stay inside the workspace", label, raw),
                    None,
                ));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(DroverError::manifest_error(
            format!("{}: empty path", label),
            None,
        ));
    }
    Ok(normalized)
}

fn collect_defaults_sources<'a>(defaults: Option<&'a Defaults>, out: &mut Vec<&'a str>) {
    if let Some(defaults) = defaults {
        out.extend(defaults.source.as_deref());
        out.extend(defaults.upstream.as_ref().and_then(|u| u.source.as_deref()));
    }
}

fn collect_project_sources<'a>(project: &'a ProjectEntry, out: &mut Vec<&'a str>) {
    out.extend(project.source.as_deref());
    out.extend(project.upstream.as_ref().and_then(|u| u.source.as_deref()));
}

fn collect_section_sources<'a>(section: &'a Section, out: &mut Vec<&'a str>) {
    collect_defaults_sources(section.defaults.as_ref(), out);
    for project in &section.projects {
        collect_project_sources(project, out);
    }
    for nested in section.sections.iter().flatten() {
        collect_section_sources(nested, out);
    }
}
