//! # drover - a workspace of git repositories from one manifest
//!
//! `drover` reads a `drover.yml` manifest describing many git repositories,
//! resolves every project to a concrete remote URL, local path and target
//! ref, and drives the `git` command line to bring each working copy to
//! that state, optionally many at once.
//!
//! ## Features
//!
//! - **Layered manifest**: global defaults, nested sections and per-project
//!   overrides, resolved deterministically
//! - **Source registry**: named hosts (`github`, `gitlab`, `bitbucket` built
//!   in) with ssh or https URL formatting
//! - **Reconciliation**: herd, reset, prune, start, clean and fork sync
//! - **Parallel execution**: bounded workers, stop-on-first-failure and
//!   Ctrl-C cancellation that reaches every git subprocess
//! - **Snapshots**: save the current commits as a pinned version manifest
//!
//! ## Quick Start
//!
//! 1. Write a manifest (`drover.yml`) at the workspace root:
//!
//! ```yaml
//! name: cats
//! defaults:
//!   branch: main
//! sections:
//!   - name: cats
//!     projects:
//!       - name: jrgoodle/kit
//!         tag: v1.0
//!       - name: jrgoodle/kishka
//!         path: black-cats/kishka
//! ```
//!
//! 2. Clone and update everything:
//!
//! ```bash
//! drover herd
//! drover status
//! ```
//!
//! ## Architecture
//!
//! The crate is organized using clean architecture principles:
//!
//! - [`domain`]: manifest model, sources and resolved projects
//! - [`application`]: resolution, reconciliation use cases and the orchestrator
//! - [`infrastructure`]: the git command line and workspace files
//! - [`presentation`]: CLI interface and terminal rendering
//! - [`common`]: shared error, result and logging helpers
//!
//! ## Resolving a Manifest
//!
//! ```rust,no_run
//! use drover::application::services::manifest_service::{ManifestService, ResolveOptions};
//!
//! # fn example() -> drover::Result<()> {
//! let manifest = ManifestService::parse_str("name: cats\nprojects:\n  - name: jrgoodle/kit\n")?;
//! let resolved = ManifestService::resolve(&manifest, &ResolveOptions::new("/work/cats"))?;
//!
//! for project in &resolved.projects {
//!     println!("{} -> {} @ {}", project.name, project.url, project.git_ref);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types for convenience
pub use crate::common::error::DroverError;
pub use crate::common::result::DroverResult as Result;
