use clap::{Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::application::context::{ExecutionMode, WorkspaceContext};
use crate::application::operation::{ProjectOperation, ProjectOutcome};
use crate::application::services::manifest_service::ManifestService;
use crate::application::services::snapshot_service::SnapshotService;
use crate::application::use_cases::{
    branch::ListBranches,
    checkout::Checkout,
    clean::Clean,
    foreach_command::{ForeachCommand, ForeachOptions},
    herd::{Herd, HerdOptions},
    prune::{Prune, PruneOptions},
    reset::{Reset, ResetOptions},
    start::{Start, StartOptions},
    stash::Stash,
    status_check::{StatusCheck, StatusOptions},
    sync_fork::{SyncFork, SyncOptions},
};
use crate::common::error::DroverError;
use crate::common::result::{DroverResult, ResultExt};
use crate::domain::entities::workspace::Workspace;
use crate::domain::value_objects::protocol::Protocol;
use crate::infrastructure::filesystem::config_store::{ConfigStore, SettingKey, WorkspaceSettings};
use crate::infrastructure::git::operations::{BranchScope, CleanOptions};
use crate::presentation::ui::display::{self, OutputFormat, ProgressDisplay};

/// `drover --version` の詳細表示 (build.rs が埋め込む)
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("DROVER_COMMIT"),
    " ",
    env!("DROVER_BUILD_DATE"),
    ")\ntarget: ",
    env!("DROVER_BUILD_TARGET"),
);

/// drover - herd a workspace of git repositories described by one manifest
#[derive(Debug, Parser)]
#[command(name = "drover")]
#[command(about = "Herd a workspace of git repositories described by one manifest")]
#[command(version, long_version = LONG_VERSION)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Working directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Number of parallel workers; implies --parallel
    #[arg(short, long, global = true, env = "DROVER_JOBS")]
    pub jobs: Option<usize>,

    /// Run projects in parallel, one worker per CPU unless --jobs is given
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Clone protocol for sources that do not set one (ssh or https)
    #[arg(long, global = true, env = "DROVER_PROTOCOL")]
    pub protocol: Option<Protocol>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clone missing projects and bring existing ones to their manifest ref
    Herd {
        /// Project names, paths or group tags (default: group `all`)
        projects: Vec<String>,

        /// Herd this branch where it exists on the remote
        #[arg(short, long, conflicts_with = "tag")]
        branch: Option<String>,

        /// Herd this tag where it exists on the remote
        #[arg(short, long)]
        tag: Option<String>,

        /// Clone and fetch depth
        #[arg(short, long)]
        depth: Option<u32>,

        /// Rebase local branches instead of fast-forwarding
        #[arg(short, long)]
        rebase: bool,
    },

    /// Reset projects to their remote ref, discarding local commits
    Reset {
        projects: Vec<String>,

        /// Reset to the last commit before this time (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        timestamp: Option<String>,

        /// Only consider commits by this author for --timestamp
        #[arg(long, requires = "timestamp")]
        author: Option<String>,
    },

    /// Delete a branch in every project that has it
    Prune {
        /// Branch to delete
        branch: String,

        projects: Vec<String>,

        /// Delete even when not fully merged
        #[arg(short, long)]
        force: bool,

        /// Delete the remote branch only
        #[arg(short, long, conflicts_with = "all")]
        remote: bool,

        /// Delete both the local and the remote branch
        #[arg(short, long)]
        all: bool,
    },

    /// Start a new branch in every project
    Start {
        /// Branch to create
        branch: String,

        projects: Vec<String>,

        /// Create or attach a remote tracking branch
        #[arg(short, long)]
        tracking: bool,
    },

    /// Discard untracked files and local changes
    Clean {
        projects: Vec<String>,

        /// Remove untracked directories too
        #[arg(short = 'd')]
        directories: bool,

        /// Also remove ignored files
        #[arg(short = 'x', conflicts_with = "only_ignored")]
        ignored: bool,

        /// Remove only ignored files
        #[arg(short = 'X')]
        only_ignored: bool,

        /// Remove nested git repositories
        #[arg(short = 'f', long)]
        force_nested: bool,

        /// Clean submodules as well
        #[arg(short, long)]
        recursive: bool,
    },

    /// Bring forks up to date with their upstream
    Sync {
        projects: Vec<String>,

        /// Rebase onto the upstream branch instead of fast-forwarding
        #[arg(short, long)]
        rebase: bool,

        /// Do not push the updated branch
        #[arg(long)]
        no_push: bool,
    },

    /// List branches
    Branch {
        projects: Vec<String>,

        /// List remote branches
        #[arg(short, long, conflicts_with = "all")]
        remote: bool,

        /// List local and remote branches
        #[arg(short, long)]
        all: bool,
    },

    /// Check out an existing local branch
    Checkout {
        branch: String,

        projects: Vec<String>,
    },

    /// Stash uncommitted changes
    Stash { projects: Vec<String> },

    /// Run a shell command in every project
    Forall {
        /// Command line, passed to `sh -c`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,

        /// Project names, paths or group tags
        #[arg(short, long = "project", num_args = 1)]
        projects: Vec<String>,

        /// Keep going after a command fails
        #[arg(short, long)]
        ignore_errors: bool,
    },

    /// Show the state of every project
    Status {
        projects: Vec<String>,

        /// Fetch before reporting ahead/behind counts
        #[arg(short, long)]
        fetch: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Save the current commits as a named version
    Save {
        /// Version name, stored under .drover/versions/<name>
        version: String,
    },

    /// List the group tags the manifest defines
    Groups,

    /// Read or change .drover/config.yml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print one setting, or all of them
    Get { key: Option<SettingKey> },
    /// Set a setting
    Set {
        key: SettingKey,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Clear one setting, or all of them
    Clear { key: Option<SettingKey> },
}

/// コマンド実行時の設定（フラグ > 環境変数 > config.yml > 既定値）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    pub mode: ExecutionMode,
    pub rebase: bool,
}

impl CommandOptions {
    /// `jobs` already carries the flag or its environment fallback.
    pub fn resolve(jobs: Option<usize>, parallel: bool, rebase: bool, settings: &WorkspaceSettings) -> Self {
        let jobs = jobs.or(settings.jobs);
        let mode = if parallel || jobs.is_some() {
            ExecutionMode::Parallel { jobs }
        } else {
            ExecutionMode::Serial
        };
        Self {
            mode,
            rebase: rebase || settings.rebase,
        }
    }
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
    cancel: CancellationToken,
}

impl CliApp {
    pub fn new() -> Self {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancellationToken::new(),
        }
    }

    pub fn verbose(&self) -> bool {
        self.cli.verbose
    }

    pub async fn run(self) -> DroverResult<()> {
        colored::control::set_override(!self.cli.no_color);
        console::set_colors_enabled(!self.cli.no_color);

        if let Some(ref dir) = self.cli.directory {
            env::set_current_dir(dir).with_filesystem_error(
                format!("cannot change directory to {}", dir.display()),
                Some(dir.clone()),
            )?;
        }

        let signal_token = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping");
                signal_token.cancel();
            }
        });

        self.handle_command().await
    }

    async fn handle_command(&self) -> DroverResult<()> {
        match &self.cli.command {
            Commands::Herd {
                projects,
                branch,
                tag,
                depth,
                rebase,
            } => self.handle_herd_command(projects, branch, tag, *depth, *rebase).await,
            Commands::Reset {
                projects,
                timestamp,
                author,
            } => {
                let options = ResetOptions {
                    timestamp: timestamp.clone(),
                    timestamp_author: author.clone(),
                    depth: None,
                };
                let context = self.load_context().await?;
                display::header("Resetting projects...");
                self.run_and_report(&context, Arc::new(Reset::new(options)?), projects)
                    .await
            }
            Commands::Prune {
                branch,
                projects,
                force,
                remote,
                all,
            } => {
                let options = PruneOptions {
                    branch: branch.clone(),
                    local: !*remote,
                    remote: *remote || *all,
                    force: *force,
                };
                let context = self.load_context().await?;
                display::header(&format!("Pruning branch {}...", branch.bold()));
                self.run_and_report(&context, Arc::new(Prune::new(options)?), projects)
                    .await
            }
            Commands::Start {
                branch,
                projects,
                tracking,
            } => {
                let options = StartOptions {
                    branch: branch.clone(),
                    tracking: *tracking,
                };
                let context = self.load_context().await?;
                display::header(&format!("Starting branch {}...", branch.bold()));
                self.run_and_report(&context, Arc::new(Start::new(options)?), projects)
                    .await
            }
            Commands::Clean {
                projects,
                directories,
                ignored,
                only_ignored,
                force_nested,
                recursive,
            } => {
                let options = CleanOptions {
                    directories: *directories,
                    ignored: *ignored,
                    only_ignored: *only_ignored,
                    force_nested: *force_nested,
                };
                let context = self.load_context().await?;
                display::header("Cleaning projects...");
                self.run_and_report(&context, Arc::new(Clean::new(options, *recursive)), projects)
                    .await
            }
            Commands::Sync {
                projects,
                rebase,
                no_push,
            } => {
                let context = self.load_context().await?;
                let options = SyncOptions {
                    rebase: self.command_options(&context, *rebase).rebase,
                    push: !*no_push,
                };
                display::header("Syncing forks with upstream...");
                self.run_and_report(&context, Arc::new(SyncFork::new(options)?), projects)
                    .await
            }
            Commands::Branch {
                projects,
                remote,
                all,
            } => {
                let scope = match (*remote, *all) {
                    (_, true) => BranchScope::All,
                    (true, false) => BranchScope::Remote,
                    (false, false) => BranchScope::Local,
                };
                let context = self.load_context().await?;
                self.run_and_report(&context, Arc::new(ListBranches::new(scope)), projects)
                    .await
            }
            Commands::Checkout { branch, projects } => {
                let context = self.load_context().await?;
                display::header(&format!("Checking out {}...", branch.bold()));
                self.run_and_report(&context, Arc::new(Checkout::new(branch.clone())?), projects)
                    .await
            }
            Commands::Stash { projects } => {
                let context = self.load_context().await?;
                self.run_and_report(&context, Arc::new(Stash), projects).await
            }
            Commands::Forall {
                command,
                projects,
                ignore_errors,
            } => self.handle_forall_command(command, projects, *ignore_errors).await,
            Commands::Status {
                projects,
                fetch,
                output,
            } => self.handle_status_command(projects, *fetch, *output).await,
            Commands::Save { version } => self.handle_save_command(version).await,
            Commands::Groups => {
                let context = self.load_context().await?;
                for group in ManifestService::list_groups(&context.projects) {
                    println!("{}", group);
                }
                Ok(())
            }
            Commands::Config { action } => self.handle_config_command(action).await,
        }
    }

    async fn handle_herd_command(
        &self,
        projects: &[String],
        branch: &Option<String>,
        tag: &Option<String>,
        depth: Option<u32>,
        rebase: bool,
    ) -> DroverResult<()> {
        let context = self.load_context().await?;
        let options = HerdOptions {
            branch: branch.clone(),
            tag: tag.clone(),
            depth,
            rebase: self.command_options(&context, rebase).rebase,
        };
        let herd = Herd::new(options)?;

        display::header("Herding projects...");
        self.run_and_report(&context, Arc::new(herd), projects).await
    }

    async fn handle_forall_command(
        &self,
        command: &[String],
        projects: &[String],
        ignore_errors: bool,
    ) -> DroverResult<()> {
        let context = self.load_context().await?;
        let command = command.join(" ");
        let operation = ForeachCommand::new(
            ForeachOptions {
                command: command.clone(),
                ignore_errors,
            },
            context.root(),
            context.cancel.clone(),
        )?;

        display::header(&format!("Running command: {}", command.bold()));
        self.run_and_report(&context, Arc::new(operation), projects).await
    }

    async fn handle_status_command(
        &self,
        projects: &[String],
        fetch: bool,
        output: OutputFormat,
    ) -> DroverResult<()> {
        let context = self.load_context().await?;
        let operation = Arc::new(StatusCheck::new(StatusOptions { fetch }));
        let outcomes = self.execute(&context, operation, projects).await?;

        let statuses: Vec<_> = outcomes.iter().filter_map(ProjectOutcome::status).collect();
        if output == OutputFormat::Text {
            display::header(&format!("Workspace: {}", context.root().display()));
        }
        println!("{}", display::render_statuses(&statuses, output)?);
        Ok(())
    }

    async fn handle_save_command(&self, version: &str) -> DroverResult<()> {
        let context = self.load_context().await?;
        display::header(&format!("Saving version {}...", version.bold()));
        let git = context.git();
        let path = SnapshotService::save(
            git.as_ref(),
            &context.workspace,
            &context.manifest,
            &context.projects,
            version,
        )
        .await?;
        display::success(&format!("Saved {}", path.display()));
        Ok(())
    }

    async fn handle_config_command(&self, action: &ConfigAction) -> DroverResult<()> {
        let store = ConfigStore::for_workspace(&self.find_workspace()?);
        let mut settings = store.load().await?;

        match action {
            ConfigAction::Get { key: Some(key) } => {
                match settings.get(*key) {
                    Some(value) => println!("{}", value),
                    None => display::warning(&format!("{} is not set", key)),
                }
                Ok(())
            }
            ConfigAction::Get { key: None } => {
                print!("{}", serde_yaml::to_string(&settings)?);
                Ok(())
            }
            ConfigAction::Set { key, values } => {
                settings.set(*key, values)?;
                store.save(&settings).await?;
                display::success(&format!("{} updated", key));
                Ok(())
            }
            ConfigAction::Clear { key } => {
                settings.clear(*key);
                store.save(&settings).await?;
                match key {
                    Some(key) => display::success(&format!("{} cleared", key)),
                    None => display::success("all settings cleared"),
                }
                Ok(())
            }
        }
    }

    fn find_workspace(&self) -> DroverResult<Workspace> {
        let current_dir = env::current_dir()
            .with_filesystem_error("cannot read the current directory", None)?;
        Workspace::discover_root(&current_dir)
            .map(Workspace::new)
            .ok_or_else(|| {
                DroverError::workspace_error(
                    format!("no drover.yml found in {} or any parent", current_dir.display()),
                    Some(current_dir),
                )
            })
    }

    async fn load_context(&self) -> DroverResult<WorkspaceContext> {
        let current_dir = env::current_dir()
            .with_filesystem_error("cannot read the current directory", None)?;
        WorkspaceContext::load(&current_dir, self.cli.protocol, self.cancel.clone()).await
    }

    fn command_options(&self, context: &WorkspaceContext, rebase: bool) -> CommandOptions {
        CommandOptions::resolve(self.cli.jobs, self.cli.parallel, rebase, &context.settings)
    }

    async fn execute(
        &self,
        context: &WorkspaceContext,
        operation: Arc<dyn ProjectOperation>,
        filters: &[String],
    ) -> DroverResult<Vec<ProjectOutcome>> {
        let options = self.command_options(context, false);
        let selected = context.select(filters)?;
        tracing::debug!(
            "{} over {} project(s), {:?}",
            operation.name(),
            selected.len(),
            options.mode
        );

        let progress = match options.mode {
            ExecutionMode::Parallel { .. } => Some(ProgressDisplay::new(selected.len(), operation.name())),
            ExecutionMode::Serial => None,
        };
        let result = context
            .execute(operation, selected, options.mode, progress.as_ref().map(ProgressDisplay::reporter))
            .await;
        if let Some(progress) = progress {
            progress.finish();
        }
        result
    }

    async fn run_and_report(
        &self,
        context: &WorkspaceContext,
        operation: Arc<dyn ProjectOperation>,
        filters: &[String],
    ) -> DroverResult<()> {
        let outcomes = self.execute(context, operation, filters).await?;
        display::print_outcomes(&outcomes);
        display::success(&display::summary(&outcomes));
        Ok(())
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}
