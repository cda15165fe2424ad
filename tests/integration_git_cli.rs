//! gitコマンドを使った統合テスト
//!
//! 一時ディレクトリにベアリポジトリを作り、ローカルパスのソースとして
//! マニフェストに登録して、実際の `git` に対して herd / status / clean /
//! forall を実行する。`git` が無い環境ではスキップする

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use drover::application::context::{ExecutionMode, WorkspaceContext};
use drover::application::operation::{OutcomeData, OutcomeKind, ProjectOperation};
use drover::application::services::manifest_service::ManifestService;
use drover::application::use_cases::clean::Clean;
use drover::application::use_cases::foreach_command::{ForeachCommand, ForeachOptions};
use drover::application::use_cases::herd::{Herd, HerdOptions};
use drover::application::use_cases::prune::{Prune, PruneOptions};
use drover::application::use_cases::start::{Start, StartOptions};
use drover::application::use_cases::status_check::{StatusCheck, StatusOptions};
use drover::domain::entities::workspace::Workspace;
use drover::infrastructure::filesystem::config_store::WorkspaceSettings;
use drover::infrastructure::git::operations::CleanOptions;
use drover::infrastructure::git::{GitCli, GitOperations};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=drover", "-c", "user.email=drover@example.com"])
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed in {}", args, dir.display());
}

/// `<root>/remotes/<name>` に main ブランチ1コミットのベアリポジトリを作る
fn seed_remote(root: &Path, name: &str) -> PathBuf {
    let seed = root.join("seed").join(name);
    std::fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init", "-q"]);
    git(&seed, &["checkout", "-q", "-b", "main"]);
    std::fs::write(seed.join("README.md"), format!("# {}\n", name)).unwrap();
    git(&seed, &["add", "README.md"]);
    git(&seed, &["commit", "-q", "-m", "initial"]);

    let remotes = root.join("remotes");
    std::fs::create_dir_all(&remotes).unwrap();
    let bare = remotes.join(name);
    git(
        root,
        &["clone", "-q", "--bare", seed.to_str().unwrap(), bare.to_str().unwrap()],
    );
    bare
}

fn local_context(root: &Path) -> WorkspaceContext {
    let manifest = format!(
        r#"
name: local
sources:
  - name: local
    url: {}
defaults:
  branch: main
  source: local
projects:
  - name: kit
  - name: rex
"#,
        root.join("remotes").display()
    );
    let workspace = root.join("ws");
    std::fs::create_dir_all(&workspace).unwrap();

    WorkspaceContext::from_manifest(
        Workspace::new(&workspace),
        ManifestService::parse_str(&manifest).unwrap(),
        workspace.join("drover.yml"),
        WorkspaceSettings::default(),
        None,
        CancellationToken::new(),
    )
    .unwrap()
}

async fn herd(context: &WorkspaceContext) -> Vec<OutcomeKind> {
    let operation = Arc::new(Herd::new(HerdOptions::default()).unwrap());
    let projects = context.select(&[]).unwrap();
    context
        .execute(operation, projects, ExecutionMode::Parallel { jobs: Some(2) }, None)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.kind)
        .collect()
}

#[tokio::test]
async fn test_herd_clones_then_updates_local_remotes() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    seed_remote(temp_dir.path(), "kit");
    seed_remote(temp_dir.path(), "rex");
    let context = local_context(temp_dir.path());

    // 1. 初回はクローン
    assert_eq!(herd(&context).await, vec![OutcomeKind::Cloned, OutcomeKind::Cloned]);
    let kit = context.root().join("kit");
    assert!(kit.join("README.md").exists());

    // 2. 2回目は更新
    assert_eq!(herd(&context).await, vec![OutcomeKind::Updated, OutcomeKind::Updated]);

    // 3. ステータスは main / origin/main でクリーン
    let status = Arc::new(StatusCheck::new(StatusOptions { fetch: false }));
    let projects = context.select(&["kit".to_string()]).unwrap();
    let outcomes = context
        .execute(status.clone(), projects.clone(), ExecutionMode::Serial, None)
        .await
        .unwrap();
    let kit_status = outcomes[0].status().unwrap();
    assert_eq!(kit_status.current_ref.as_deref(), Some("main"));
    assert_eq!(kit_status.tracking.as_deref(), Some("origin/main"));
    assert_eq!((kit_status.ahead, kit_status.behind), (0, 0));
    assert!(!kit_status.dirty);

    // 4. 未追跡ファイルで dirty になり、clean で消える
    std::fs::write(kit.join("scratch.txt"), "tmp").unwrap();
    let outcomes = context
        .execute(status.clone(), projects.clone(), ExecutionMode::Serial, None)
        .await
        .unwrap();
    assert!(outcomes[0].status().unwrap().dirty);

    let clean = Arc::new(Clean::new(CleanOptions::default(), false));
    context
        .execute(clean, projects, ExecutionMode::Serial, None)
        .await
        .unwrap();
    assert!(!kit.join("scratch.txt").exists());
}

#[tokio::test]
async fn test_forall_exports_project_environment() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    seed_remote(temp_dir.path(), "kit");
    seed_remote(temp_dir.path(), "rex");
    let context = local_context(temp_dir.path());
    herd(&context).await;

    let operation = ForeachCommand::new(
        ForeachOptions {
            command: "printf '%s@%s' \"$PROJECT_NAME\" \"$PROJECT_REF\"".to_string(),
            ignore_errors: false,
        },
        context.root(),
        context.cancel.clone(),
    )
    .unwrap();
    let projects = context.select(&[]).unwrap();
    let outcomes = context
        .execute(Arc::new(operation), projects, ExecutionMode::Serial, None)
        .await
        .unwrap();

    let outputs: Vec<String> = outcomes
        .iter()
        .filter_map(|o| match &o.data {
            Some(OutcomeData::Output { stdout, .. }) => Some(stdout.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(outputs, vec!["kit@refs/heads/main", "rex@refs/heads/main"]);
}

#[tokio::test]
async fn test_cancelled_token_interrupts_before_dispatch() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    seed_remote(temp_dir.path(), "kit");
    seed_remote(temp_dir.path(), "rex");
    let context = local_context(temp_dir.path());
    context.cancel.cancel();

    let operation = Arc::new(Herd::new(HerdOptions::default()).unwrap());
    let projects = context.select(&[]).unwrap();
    let err = context
        .execute(operation, projects, ExecutionMode::Parallel { jobs: Some(2) }, None)
        .await
        .unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(err.exit_code(), 130);
    assert!(!context.root().join("kit").exists());
}

async fn run_on_kit(context: &WorkspaceContext, operation: Arc<dyn ProjectOperation>) {
    let projects = context.select(&["kit".to_string()]).unwrap();
    context
        .execute(operation, projects, ExecutionMode::Serial, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_start_picks_up_a_branch_pushed_after_herd() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let kit_remote = seed_remote(temp_dir.path(), "kit");
    seed_remote(temp_dir.path(), "rex");
    let context = local_context(temp_dir.path());
    herd(&context).await;

    // herdの後で別の作業者が feature をpushした
    let seed = temp_dir.path().join("seed").join("kit");
    git(&seed, &["push", "-q", kit_remote.to_str().unwrap(), "HEAD:refs/heads/feature"]);

    let start = Start::new(StartOptions {
        branch: "feature".to_string(),
        tracking: false,
    })
    .unwrap();
    run_on_kit(&context, Arc::new(start)).await;

    let cli = GitCli::default();
    let kit = context.root().join("kit");
    assert_eq!(cli.current_branch(&kit).await.unwrap().as_deref(), Some("feature"));
    assert_eq!(
        cli.tracking_branch(&kit, "feature").await.unwrap().as_deref(),
        Some("origin/feature")
    );
}

#[tokio::test]
async fn test_status_after_pruning_the_upstream_branch() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    seed_remote(temp_dir.path(), "kit");
    seed_remote(temp_dir.path(), "rex");
    let context = local_context(temp_dir.path());
    herd(&context).await;

    // 1. feature を作ってリモートにpush
    let start = Start::new(StartOptions {
        branch: "feature".to_string(),
        tracking: true,
    })
    .unwrap();
    run_on_kit(&context, Arc::new(start)).await;

    // 2. リモート側だけ削除。ローカルの feature は origin/feature を追跡したまま
    let prune = Prune::new(PruneOptions {
        branch: "feature".to_string(),
        remote: true,
        ..Default::default()
    })
    .unwrap();
    run_on_kit(&context, Arc::new(prune)).await;

    // 3. status は失敗せずに upstream が消えたことを報告する
    let status = Arc::new(StatusCheck::new(StatusOptions { fetch: false }));
    let projects = context.select(&["kit".to_string()]).unwrap();
    let outcomes = context
        .execute(status, projects, ExecutionMode::Serial, None)
        .await
        .unwrap();
    let kit_status = outcomes[0].status().unwrap();
    assert_eq!(kit_status.current_ref.as_deref(), Some("feature"));
    assert_eq!(kit_status.tracking.as_deref(), Some("origin/feature"));
    assert!(kit_status.upstream_gone);
    assert_eq!((kit_status.ahead, kit_status.behind), (0, 0));
}

#[tokio::test]
async fn test_cancelling_kills_commands_in_flight() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    seed_remote(temp_dir.path(), "kit");
    seed_remote(temp_dir.path(), "rex");
    let context = local_context(temp_dir.path());
    herd(&context).await;

    let operation = ForeachCommand::new(
        ForeachOptions {
            command: "sleep 5".to_string(),
            ignore_errors: false,
        },
        context.root(),
        context.cancel.clone(),
    )
    .unwrap();

    let cancel = context.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let projects = context.select(&[]).unwrap();
    let err = context
        .execute(Arc::new(operation), projects, ExecutionMode::Parallel { jobs: Some(2) }, None)
        .await
        .unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(err.exit_code(), 130);
    assert!(started.elapsed() < Duration::from_secs(4));
}
