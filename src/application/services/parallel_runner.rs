//! Bounded fan-out of one [`ProjectOperation`] over many projects.
//!
//! Workers are tokio tasks in a [`JoinSet`]. At most `jobs` run at once.
//! The first failure stops dispatch; tasks already running drain and keep
//! their outcomes. Cancellation reaches git subprocesses through the token
//! their command runner shares with this runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::operation::{ProjectOperation, ProjectOutcome};
use crate::common::error::DroverError;
use crate::common::result::{DroverResult, DroverResultExt};
use crate::domain::entities::resolved_project::ResolvedProject;
use crate::infrastructure::git::GitOperations;

/// 進捗通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { project: String },
    Finished { project: String, completed: usize, total: usize, success: bool },
}

pub type ProgressReporter = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// 1件の失敗
#[derive(Debug)]
pub struct BatchFailure {
    /// Position in the input list.
    pub index: usize,
    pub project: String,
    pub error: DroverError,
}

/// バッチ実行の結果
#[derive(Debug)]
pub struct BatchReport {
    /// Successful outcomes in input order.
    pub outcomes: Vec<ProjectOutcome>,
    /// Failures in the order they were observed.
    pub failures: Vec<BatchFailure>,
    pub total: usize,
    pub dispatched: usize,
    pub interrupted: bool,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.outcomes.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.interrupted
    }

    /// Collapse into the outcomes, or the error the batch should surface.
    ///
    /// Interruption wins over everything else; otherwise the first observed
    /// failure is wrapped in [`DroverError::ParallelBatchError`].
    pub fn into_result(self) -> DroverResult<Vec<ProjectOutcome>> {
        if self.interrupted || self.failures.iter().any(|f| f.error.is_interrupted()) {
            return Err(DroverError::Interrupted);
        }
        let completed = self.completed();
        match self.failures.into_iter().next() {
            Some(first) => Err(DroverError::parallel_batch_error(
                first.project,
                completed,
                self.total,
                first.error,
            )),
            None => Ok(self.outcomes),
        }
    }
}

#[derive(Clone)]
pub struct ParallelRunner {
    jobs: usize,
    cancel: CancellationToken,
    progress: Option<ProgressReporter>,
    completed: Arc<AtomicUsize>,
}

impl ParallelRunner {
    /// `jobs` of `None` uses one worker per CPU.
    pub fn new(jobs: Option<usize>, cancel: CancellationToken) -> Self {
        Self {
            jobs: Self::worker_count(jobs),
            cancel,
            progress: None,
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn worker_count(jobs: Option<usize>) -> usize {
        jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Tasks finished so far, for display only.
    pub fn progress_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completed)
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }

    pub async fn run(
        &self,
        operation: Arc<dyn ProjectOperation>,
        git: Arc<dyn GitOperations>,
        projects: Vec<ResolvedProject>,
    ) -> BatchReport {
        let total = projects.len();
        let mut queue = projects.into_iter().enumerate();
        let mut workers = JoinSet::new();

        let mut outcomes: Vec<(usize, ProjectOutcome)> = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut dispatched = 0;
        let mut stopped = false;

        debug!(operation = operation.name(), total, jobs = self.jobs, "starting batch");

        loop {
            while !stopped && !self.cancel.is_cancelled() && workers.len() < self.jobs {
                let Some((index, project)) = queue.next() else {
                    break;
                };
                dispatched += 1;
                self.report(ProgressEvent::Started {
                    project: project.name.clone(),
                });

                let operation = Arc::clone(&operation);
                let git = Arc::clone(&git);
                let counter = Arc::clone(&self.completed);
                workers.spawn(async move {
                    let result = operation
                        .run(git.as_ref(), &project)
                        .await
                        .for_project(&project.name);
                    counter.fetch_add(1, Ordering::SeqCst);
                    (index, project.name, result)
                });
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };

            let (project, success) = match joined {
                Ok((index, project, Ok(outcome))) => {
                    outcomes.push((index, outcome));
                    (project, true)
                }
                Ok((index, project, Err(error))) => {
                    if !stopped {
                        warn!(project = %project, "{}; no further projects will start", error);
                    }
                    stopped = true;
                    failures.push(BatchFailure {
                        index,
                        project: project.clone(),
                        error,
                    });
                    (project, false)
                }
                Err(join_error) => {
                    stopped = true;
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    failures.push(BatchFailure {
                        index: usize::MAX,
                        project: "<worker>".to_string(),
                        error: join_error.into(),
                    });
                    ("<worker>".to_string(), false)
                }
            };

            self.report(ProgressEvent::Finished {
                project,
                completed: outcomes.len() + failures.len(),
                total,
                success,
            });
        }

        outcomes.sort_by_key(|(index, _)| *index);

        BatchReport {
            outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
            failures,
            total,
            dispatched,
            interrupted: self.cancel.is_cancelled(),
        }
    }

    /// One project at a time; the first error is returned unchanged.
    pub async fn run_serial(
        operation: &dyn ProjectOperation,
        git: &dyn GitOperations,
        projects: &[ResolvedProject],
        cancel: &CancellationToken,
    ) -> DroverResult<Vec<ProjectOutcome>> {
        let mut outcomes = Vec::with_capacity(projects.len());
        for project in projects {
            if cancel.is_cancelled() {
                return Err(DroverError::Interrupted);
            }
            outcomes.push(operation.run(git, project).await.for_project(&project.name)?);
        }
        Ok(outcomes)
    }
}
