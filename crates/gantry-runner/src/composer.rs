//! Pipeline execution: ordered stages of serial or concurrent job groups.

use futures::StreamExt;
use futures::future::join_all;
use gantry_core::executor::Executor;
use gantry_core::job::{JobSpec, LogLine};
use gantry_core::pipeline::{Concurrency, Pipeline, Stage};
use gantry_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Terminal state of a single job within a run.
#[derive(Debug, Clone)]
pub enum JobState {
    Succeeded,
    Failed { message: String },
}

/// Recorded result of one job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub name: String,
    pub fallible: bool,
    pub state: JobState,
}

impl JobOutcome {
    /// A failure that counts against the stage. Fallible failures never do.
    pub fn counts_as_failure(&self) -> bool {
        !self.fallible && matches!(self.state, JobState::Failed { .. })
    }
}

/// Recorded result of one stage.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub name: String,
    pub jobs: Vec<JobOutcome>,
}

impl StageOutcome {
    pub fn success(&self) -> bool {
        !self.jobs.iter().any(|j| j.counts_as_failure())
    }
}

/// Result of a pipeline execution.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub pipeline: String,
    pub stages: Vec<StageOutcome>,
    /// First non-fallible failure, as (stage, job).
    pub failure: Option<(String, String)>,
}

impl PipelineOutcome {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Convert the first non-fallible failure into the pipeline's
    /// terminal error.
    pub fn result(&self) -> Result<()> {
        match &self.failure {
            None => Ok(()),
            Some((stage, job)) => Err(Error::StageFailed {
                stage: stage.clone(),
                job: job.clone(),
            }),
        }
    }
}

/// Event emitted during pipeline execution.
#[derive(Debug, Clone)]
pub enum RunEvent {
    StageStarted {
        stage: String,
    },
    JobStarted {
        stage: String,
        job: String,
    },
    JobLog {
        job: String,
        line: LogLine,
    },
    JobCompleted {
        stage: String,
        job: String,
        success: bool,
        fallible: bool,
    },
    StageCompleted {
        stage: String,
        success: bool,
    },
    PipelineCompleted {
        success: bool,
    },
}

/// Drives pipelines through an executor.
///
/// Each run operates on its own descriptors; the runner holds no state
/// across runs and implements no retries.
pub struct PipelineRunner {
    executor: Arc<dyn Executor>,
}

impl PipelineRunner {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Execute a pipeline, returning a channel of events and a handle to
    /// the final outcome.
    pub fn run(
        &self,
        pipeline: Pipeline,
    ) -> (
        mpsc::Receiver<RunEvent>,
        tokio::task::JoinHandle<PipelineOutcome>,
    ) {
        let (tx, rx) = mpsc::channel(100);
        let executor = self.executor.clone();

        let handle = tokio::spawn(async move { Self::execute_inner(executor, pipeline, tx).await });

        (rx, handle)
    }

    /// Execute a single job, convenience path for re-run requests. A
    /// non-fallible failure becomes the terminal error.
    pub fn run_job(
        &self,
        spec: JobSpec,
    ) -> (
        mpsc::Receiver<RunEvent>,
        tokio::task::JoinHandle<Result<JobOutcome>>,
    ) {
        let (tx, rx) = mpsc::channel(100);
        let executor = self.executor.clone();

        let handle = tokio::spawn(async move {
            let outcome = Self::execute_job(&executor, "(single)", spec, &tx).await;
            match &outcome.state {
                JobState::Failed { .. } if !outcome.fallible => Err(Error::StageFailed {
                    stage: "(single)".to_string(),
                    job: outcome.name.clone(),
                }),
                _ => Ok(outcome),
            }
        });

        (rx, handle)
    }

    async fn execute_inner(
        executor: Arc<dyn Executor>,
        pipeline: Pipeline,
        tx: mpsc::Sender<RunEvent>,
    ) -> PipelineOutcome {
        let mut stages = Vec::with_capacity(pipeline.stages.len());
        let mut failure = None;

        for stage in &pipeline.stages {
            let _ = tx
                .send(RunEvent::StageStarted {
                    stage: stage.name.clone(),
                })
                .await;

            let outcome = Self::execute_stage(&executor, stage, &tx).await;
            let success = outcome.success();

            let _ = tx
                .send(RunEvent::StageCompleted {
                    stage: stage.name.clone(),
                    success,
                })
                .await;

            if !success {
                let job = outcome
                    .jobs
                    .iter()
                    .find(|j| j.counts_as_failure())
                    .map(|j| j.name.clone())
                    .unwrap_or_default();
                error!(stage = %stage.name, job = %job, "Stage failed; aborting pipeline");
                failure = Some((stage.name.clone(), job));
                stages.push(outcome);
                break;
            }

            info!(stage = %stage.name, "Stage completed");
            stages.push(outcome);
        }

        let success = failure.is_none();
        let _ = tx.send(RunEvent::PipelineCompleted { success }).await;

        PipelineOutcome {
            pipeline: pipeline.name,
            stages,
            failure,
        }
    }

    async fn execute_stage(
        executor: &Arc<dyn Executor>,
        stage: &Stage,
        tx: &mpsc::Sender<RunEvent>,
    ) -> StageOutcome {
        let jobs = match stage.policy {
            Concurrency::Concurrent => {
                // All members start together; the stage completes only
                // when every member has finished, whatever their outcome.
                join_all(
                    stage
                        .jobs
                        .iter()
                        .map(|spec| Self::execute_job(executor, &stage.name, spec.clone(), tx)),
                )
                .await
            }
            Concurrency::Serial => {
                let mut outcomes = Vec::with_capacity(stage.jobs.len());
                for spec in &stage.jobs {
                    let outcome =
                        Self::execute_job(executor, &stage.name, spec.clone(), tx).await;
                    let stop = outcome.counts_as_failure();
                    outcomes.push(outcome);
                    if stop {
                        break;
                    }
                }
                outcomes
            }
        };

        StageOutcome {
            name: stage.name.clone(),
            jobs,
        }
    }

    async fn execute_job(
        executor: &Arc<dyn Executor>,
        stage: &str,
        spec: JobSpec,
        tx: &mpsc::Sender<RunEvent>,
    ) -> JobOutcome {
        let name = spec.name.clone();
        let fallible = spec.fallible;

        let _ = tx
            .send(RunEvent::JobStarted {
                stage: stage.to_string(),
                job: name.clone(),
            })
            .await;

        let state = Self::drive_job(executor, spec, tx).await;

        if let JobState::Failed { message } = &state {
            if fallible {
                warn!(job = %name, message = %message, "Fallible job failed; continuing");
            } else {
                error!(job = %name, message = %message, "Job failed");
            }
        }

        let _ = tx
            .send(RunEvent::JobCompleted {
                stage: stage.to_string(),
                job: name.clone(),
                success: matches!(state, JobState::Succeeded),
                fallible,
            })
            .await;

        JobOutcome {
            name,
            fallible,
            state,
        }
    }

    async fn drive_job(
        executor: &Arc<dyn Executor>,
        spec: JobSpec,
        tx: &mpsc::Sender<RunEvent>,
    ) -> JobState {
        let name = spec.name.clone();
        info!(job = %name, image = %spec.image, "Spawning job");

        let handle = match executor.spawn(spec).await {
            Ok(handle) => handle,
            Err(e) => {
                return JobState::Failed {
                    message: format!("failed to spawn: {e}"),
                };
            }
        };

        // Forward logs while the job runs.
        let log_handle = match executor.logs(&handle).await {
            Ok(mut stream) => {
                let tx = tx.clone();
                let job = name.clone();
                Some(tokio::spawn(async move {
                    while let Some(line) = stream.next().await {
                        let _ = tx
                            .send(RunEvent::JobLog {
                                job: job.clone(),
                                line,
                            })
                            .await;
                    }
                }))
            }
            Err(e) => {
                warn!(job = %name, error = %e, "Failed to stream logs");
                None
            }
        };

        let result = executor.wait(&handle).await;

        // The log task may still be following a stopped container.
        if let Some(log_handle) = log_handle {
            log_handle.abort();
            let _ = log_handle.await;
        }

        match result {
            Ok(result) if result.status.is_success() => JobState::Succeeded,
            Ok(result) => JobState::Failed {
                message: match result.exit_code {
                    Some(code) => format!("exited with code {code}"),
                    None => "did not succeed".to_string(),
                },
            },
            Err(e) => JobState::Failed {
                message: format!("failed to wait: {e}"),
            },
        }
    }
}
