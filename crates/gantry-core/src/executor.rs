//! Executor trait for the external job-execution platform.
//!
//! Executors run jobs in isolated containers. Scheduling, cancellation,
//! and timeouts live behind this boundary; the glue layer only observes
//! success and failure.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::Result;
use crate::job::{JobHandle, JobResult, JobSpec, JobStatus, LogLine};

/// Trait for job executors.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Name of this executor.
    fn name(&self) -> &'static str;

    /// Spawn a new job.
    async fn spawn(&self, spec: JobSpec) -> Result<JobHandle>;

    /// Get a stream of log lines from a job.
    async fn logs(&self, handle: &JobHandle) -> Result<BoxStream<'static, LogLine>>;

    /// Get the current status of a job.
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus>;

    /// Wait for a job to complete.
    async fn wait(&self, handle: &JobHandle) -> Result<JobResult>;

    /// Cancel a running job.
    async fn cancel(&self, handle: &JobHandle) -> Result<()>;
}
