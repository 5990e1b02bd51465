//! Job descriptor and execution status types.
//!
//! A [`JobSpec`] describes one containerized unit of work. Specs are built
//! per trigger event, handed to an executor, and discarded when the run
//! completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::JobId;

/// Specification for a job to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique identifier for this invocation.
    pub id: JobId,
    /// Job name, unique within a run (e.g. "test-unit").
    pub name: String,
    /// Container image to run.
    pub image: String,
    /// Command to execute.
    pub command: Vec<String>,
    /// Arguments to the command.
    pub args: Vec<String>,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Working directory inside the container.
    pub working_dir: Option<String>,
    /// Where the project source is mounted inside the container.
    pub source_mount_path: Option<String>,
    /// Volumes to mount.
    pub volumes: Vec<VolumeMount>,
    /// Secondary containers started alongside the primary.
    pub sidecars: Vec<SidecarSpec>,
    /// A fallible job's failure is recorded but never aborts the
    /// containing stage or pipeline.
    pub fallible: bool,
    /// Maximum execution time, enforced by the executor.
    pub timeout: Option<Duration>,
}

impl JobSpec {
    /// A minimal spec with the given name and image; everything else empty.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            source_mount_path: None,
            volumes: Vec::new(),
            sidecars: Vec::new(),
            fallible: false,
            timeout: None,
        }
    }
}

/// A secondary container run next to the primary, sharing its network
/// namespace. Used for daemon patterns such as docker-in-docker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarSpec {
    /// Sidecar name (unique within the job).
    pub name: String,
    /// Container image to run.
    pub image: String,
    /// Command override; empty means the image entrypoint.
    pub command: Vec<String>,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Whether the sidecar runs privileged.
    pub privileged: bool,
}

/// A volume mount specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Host path or volume name.
    pub source: String,
    /// Path to mount in the container.
    pub mount_path: String,
    /// Whether the mount is read-only.
    pub read_only: bool,
}

/// Handle to a running or completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    /// The job ID.
    pub id: JobId,
    /// Job name, for logging.
    pub name: String,
    /// Executor-specific identifier of the primary container.
    pub executor_id: String,
    /// Executor-specific identifiers of sidecar containers.
    pub sidecar_ids: Vec<String>,
    /// Name of the executor running this job.
    pub executor_name: String,
    /// Maximum execution time, copied from the spec at spawn.
    pub timeout: Option<Duration>,
}

/// Status of a job execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobStatus {
    /// Job is waiting to start.
    Pending,
    /// Job is currently running.
    Running { started_at: DateTime<Utc> },
    /// Job completed successfully.
    Succeeded {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Job failed.
    Failed {
        started_at: Option<DateTime<Utc>>,
        finished_at: DateTime<Utc>,
        exit_code: Option<i32>,
        message: String,
    },
    /// Job was cancelled.
    Cancelled {
        started_at: Option<DateTime<Utc>>,
        cancelled_at: DateTime<Utc>,
    },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded { .. } | JobStatus::Failed { .. } | JobStatus::Cancelled { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded { .. })
    }
}

/// Result of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Final status.
    pub status: JobStatus,
    /// Exit code if available.
    pub exit_code: Option<i32>,
}

/// A line of log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LogStream {
    Stdout,
    Stderr,
    System,
}
