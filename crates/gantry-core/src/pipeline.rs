//! Pipeline and stage definitions.
//!
//! A pipeline is an ordered sequence of stages; a later stage starts only
//! if every job in the previous stage succeeded (fallible failures aside).

use serde::{Deserialize, Serialize};

use crate::job::JobSpec;

/// How the jobs inside a stage are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Concurrency {
    /// Members run one at a time, in order.
    Serial,
    /// Members are started together; the stage completes when all of
    /// them have finished. No ordering guarantee among members.
    Concurrent,
}

/// A group of jobs with a concurrency policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name.
    pub name: String,
    /// Scheduling policy for the member jobs.
    pub policy: Concurrency,
    /// Member jobs.
    pub jobs: Vec<JobSpec>,
}

impl Stage {
    /// A stage whose members run concurrently.
    pub fn concurrent(name: impl Into<String>, jobs: Vec<JobSpec>) -> Self {
        Self {
            name: name.into(),
            policy: Concurrency::Concurrent,
            jobs,
        }
    }

    /// A stage whose members run one after another.
    pub fn serial(name: impl Into<String>, jobs: Vec<JobSpec>) -> Self {
        Self {
            name: name.into(),
            policy: Concurrency::Serial,
            jobs,
        }
    }
}

/// An ordered sequence of stages, executed top to bottom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name (e.g. "ci", "release").
    pub name: String,
    /// Stages, in execution order.
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    /// Total number of jobs across all stages.
    pub fn job_count(&self) -> usize {
        self.stages.iter().map(|s| s.jobs.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_count() {
        let pipeline = Pipeline::new(
            "ci",
            vec![
                Stage::concurrent(
                    "checks",
                    vec![JobSpec::new("test-unit", "img"), JobSpec::new("lint", "img")],
                ),
                Stage::serial("build", vec![JobSpec::new("build", "img")]),
            ],
        );
        assert_eq!(pipeline.job_count(), 3);
        assert_eq!(pipeline.stages[0].policy, Concurrency::Concurrent);
        assert_eq!(pipeline.stages[1].policy, Concurrency::Serial);
    }
}
