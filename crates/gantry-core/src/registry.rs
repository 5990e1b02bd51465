//! Name-keyed registry of job factories.
//!
//! When a re-run event asks for a single job by name, this is where it is
//! looked up. The registry is populated once at startup; looking up an
//! unknown name is an error, never a silent no-op.

use std::collections::BTreeMap;

use crate::event::EventContext;
use crate::job::JobSpec;
use crate::{Error, Result};

/// Factory producing a job descriptor from an event.
pub type JobFactory = Box<dyn Fn(&EventContext) -> Result<JobSpec> + Send + Sync>;

/// Mapping from job name to factory function.
#[derive(Default)]
pub struct JobRegistry {
    factories: BTreeMap<String, JobFactory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a name. Each name maps to exactly one
    /// factory; registering twice is an error.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&EventContext) -> Result<JobSpec> + Send + Sync + 'static,
    ) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::DuplicateJob(name));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Produce the descriptor for a named job.
    pub fn produce(&self, name: &str, ctx: &EventContext) -> Result<JobSpec> {
        match self.factories.get(name) {
            Some(factory) => factory(ctx),
            None => Err(Error::UnknownJob(name.to_string())),
        }
    }

    /// Registered job names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx() -> EventContext {
        EventContext::new("brigade.sh/github", "check_run:rerequested", "gateway")
    }

    #[test]
    fn test_unknown_job_is_an_error() {
        let registry = JobRegistry::new();
        let err = registry.produce("test-unit", &test_ctx()).unwrap_err();
        assert!(matches!(err, Error::UnknownJob(name) if name == "test-unit"));
    }

    #[test]
    fn test_registered_job_is_produced() {
        let mut registry = JobRegistry::new();
        registry
            .register("lint", |_ctx| {
                Ok(JobSpec::new("lint", "brigadecore/go-tools:v0.1.0"))
            })
            .unwrap();

        let spec = registry.produce("lint", &test_ctx()).unwrap();
        assert_eq!(spec.name, "lint");
        assert_eq!(spec.image, "brigadecore/go-tools:v0.1.0");
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let mut registry = JobRegistry::new();
        registry
            .register("lint", |_ctx| Ok(JobSpec::new("lint", "a")))
            .unwrap();
        let err = registry
            .register("lint", |_ctx| Ok(JobSpec::new("lint", "b")))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateJob(name) if name == "lint"));
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = JobRegistry::new();
        for name in ["push", "build", "lint"] {
            registry
                .register(name, move |_ctx| Ok(JobSpec::new("x", "img")))
                .unwrap();
        }
        assert_eq!(registry.names(), vec!["build", "lint", "push"]);
    }
}
