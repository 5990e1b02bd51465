//! Job execution backends for Gantry.
//!
//! The glue layer delegates all scheduling and container mechanics to an
//! execution platform; this crate provides the local Docker adapter.

pub mod docker;

pub use docker::DockerExecutor;
pub use gantry_core::executor::Executor;
pub use gantry_core::job::{JobHandle, JobResult, JobSpec, JobStatus, LogLine, LogStream};
