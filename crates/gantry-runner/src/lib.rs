//! Pipeline composition and execution for Gantry.
//!
//! Arranges job descriptors into ordered stages and drives them through
//! an executor: stages run strictly in order, a concurrent stage's
//! members run together, and fallible failures never abort the run.

pub mod composer;

pub use composer::{JobOutcome, JobState, PipelineOutcome, PipelineRunner, RunEvent, StageOutcome};
