//! Core domain types and traits for the Gantry CI glue layer.
//!
//! This crate contains:
//! - Job identifiers and descriptor types
//! - Executor trait for the external execution platform
//! - Stage and pipeline definitions
//! - Event context for trigger metadata
//! - Secret bag and the job registry

pub mod error;
pub mod event;
pub mod executor;
pub mod id;
pub mod job;
pub mod pipeline;
pub mod registry;
pub mod secret;

pub use error::{Error, Result};
pub use id::JobId;
