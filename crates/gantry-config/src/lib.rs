//! Configuration loading for Gantry.
//!
//! This crate handles:
//! - Project definitions (gantry.kdl)
//! - Secrets files and environment overrides

pub mod error;
pub mod project;
pub mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use project::{Images, ProjectConfig};
pub use secrets::{load_secrets, secrets_from_env};
