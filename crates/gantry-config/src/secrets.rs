//! Secrets loading.
//!
//! Project credentials arrive as a JSON object of plain string pairs,
//! optionally overridden by `GANTRY_SECRET_<key>` environment variables.
//! The result is a read-only [`SecretBag`]; no secret store is contacted
//! from this layer.

use std::collections::HashMap;
use std::path::Path;

use gantry_core::secret::SecretBag;

use crate::{ConfigError, ConfigResult};

/// Environment prefix for individual secret overrides.
const ENV_PREFIX: &str = "GANTRY_SECRET_";

/// Load secrets from a JSON file, then apply environment overrides.
pub fn load_secrets(path: &Path) -> ConfigResult<SecretBag> {
    let raw = std::fs::read_to_string(path)?;
    let mut values: HashMap<String, String> = serde_json::from_str(&raw)?;
    apply_env_overrides(&mut values, std::env::vars());
    Ok(SecretBag::new(values))
}

/// Build a secret bag from environment variables alone.
pub fn secrets_from_env() -> SecretBag {
    let mut values = HashMap::new();
    apply_env_overrides(&mut values, std::env::vars());
    SecretBag::new(values)
}

fn apply_env_overrides(
    values: &mut HashMap<String, String>,
    vars: impl Iterator<Item = (String, String)>,
) {
    for (key, value) in vars {
        if let Some(name) = key.strip_prefix(ENV_PREFIX) {
            if !name.is_empty() {
                values.insert(name.to_string(), value);
            }
        }
    }
}

/// Read a required environment variable.
pub fn required_env(name: &str) -> ConfigResult<String> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}
