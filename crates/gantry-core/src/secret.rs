//! Read-only credential bag.
//!
//! Secrets are loaded once at startup and never mutated; the storage
//! backend that produced them is an external collaborator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// A read-only key-value bag of credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretBag {
    values: HashMap<String, String>,
}

impl SecretBag {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Get a secret value, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Get a secret value, failing with [`Error::MissingSecret`] if absent.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::MissingSecret(key.to_string()))
    }

    /// Get a secret value, falling back to a default if absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for SecretBag {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_missing() {
        let bag = SecretBag::default();
        let err = bag.require("dockerhubPassword").unwrap_err();
        assert!(matches!(err, Error::MissingSecret(k) if k == "dockerhubPassword"));
    }

    #[test]
    fn test_get_or_default() {
        let bag: SecretBag = [("helmOrg".to_string(), "brigadecore".to_string())]
            .into_iter()
            .collect();
        assert_eq!(bag.get_or("helmRegistry", "ghcr.io"), "ghcr.io");
        assert_eq!(bag.get_or("helmOrg", "unused"), "brigadecore");
    }
}
