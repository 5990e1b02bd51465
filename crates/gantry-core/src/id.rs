//! Job identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a single job invocation.
/// Uses UUIDv7 so identifiers sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new unique JobId.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Short form used in container names: the last 12 hex digits.
    pub fn short(&self) -> String {
        let s = self.0.simple().to_string();
        s[s.len() - 12..].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_length() {
        let id = JobId::new();
        assert_eq!(id.short().len(), 12);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }
}
