//! Trigger event context.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::secret::SecretBag;

/// Refs like `refs/tags/v2`, `refs/tags/v2.1.0`, `refs/tags/v2.1.0-rc.3`
/// mark a formal release; the capture is the version string itself.
static RELEASE_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^refs/tags/(v[0-9]+(?:\.[0-9]+)*(?:-.+)?)$").unwrap());

/// Read-only metadata describing the trigger that initiated a run.
///
/// Built once per delivery from the gateway's event, then handed to the
/// job factories; nothing in the glue layer mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventContext {
    /// Event source (e.g. "brigade.sh/github").
    pub source: String,
    /// Event name (e.g. "check_suite:requested").
    pub event: String,
    /// Project identifier; check-run names are prefixed with it.
    pub project_id: String,
    /// Git ref the event refers to, when the provider supplies one.
    pub git_ref: Option<String>,
    /// Provider labels / qualifiers attached to the event.
    pub labels: BTreeMap<String, String>,
    /// Project credentials.
    pub secrets: SecretBag,
    /// Raw provider payload.
    pub payload: serde_json::Value,
}

impl EventContext {
    pub fn new(
        source: impl Into<String>,
        event: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            event: event.into(),
            project_id: project_id.into(),
            git_ref: None,
            labels: BTreeMap::new(),
            secrets: SecretBag::default(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }

    pub fn with_secrets(mut self, secrets: SecretBag) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// The version string when the event's ref is a release tag.
    ///
    /// `refs/tags/v1.2.3` yields `v1.2.3`; any ref not matching the
    /// release pattern yields `None`.
    pub fn release_version(&self) -> Option<&str> {
        let git_ref = self.git_ref.as_deref()?;
        RELEASE_TAG_REGEX
            .captures(git_ref)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Whether the event's ref names the given branch.
    pub fn is_branch(&self, branch: &str) -> bool {
        match self.git_ref.as_deref() {
            Some(r) => r == branch || r == format!("refs/heads/{branch}"),
            None => false,
        }
    }
}
