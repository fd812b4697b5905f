//! Loader configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Runtime configuration for the remote loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Where the remotes manifest document is fetched from
    #[serde(default = "defaults::manifest_url")]
    pub manifest_url: String,
    /// Name of the host share scope handed to every container
    #[serde(default = "defaults::share_scope")]
    pub share_scope: String,
    /// Per-request timeout for manifest and artifact fetches
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Transport-level attempts per fetch (1 means no retry)
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            manifest_url: defaults::manifest_url(),
            share_scope: defaults::share_scope(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            max_attempts: defaults::MAX_ATTEMPTS,
        }
    }
}

impl LoaderConfig {
    /// Build a configuration from defaults overridden by environment variables.
    ///
    /// Recognized variables:
    /// - `REMOTES_MANIFEST_URL`
    /// - `REMOTES_SHARE_SCOPE`
    /// - `REMOTES_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("REMOTES_MANIFEST_URL").filter(|v| !v.trim().is_empty()) {
            self.manifest_url = url.trim().to_string();
        }
        if let Some(scope) = lookup("REMOTES_SHARE_SCOPE").filter(|v| !v.trim().is_empty()) {
            self.share_scope = scope.trim().to_string();
        }
        if let Some(raw) = lookup("REMOTES_REQUEST_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => log::warn!(
                    "Ignoring invalid REMOTES_REQUEST_TIMEOUT_SECS value '{}'",
                    raw
                ),
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
