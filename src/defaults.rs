//! Default values for loader configuration.

pub const MANIFEST_URL: &str = "http://localhost:3000/remotes-manifest.json";
pub const SHARE_SCOPE: &str = "default";
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const MAX_ATTEMPTS: u32 = 1;

/// File name every remote build exposes its container entry under.
pub const REMOTE_ENTRY_FILE: &str = "remoteEntry.js";

pub fn manifest_url() -> String { MANIFEST_URL.to_string() }
pub fn share_scope() -> String { SHARE_SCOPE.to_string() }
pub fn request_timeout_secs() -> u64 { REQUEST_TIMEOUT_SECS }
pub fn max_attempts() -> u32 { MAX_ATTEMPTS }
