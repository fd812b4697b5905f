//! Manifest document types.
//!
//! Wire format (keys are remote names, versions and component names):
//!
//! ```json
//! {
//!   "cart": {
//!     "activeVersion": "2.0.0",
//!     "versions": {
//!       "2.0.0": {
//!         "CartWidget": {
//!           "url": "http://localhost:3001/v2.0.0/remoteEntry.js",
//!           "scope": "cart",
//!           "module": "./CartWidget",
//!           "version": "2.0.0"
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Component name -> entry, for a single version of a remote.
pub type VersionEntries = BTreeMap<String, ManifestEntry>;

/// One loadable artifact and the module to extract from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Location of the remote entry artifact
    pub url: String,
    /// Name the artifact registers its container under
    pub scope: String,
    /// Module path requested from the container
    #[serde(rename = "module")]
    pub module_path: String,
    /// Version this entry belongs to
    pub version: String,
    /// Optional hex SHA-256 of the artifact bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

/// All published versions of one remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDescriptor {
    pub active_version: String,
    pub versions: BTreeMap<String, VersionEntries>,
}

impl RemoteDescriptor {
    /// Published version strings, in manifest key order.
    pub fn version_names(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }
}

/// The full manifest, keyed by remote name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteManifest {
    remotes: BTreeMap<String, RemoteDescriptor>,
}

impl RemoteManifest {
    pub fn new(remotes: BTreeMap<String, RemoteDescriptor>) -> Self {
        Self { remotes }
    }

    /// Parse a manifest document.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Serialize with two-space indentation.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn remote(&self, name: &str) -> Option<&RemoteDescriptor> {
        self.remotes.get(name)
    }

    pub fn remotes(&self) -> impl Iterator<Item = (&String, &RemoteDescriptor)> {
        self.remotes.iter()
    }

    pub fn insert(&mut self, name: impl Into<String>, descriptor: RemoteDescriptor) {
        self.remotes.insert(name.into(), descriptor);
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }
}
