//! Remote manifest handling.
//!
//! The manifest maps every remote to its active version and, per version,
//! the artifact location of each exposed component.

pub mod builder;
pub mod store;
pub mod types;

use thiserror::Error;

pub use builder::{build_manifest, RemoteBuild};
pub use store::ManifestStore;
pub use types::{ManifestEntry, RemoteDescriptor, RemoteManifest, VersionEntries};

/// Errors that can occur while obtaining the manifest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Failed to fetch manifest from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Manifest from {url} is malformed: {reason}")]
    Malformed { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ManifestError>;
