//! Error types for the remote loader.

use thiserror::Error;

/// Remote loader error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error("Fetch error: {0}")]
    Fetch(#[from] crate::transport::FetchError),

    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(#[from] crate::manifest::ManifestError),

    /// Artifact loading error
    #[error("Artifact error: {0}")]
    Artifact(#[from] crate::loader::ArtifactLoadError),

    /// Container error
    #[error("Container error: {0}")]
    Container(#[from] crate::container::ContainerError),

    /// Component resolution error
    #[error("Resolution error: {0}")]
    Resolve(#[from] crate::resolver::ResolveError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for remote loader operations.
pub type Result<T> = std::result::Result<T, Error>;
