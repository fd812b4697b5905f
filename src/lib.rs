//! Remote loader - runtime composition of independently versioned remote modules.
//!
//! A host resolves `(remote, component)` pairs through a manifest that maps
//! each remote to its active version and artifact locations. Each artifact is
//! fetched and executed at most once, each remote container is initialized at
//! most once against the host share scope, and failures stay confined to the
//! slot that asked for the component.

mod defaults;
pub mod error;

pub mod boundary;
pub mod config;
pub mod container;
pub mod loader;
pub mod manifest;
pub mod resolver;
pub mod transport;

pub use error::{Error, Result};

pub use config::LoaderConfig;
pub use transport::{Fetch, FetchError, HttpFetcher};

pub use manifest::{
    build_manifest, ManifestEntry, ManifestError, ManifestStore, RemoteBuild, RemoteDescriptor,
    RemoteManifest,
};

pub use loader::{ArtifactExecutor, ArtifactLoadError, ArtifactLoader, SingleFlight};

pub use container::{
    Component, Container, ContainerError, ContainerInitializer, ContainerRegistry, ContainerTable,
    ModuleFactory, Props, RemoteModule, SharedDependency, SharedScope,
};

pub use resolver::{
    LoaderState, ModuleResolver, RemoteStatus, ResolveError, ResolvedComponent, VersionOverrides,
};

pub use boundary::{default_error_fallback, default_fallback, BoundaryError, RemoteSlot, SlotState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
