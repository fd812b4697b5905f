//! Component resolution: manifest -> version -> artifact -> container -> module.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::config::LoaderConfig;
use crate::container::{
    Component, ContainerError, ContainerInitializer, ContainerRegistry, SharedScope,
};
use crate::loader::{ArtifactExecutor, ArtifactLoadError, ArtifactLoader};
use crate::manifest::{ManifestEntry, ManifestError, ManifestStore};
use crate::resolver::overrides::VersionOverrides;
use crate::transport::{Fetch, HttpFetcher};

/// Reasons a component could not be resolved.
///
/// None of these are fatal to the host; they are meant to be contained by
/// the composition boundary of the slot that requested the component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Remote manifest unavailable: {reason}")]
    ManifestUnavailable { reason: String },

    #[error("Remote '{remote}' not found in manifest")]
    RemoteNotFound { remote: String },

    #[error("Version '{version}' not found for remote '{remote}'")]
    VersionNotFound { remote: String, version: String },

    #[error("Component '{component}' not found in {remote}@{version}")]
    ComponentNotFound {
        remote: String,
        component: String,
        version: String,
    },

    #[error("Failed to load remote entry {url}: {reason}")]
    ArtifactLoad { url: String, reason: String },

    #[error("Remote container '{scope}' not found after loading its entry")]
    ContainerNotFound { scope: String },

    #[error("Remote container '{scope}' failed to initialize: {reason}")]
    ContainerInit { scope: String, reason: String },

    #[error("Module '{module_path}' not found in remote '{scope}'")]
    ModuleNotFound { scope: String, module_path: String },

    #[error("Module '{module_path}' of remote '{scope}' failed to load: {reason}")]
    ModuleFactory {
        scope: String,
        module_path: String,
        reason: String,
    },
}

impl From<ManifestError> for ResolveError {
    fn from(err: ManifestError) -> Self {
        ResolveError::ManifestUnavailable {
            reason: err.to_string(),
        }
    }
}

impl From<ArtifactLoadError> for ResolveError {
    fn from(err: ArtifactLoadError) -> Self {
        ResolveError::ArtifactLoad {
            url: err.url,
            reason: err.reason,
        }
    }
}

impl From<ContainerError> for ResolveError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::NotFound { scope } => ResolveError::ContainerNotFound { scope },
            ContainerError::Init { scope, reason } => ResolveError::ContainerInit { scope, reason },
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// A successfully resolved remote component.
#[derive(Clone)]
pub struct ResolvedComponent {
    pub remote: String,
    pub component_name: String,
    /// Manifest entry the component was loaded from
    pub entry: ManifestEntry,
    /// Default export of the module
    pub component: Arc<dyn Component>,
}

impl std::fmt::Debug for ResolvedComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedComponent")
            .field("remote", &self.remote)
            .field("component_name", &self.component_name)
            .field("entry", &self.entry)
            .field("component", &self.component.name())
            .finish()
    }
}

/// Version information for one remote, as shown to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStatus {
    pub name: String,
    /// Version resolution currently uses
    pub active_version: String,
    /// Version the manifest declares active
    pub default_version: String,
    pub overridden: bool,
    pub versions: Vec<String>,
}

/// Artifacts and scopes a remote has been resolved through.
#[derive(Debug, Default)]
struct Footprint {
    urls: HashSet<String>,
    scopes: HashSet<String>,
}

/// Every cache the resolver keys on, owned by one composition root.
pub struct LoaderState {
    pub manifest: ManifestStore,
    pub overrides: VersionOverrides,
    pub artifacts: Arc<ArtifactLoader>,
    pub containers: ContainerInitializer,
    footprints: Mutex<HashMap<String, Footprint>>,
    generations: Mutex<HashMap<String, u64>>,
}

impl LoaderState {
    pub fn new(
        manifest_url: impl Into<String>,
        fetcher: Arc<dyn Fetch>,
        executor: Arc<dyn ArtifactExecutor>,
        registry: Arc<dyn ContainerRegistry>,
    ) -> Self {
        Self {
            manifest: ManifestStore::new(manifest_url, Arc::clone(&fetcher)),
            overrides: VersionOverrides::new(),
            artifacts: Arc::new(ArtifactLoader::new(fetcher, executor)),
            containers: ContainerInitializer::new(registry),
            footprints: Mutex::new(HashMap::new()),
            generations: Mutex::new(HashMap::new()),
        }
    }

    fn record(&self, remote: &str, entry: &ManifestEntry) {
        let mut footprints = self.footprints();
        let footprint = footprints.entry(remote.to_string()).or_default();
        footprint.urls.insert(entry.url.clone());
        footprint.scopes.insert(entry.scope.clone());
    }

    /// Bumped every time `remote` is invalidated.
    fn generation(&self, remote: &str) -> u64 {
        lock(&self.generations).get(remote).copied().unwrap_or(0)
    }

    /// Drop every cache entry tied to `remote`.
    fn invalidate(&self, remote: &str) {
        self.manifest.invalidate();

        let footprint = self.footprints().remove(remote).unwrap_or_default();
        for url in &footprint.urls {
            self.artifacts.evict(url);
        }
        for scope in &footprint.scopes {
            self.containers.evict(scope);
        }
        self.containers.evict(remote);
        *lock(&self.generations).entry(remote.to_string()).or_default() += 1;

        log::debug!(
            "Invalidated remote '{}': {} artifact(s), {} scope(s)",
            remote,
            footprint.urls.len(),
            footprint.scopes.len()
        );
    }

    fn footprints(&self) -> MutexGuard<'_, HashMap<String, Footprint>> {
        lock(&self.footprints)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves `(remote, component)` pairs to loaded components.
pub struct ModuleResolver {
    state: LoaderState,
    shared: Arc<SharedScope>,
}

impl ModuleResolver {
    pub fn new(state: LoaderState, shared: Arc<SharedScope>) -> Self {
        Self { state, shared }
    }

    /// Build a resolver that fetches over HTTP according to `config`.
    pub fn from_config(
        config: &LoaderConfig,
        executor: Arc<dyn ArtifactExecutor>,
        registry: Arc<dyn ContainerRegistry>,
    ) -> Self {
        let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(config));
        let state = LoaderState::new(config.manifest_url.clone(), fetcher, executor, registry);
        Self::new(state, Arc::new(SharedScope::new(config.share_scope.clone())))
    }

    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    /// Host share scope handed to every container.
    pub fn shared_scope(&self) -> &SharedScope {
        &self.shared
    }

    /// Resolve, load and instantiate a remote component.
    ///
    /// A resolution overtaken by a version override of the same remote is
    /// started over, so the result always reflects the latest override.
    pub async fn resolve_component(
        &self,
        remote: &str,
        component: &str,
    ) -> Result<ResolvedComponent> {
        loop {
            let generation = self.state.generation(remote);
            let outcome = self.resolve_once(remote, component).await;
            if self.state.generation(remote) == generation {
                return outcome;
            }
            log::debug!(
                "Version of '{}' changed while resolving {}, resolving again",
                remote,
                component
            );
        }
    }

    async fn resolve_once(&self, remote: &str, component: &str) -> Result<ResolvedComponent> {
        let entry = self.resolve_entry(remote, component).await?;
        self.state.record(remote, &entry);

        self.state
            .artifacts
            .load(&entry.url, entry.integrity.as_deref())
            .await?;

        let container = self
            .state
            .containers
            .ensure_initialized(&entry.scope, &self.shared)
            .await?;

        let factory = container
            .get(&entry.module_path)
            .await
            .ok_or_else(|| ResolveError::ModuleNotFound {
                scope: entry.scope.clone(),
                module_path: entry.module_path.clone(),
            })?;

        let module = factory
            .create()
            .await
            .map_err(|reason| ResolveError::ModuleFactory {
                scope: entry.scope.clone(),
                module_path: entry.module_path.clone(),
                reason,
            })?;

        log::debug!(
            "Resolved {}/{} from {}@{}",
            remote,
            component,
            entry.scope,
            entry.version
        );

        Ok(ResolvedComponent {
            remote: remote.to_string(),
            component_name: component.to_string(),
            entry,
            component: module.default,
        })
    }

    /// Find the manifest entry a component would be loaded from, without loading it.
    pub async fn resolve_entry(&self, remote: &str, component: &str) -> Result<ManifestEntry> {
        let manifest = self.state.manifest.load().await?;
        let descriptor = manifest
            .remote(remote)
            .ok_or_else(|| ResolveError::RemoteNotFound {
                remote: remote.to_string(),
            })?;

        let version = self
            .state
            .overrides
            .get(remote)
            .unwrap_or_else(|| descriptor.active_version.clone());

        let entries =
            descriptor
                .versions
                .get(&version)
                .ok_or_else(|| ResolveError::VersionNotFound {
                    remote: remote.to_string(),
                    version: version.clone(),
                })?;

        entries
            .get(component)
            .cloned()
            .ok_or_else(|| ResolveError::ComponentNotFound {
                remote: remote.to_string(),
                component: component.to_string(),
                version,
            })
    }

    /// Pin `remote` to `version` and drop every cache keyed on its previous version.
    ///
    /// The version is not validated; pinning a missing version surfaces as
    /// `VersionNotFound` on the next resolution of that remote only.
    pub fn set_version_override(&self, remote: &str, version: &str) {
        let previous = self.state.overrides.set(remote, version);
        log::info!(
            "Version override for '{}': {} -> {}",
            remote,
            previous.as_deref().unwrap_or("manifest default"),
            version
        );
        self.state.invalidate(remote);
    }

    /// Return `remote` to its manifest-declared version.
    pub fn clear_version_override(&self, remote: &str) {
        if let Some(previous) = self.state.overrides.remove(remote) {
            log::info!(
                "Cleared version override {} for '{}'",
                previous,
                remote
            );
            self.state.invalidate(remote);
        }
    }

    /// Copy of all current overrides.
    pub fn version_overrides(&self) -> BTreeMap<String, String> {
        self.state.overrides.snapshot()
    }

    /// Best-effort background fetch of an artifact. Never fails.
    pub fn prefetch_artifact(&self, url: &str) {
        self.state.artifacts.prefetch(url);
    }

    /// Per-remote version information for an operator control surface.
    pub async fn remote_statuses(&self) -> Result<Vec<RemoteStatus>> {
        let manifest = self.state.manifest.load().await?;
        let overrides = self.state.overrides.snapshot();

        Ok(manifest
            .remotes()
            .map(|(name, descriptor)| {
                let pinned = overrides.get(name);
                RemoteStatus {
                    name: name.clone(),
                    active_version: pinned
                        .cloned()
                        .unwrap_or_else(|| descriptor.active_version.clone()),
                    default_version: descriptor.active_version.clone(),
                    overridden: pinned.is_some(),
                    versions: descriptor.version_names(),
                }
            })
            .collect())
    }
}
