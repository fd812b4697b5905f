//! Shared-dependency scope handed to remote containers.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// One library instance offered through a share scope.
#[derive(Clone)]
pub struct SharedDependency {
    pub name: String,
    pub version: String,
    /// Only one instance may exist across host and remotes
    pub singleton: bool,
    /// Version range the provider expects consumers to honour
    pub required_version: Option<String>,
    instance: Arc<dyn Any + Send + Sync>,
}

impl SharedDependency {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        instance: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            singleton: false,
            required_version: None,
            instance,
        }
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn requires(mut self, range: impl Into<String>) -> Self {
        self.required_version = Some(range.into());
        self
    }

    /// Downcast the provided instance.
    pub fn instance<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.instance).downcast::<T>().ok()
    }
}

impl std::fmt::Debug for SharedDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDependency")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("singleton", &self.singleton)
            .field("required_version", &self.required_version)
            .finish_non_exhaustive()
    }
}

/// Named set of shared library instances.
///
/// The host populates its scope before any container is initialized, so
/// remotes reuse host singletons instead of bringing their own. Remotes may
/// add dependencies of their own while initializing.
#[derive(Debug)]
pub struct SharedScope {
    name: String,
    dependencies: RwLock<BTreeMap<String, SharedDependency>>,
}

impl SharedScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add a dependency to the scope, builder style.
    pub fn with(self, dependency: SharedDependency) -> Self {
        self.provide(dependency);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offer a dependency.
    ///
    /// Returns `false` when a singleton of the same name is already present;
    /// the first provider keeps ownership.
    pub fn provide(&self, dependency: SharedDependency) -> bool {
        let mut deps = self
            .dependencies
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = deps.get(&dependency.name) {
            if existing.singleton || dependency.singleton {
                log::debug!(
                    "Share scope '{}' keeps {}@{} over {}@{}",
                    self.name,
                    existing.name,
                    existing.version,
                    dependency.name,
                    dependency.version
                );
                return false;
            }
        }
        deps.insert(dependency.name.clone(), dependency);
        true
    }

    pub fn get(&self, name: &str) -> Option<SharedDependency> {
        self.dependencies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Names of every dependency currently in scope.
    pub fn names(&self) -> Vec<String> {
        self.dependencies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
