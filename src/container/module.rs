//! Containers, module factories and the components they export.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::container::scope::SharedScope;

/// Caller-supplied properties forwarded to a rendered component.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// A renderable unit exported by a remote.
pub trait Component: Send + Sync {
    /// Display name of the component
    fn name(&self) -> &str;

    /// Render with the given properties.
    fn render(&self, props: &Props) -> String;
}

/// The exports produced by invoking a module factory.
#[derive(Clone)]
pub struct RemoteModule {
    pub default: Arc<dyn Component>,
    pub named: BTreeMap<String, Arc<dyn Component>>,
}

impl RemoteModule {
    pub fn new(default: Arc<dyn Component>) -> Self {
        Self {
            default,
            named: BTreeMap::new(),
        }
    }

    pub fn with_export(mut self, name: impl Into<String>, component: Arc<dyn Component>) -> Self {
        self.named.insert(name.into(), component);
        self
    }
}

/// Produces a module's exports on demand.
#[async_trait]
pub trait ModuleFactory: Send + Sync {
    async fn create(&self) -> Result<RemoteModule, String>;
}

/// Runtime object a remote entry registers itself under.
#[async_trait]
pub trait Container: Send + Sync {
    /// One-time initialization against the host share scope.
    async fn init(&self, shared: &SharedScope) -> Result<(), String>;

    /// Look up the factory for an exposed module path.
    async fn get(&self, module_path: &str) -> Option<Arc<dyn ModuleFactory>>;
}

/// Lookup of containers by scope name.
pub trait ContainerRegistry: Send + Sync {
    fn lookup(&self, scope: &str) -> Option<Arc<dyn Container>>;
}

/// In-process container namespace.
///
/// Artifact executors register containers here; the loader resolves them by
/// scope. Registering under an existing scope replaces the previous container.
#[derive(Default)]
pub struct ContainerTable {
    containers: RwLock<HashMap<String, Arc<dyn Container>>>,
}

impl ContainerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, scope: impl Into<String>, container: Arc<dyn Container>) {
        let scope = scope.into();
        log::debug!("Registering container '{}'", scope);
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scope, container);
    }

    pub fn unregister(&self, scope: &str) -> bool {
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(scope)
            .is_some()
    }
}

impl ContainerRegistry for ContainerTable {
    fn lookup(&self, scope: &str) -> Option<Arc<dyn Container>> {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .cloned()
    }
}
