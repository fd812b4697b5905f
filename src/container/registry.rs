//! One-time container initialization.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thiserror::Error;

use crate::container::module::{Container, ContainerRegistry};
use crate::container::scope::SharedScope;
use crate::loader::single_flight::SingleFlight;

/// Errors raised while preparing a container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("Remote container '{scope}' was not registered")]
    NotFound { scope: String },

    #[error("Remote container '{scope}' failed to initialize: {reason}")]
    Init { scope: String, reason: String },
}

/// Initialization key: a scope together with the container instance behind it.
///
/// Two containers registered under the same scope (one per remote version)
/// are different keys, so a newly registered container is always initialized
/// even if an older one under that scope already was.
#[derive(Clone)]
struct InitKey {
    scope: String,
    container: Arc<dyn Container>,
}

impl InitKey {
    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.container) as *const ()
    }
}

impl PartialEq for InitKey {
    fn eq(&self, other: &Self) -> bool {
        self.scope == other.scope && std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for InitKey {}

impl Hash for InitKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scope.hash(state);
        self.addr().hash(state);
    }
}

/// Tracks which containers have completed initialization against the share scope.
///
/// Each registered container is initialized at most once, including under
/// concurrent requests, until its scope is evicted. A failed initialization
/// leaves the container uninitialized.
pub struct ContainerInitializer {
    registry: Arc<dyn ContainerRegistry>,
    initialized: SingleFlight<InitKey, ContainerError>,
}

impl ContainerInitializer {
    pub fn new(registry: Arc<dyn ContainerRegistry>) -> Self {
        Self {
            registry,
            initialized: SingleFlight::new(),
        }
    }

    /// Look up the container for `scope` and make sure it is initialized.
    pub async fn ensure_initialized(
        &self,
        scope: &str,
        shared: &SharedScope,
    ) -> Result<Arc<dyn Container>, ContainerError> {
        let container = self
            .registry
            .lookup(scope)
            .ok_or_else(|| ContainerError::NotFound {
                scope: scope.to_string(),
            })?;

        let key = InitKey {
            scope: scope.to_string(),
            container: Arc::clone(&container),
        };
        let pending = Arc::clone(&container);
        self.initialized
            .run(&key, move || async move {
                log::info!(
                    "Initializing container '{}' with share scope '{}'",
                    scope,
                    shared.name()
                );
                pending
                    .init(shared)
                    .await
                    .map_err(|reason| ContainerError::Init {
                        scope: scope.to_string(),
                        reason,
                    })
            })
            .await?;

        Ok(container)
    }

    /// Whether the container currently registered under `scope` is initialized.
    pub fn is_initialized(&self, scope: &str) -> bool {
        self.registry.lookup(scope).is_some_and(|container| {
            self.initialized.is_done(&InitKey {
                scope: scope.to_string(),
                container,
            })
        })
    }

    /// Forget every initialization recorded under `scope`.
    pub fn evict(&self, scope: &str) -> bool {
        self.initialized.evict_where(|key| key.scope == scope) > 0
    }
}
