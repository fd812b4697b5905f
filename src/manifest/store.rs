//! Cached access to the remotes manifest.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::loader::SingleFlight;
use crate::manifest::{ManifestError, RemoteManifest, Result};
use crate::transport::Fetch;

#[derive(Default)]
struct Cached {
    generation: u64,
    manifest: Option<Arc<RemoteManifest>>,
}

/// Fetches the manifest once and serves the cached copy until invalidated.
///
/// Concurrent first requests share a single fetch. The cache lock is never
/// held across I/O, so invalidation returns immediately even while a fetch is
/// hanging; a fetch started before an invalidation does not populate the
/// cache after it.
pub struct ManifestStore {
    url: String,
    fetcher: Arc<dyn Fetch>,
    cached: Mutex<Cached>,
    fetches: SingleFlight<u64, ManifestError>,
}

impl ManifestStore {
    pub fn new(url: impl Into<String>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            url: url.into(),
            fetcher,
            cached: Mutex::new(Cached::default()),
            fetches: SingleFlight::new(),
        }
    }

    /// Location the manifest is fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the manifest, fetching it if nothing is cached.
    ///
    /// Failures are not cached; the next call fetches again.
    pub async fn load(&self) -> Result<Arc<RemoteManifest>> {
        loop {
            let generation = {
                let cached = self.lock();
                if let Some(manifest) = cached.manifest.as_ref() {
                    return Ok(Arc::clone(manifest));
                }
                cached.generation
            };

            self.fetches
                .run(&generation, move || async move {
                    let manifest = self.fetch().await?;
                    let mut cached = self.lock();
                    if cached.generation == generation {
                        cached.manifest = Some(Arc::new(manifest));
                    } else {
                        log::debug!("Manifest invalidated while fetching, discarding");
                    }
                    Ok(())
                })
                .await?;
        }
    }

    /// Drop the cached manifest so the next load re-reads ground truth.
    pub fn invalidate(&self) {
        let stale = {
            let mut cached = self.lock();
            cached.manifest = None;
            cached.generation += 1;
            cached.generation - 1
        };
        self.fetches.evict(&stale);
    }

    /// Whether a manifest is currently cached.
    pub fn is_cached(&self) -> bool {
        self.lock().manifest.is_some()
    }

    async fn fetch(&self) -> Result<RemoteManifest> {
        log::debug!("Fetching remotes manifest from {}", self.url);
        let bytes = self
            .fetcher
            .fetch(&self.url)
            .await
            .map_err(|e| ManifestError::Fetch {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let manifest = RemoteManifest::from_slice(&bytes).map_err(|e| ManifestError::Malformed {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        log::debug!("Loaded manifest with {} remote(s)", manifest.len());
        Ok(manifest)
    }

    fn lock(&self) -> MutexGuard<'_, Cached> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
