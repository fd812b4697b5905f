//! Remote entry artifact loading.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;

use crate::loader::single_flight::SingleFlight;
use crate::transport::Fetch;

/// Failure to fetch or execute a remote entry artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to load remote entry {url}: {reason}")]
pub struct ArtifactLoadError {
    pub url: String,
    pub reason: String,
}

impl ArtifactLoadError {
    fn new(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Executes a fetched artifact in the host environment.
///
/// Executing a remote entry is expected to register the remote's container
/// with the host's container registry.
#[async_trait]
pub trait ArtifactExecutor: Send + Sync {
    async fn execute(&self, url: &str, artifact: &[u8]) -> Result<(), String>;
}

/// Eviction counters; a load or prefetch that started under an older epoch
/// must not publish its result.
#[derive(Debug, Default)]
struct Epochs {
    cleared: u64,
    evicted: HashMap<String, u64>,
}

impl Epochs {
    fn of(&self, url: &str) -> (u64, u64) {
        (self.cleared, self.evicted.get(url).copied().unwrap_or(0))
    }
}

/// Loads each artifact URL at most once.
///
/// Concurrent loads of the same URL share one fetch and one execution, and
/// all of them observe its outcome. A failed load is forgotten so a later
/// call can try again; nothing is retried automatically. A load whose URL is
/// evicted while it is still fetching does not execute the stale artifact.
pub struct ArtifactLoader {
    fetcher: Arc<dyn Fetch>,
    executor: Arc<dyn ArtifactExecutor>,
    flights: SingleFlight<String, ArtifactLoadError>,
    epochs: Mutex<Epochs>,
    prefetched: Mutex<HashMap<String, Vec<u8>>>,
    prefetching: Mutex<HashMap<String, watch::Receiver<bool>>>,
}

impl ArtifactLoader {
    pub fn new(fetcher: Arc<dyn Fetch>, executor: Arc<dyn ArtifactExecutor>) -> Self {
        Self {
            fetcher,
            executor,
            flights: SingleFlight::new(),
            epochs: Mutex::new(Epochs::default()),
            prefetched: Mutex::new(HashMap::new()),
            prefetching: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure the artifact at `url` has been fetched and executed.
    ///
    /// When `integrity` is given, the fetched bytes must hash to it (hex SHA-256).
    /// A prefetch of the same URL still in flight is awaited and reused.
    pub async fn load(
        &self,
        url: &str,
        integrity: Option<&str>,
    ) -> Result<(), ArtifactLoadError> {
        let key = url.to_string();
        self.flights
            .run(&key, move || async move {
                let epoch = self.epoch(url);
                self.wait_for_prefetch(url).await;

                let artifact = match self.take_prefetched(url) {
                    Some(bytes) => {
                        log::debug!("Using prefetched remote entry {}", url);
                        bytes
                    }
                    None => {
                        log::debug!("Fetching remote entry {}", url);
                        self.fetcher
                            .fetch(url)
                            .await
                            .map_err(|e| ArtifactLoadError::new(url, e.to_string()))?
                    }
                };

                if let Some(expected) = integrity {
                    let actual = hex::encode(Sha256::digest(&artifact));
                    if !actual.eq_ignore_ascii_case(expected) {
                        return Err(ArtifactLoadError::new(
                            url,
                            format!("integrity mismatch: expected {}, got {}", expected, actual),
                        ));
                    }
                }

                if self.epoch(url) != epoch {
                    return Err(ArtifactLoadError::new(url, "evicted while loading"));
                }

                self.executor
                    .execute(url, &artifact)
                    .await
                    .map_err(|reason| ArtifactLoadError::new(url, reason))?;

                log::debug!("Remote entry {} loaded ({} bytes)", url, artifact.len());
                Ok(())
            })
            .await
            .map_err(|e| {
                log::warn!("{}", e);
                e
            })
    }

    /// Hint that `url` will be needed soon.
    ///
    /// Fetches the bytes in the background without executing them; a load of
    /// the URL that starts meanwhile waits for them instead of fetching again.
    /// Never fails and does nothing outside a tokio runtime or when the URL
    /// is already known.
    pub fn prefetch(self: &Arc<Self>, url: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!("No runtime available, skipping prefetch of {}", url);
            return;
        };

        let epoch = self.epoch(url);
        let (done, pending) = watch::channel(false);
        {
            // Held while checking the flights so a load that claims the URL
            // concurrently either sees this prefetch or is seen by it.
            let mut prefetching = lock(&self.prefetching);
            if prefetching.contains_key(url)
                || self.flights.contains(&url.to_string())
                || lock(&self.prefetched).contains_key(url)
            {
                return;
            }
            prefetching.insert(url.to_string(), pending);
        }

        let loader = Arc::clone(self);
        let url = url.to_string();
        handle.spawn(async move {
            match loader.fetcher.fetch(&url).await {
                Ok(bytes) if loader.epoch(&url) == epoch => {
                    lock(&loader.prefetched).insert(url.clone(), bytes);
                }
                Ok(_) => log::debug!("Discarding prefetch of evicted {}", url),
                Err(e) => log::debug!("Prefetch of {} failed: {}", url, e),
            }
            lock(&loader.prefetching).remove(&url);
            let _ = done.send(true);
        });
    }

    /// Whether `url` has been loaded successfully and not evicted.
    pub fn is_loaded(&self, url: &str) -> bool {
        self.flights.is_done(&url.to_string())
    }

    /// Whether prefetched bytes are waiting for `url`.
    pub fn is_prefetched(&self, url: &str) -> bool {
        lock(&self.prefetched).contains_key(url)
    }

    /// Forget `url` so the next load fetches and executes it again.
    ///
    /// Loads and prefetches of `url` already in flight are not published.
    pub fn evict(&self, url: &str) {
        *lock(&self.epochs)
            .evicted
            .entry(url.to_string())
            .or_default() += 1;
        self.flights.evict(&url.to_string());
        lock(&self.prefetched).remove(url);
    }

    /// Forget every artifact.
    pub fn clear(&self) {
        lock(&self.epochs).cleared += 1;
        self.flights.clear();
        lock(&self.prefetched).clear();
    }

    fn epoch(&self, url: &str) -> (u64, u64) {
        lock(&self.epochs).of(url)
    }

    async fn wait_for_prefetch(&self, url: &str) {
        let pending = lock(&self.prefetching).get(url).cloned();
        if let Some(mut pending) = pending {
            log::debug!("Waiting for prefetch of {}", url);
            // A dropped sender means the prefetch task is gone; fall through to a fetch.
            let _ = pending.wait_for(|done| *done).await;
        }
    }

    fn take_prefetched(&self, url: &str) -> Option<Vec<u8>> {
        lock(&self.prefetched).remove(url)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
