//! Fetch transport for manifests and remote artifacts.
//!
//! This module provides:
//! - The `Fetch` capability the loader and manifest store are built on
//! - An HTTP implementation backed by reqwest (`http`)

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpFetcher;

/// Errors raised by a fetch transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Server returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} timed out")]
    Timeout { url: String },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Retrieves raw bytes for a location.
///
/// Timeouts and retries are the transport's business; callers treat any
/// error as terminal for that attempt.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
