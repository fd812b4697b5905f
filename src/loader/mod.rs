//! Artifact loading with at-most-one-in-flight semantics.
//!
//! This module provides:
//! - A keyed single-flight primitive (`single_flight`)
//! - The remote entry loader built on it (`artifact`)

pub mod artifact;
pub mod single_flight;

pub use artifact::{ArtifactExecutor, ArtifactLoadError, ArtifactLoader};
pub use single_flight::{FlightState, SingleFlight};
