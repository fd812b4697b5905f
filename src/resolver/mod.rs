//! Module resolution and version overrides.

pub mod overrides;
pub mod resolve;

pub use overrides::VersionOverrides;
pub use resolve::{LoaderState, ModuleResolver, RemoteStatus, ResolveError, ResolvedComponent};
