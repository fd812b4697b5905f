//! Remote containers and their one-time initialization.

pub mod module;
pub mod registry;
pub mod scope;

pub use module::{
    Component, Container, ContainerRegistry, ContainerTable, ModuleFactory, Props, RemoteModule,
};
pub use registry::{ContainerError, ContainerInitializer};
pub use scope::{SharedDependency, SharedScope};
