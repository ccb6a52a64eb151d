//! Module registry and discovery
//!
//! Handles module discovery, manifest import, descriptors and dependency
//! resolution.

pub mod dependencies;
pub mod descriptor;
pub mod discovery;
pub mod manifest;

pub use dependencies::{DependencyNode, DependencyResolver, DroppedDependency, Resolution};
pub use descriptor::{ModuleDescriptor, ModuleInfo, ModuleRegistry, VersionEntry};
pub use discovery::ModuleDiscovery;
pub use manifest::ModuleManifest;
