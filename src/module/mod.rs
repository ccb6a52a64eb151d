//! Module runtime kernel
//!
//! Loads independent feature modules from disk, wires them together through
//! a shared context and reloads any subset of them at run time.
//!
//! ## Pipeline
//!
//! - **Discovery**: recursive scan of the module directory for module files
//! - **Contract validation**: each file must name a catalog entry point and a
//!   unique module name; dependencies and priority are shape-checked
//! - **Resolution**: dependency graph, cycle detection, deterministic order
//! - **Load/reload**: entry points run sequentially under fresh load-ids;
//!   single modules can be reloaded or rolled back to a recorded load-id
//! - **Events**: `initialized`, `reload-start`, `reload-complete`, `error`
//!
//! Modules share one address space. Failure containment means a failing or
//! panicking entry point is caught and reported, nothing more.

pub mod api;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod traits;
pub mod validation;

pub use api::{Capabilities, ErrorContext, EventBus, EventKind, KernelEvent, StateStore};
pub use loader::{FnModule, ModuleCatalog};
pub use manager::{LoadReport, ModuleManager};
pub use registry::{ModuleInfo, VersionEntry};
pub use traits::{LoadId, Module, ModuleContext, ModuleError, RollbackOutcome};
