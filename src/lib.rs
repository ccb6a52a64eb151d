//! Hotwire Chat - chat host built around a hot-reloadable module kernel
//!
//! Features live in small modules described by files under a module
//! directory. The kernel discovers them, validates their contract, orders
//! them by dependency and priority, and can reload or roll back any of them
//! while the process keeps serving.
//!
//! ## Layout
//!
//! 1. `module` - the kernel: discovery, validation, resolution, load/reload
//! 2. `modules` - host modules compiled into the binary's catalog
//! 3. `config` - configuration file and kernel settings
//! 4. `utils` - logging, shutdown signals, time helpers

pub mod config;
pub mod module;
pub mod modules;
pub mod utils;

pub use config::{HostConfig, KernelConfig, LoggingConfig};
pub use module::{
    Capabilities, ErrorContext, EventBus, EventKind, KernelEvent, LoadId, LoadReport, Module,
    ModuleCatalog, ModuleContext, ModuleError, ModuleInfo, ModuleManager, RollbackOutcome,
    StateStore, VersionEntry,
};
