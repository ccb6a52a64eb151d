//! Module loading system
//!
//! Entry point catalog plus import/instantiate/invoke helpers.

pub mod catalog;
pub mod loader;

pub use catalog::{FnModule, ModuleCatalog, ModuleFactory};
pub use loader::ModuleLoader;
