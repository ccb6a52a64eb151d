//! Module manifest import
//!
//! A module file is a TOML table whose top-level keys are the module's
//! exports (`run`, `name`, `dependencies`, `priority`). Importing only reads
//! and parses it; the contract validator decides whether the shape is
//! acceptable.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::module::traits::ModuleError;

/// Export key naming the entry point
pub const EXPORT_RUN: &str = "run";
/// Export key holding the unique module name
pub const EXPORT_NAME: &str = "name";
/// Optional export listing required modules
pub const EXPORT_DEPENDENCIES: &str = "dependencies";
/// Optional export used as an ordering tie-break
pub const EXPORT_PRIORITY: &str = "priority";
/// Optional human-readable description
pub const EXPORT_DESCRIPTION: &str = "description";

/// An imported, not yet validated, module file
#[derive(Debug, Clone)]
pub struct ModuleManifest {
    /// Where the manifest was read from
    pub path: PathBuf,
    /// Raw exports
    pub exports: toml::Table,
}

impl ModuleManifest {
    /// Read and parse a module file
    pub fn import<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ModuleError::InvalidManifest(format!("{}: failed to read module file: {}", path.display(), e))
        })?;

        let exports: toml::Table = contents.parse().map_err(|e: toml::de::Error| {
            ModuleError::InvalidManifest(format!("{}: {}", path.display(), e.message()))
        })?;

        debug!("Imported {:?} with exports {:?}", path, exports.keys().collect::<Vec<_>>());
        Ok(Self {
            path: path.to_path_buf(),
            exports,
        })
    }

    /// Build a manifest from already parsed exports
    pub fn from_exports(path: impl Into<PathBuf>, exports: toml::Table) -> Self {
        Self {
            path: path.into(),
            exports,
        }
    }

    pub fn export(&self, key: &str) -> Option<&toml::Value> {
        self.exports.get(key)
    }

    /// The `name` export, if it is a string
    pub fn declared_name(&self) -> Option<&str> {
        self.export(EXPORT_NAME).and_then(toml::Value::as_str)
    }
}
