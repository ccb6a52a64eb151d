//! Module system traits and interfaces
//!
//! Defines the entry point contract every module implements, the context
//! handed to it on each (re)load, and the kernel's error taxonomy.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::module::api::{Capabilities, StateStore};
use crate::module::manager::ModuleManager;

/// Alphabet used for load-id tokens
const LOAD_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of a generated load-id
pub const LOAD_ID_LEN: usize = 6;

/// Opaque identifier recorded every time a module is (re)loaded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(String);

impl LoadId {
    /// Generate a fresh random load-id
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let token: String = (0..LOAD_ID_LEN)
            .map(|_| LOAD_ID_ALPHABET[rng.gen_range(0..LOAD_ID_ALPHABET.len())] as char)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LoadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LoadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Module trait that every entry point implements
///
/// A module's manifest on disk names its entry point; the kernel builds a
/// fresh value from the catalog factory on every load and calls `run` once.
/// `run` may install capabilities, seed state, subscribe to kernel events or
/// spawn background tasks that outlive the load pass.
#[async_trait]
pub trait Module: Send + Sync {
    /// Run the module's entry point with the shared context
    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError>;
}

/// Context handed to a module's entry point
///
/// Carries the three shared references every module sees: the kernel
/// (`api`), the capability registry (`core`) and the state store (`hold`).
/// All three are cheap handles onto shared data.
#[derive(Clone)]
pub struct ModuleContext {
    /// Name of the module being run
    pub module_name: String,
    /// Load-id this invocation is recorded under
    pub load_id: LoadId,
    /// Kernel handle, for reload triggers and event subscriptions
    pub api: ModuleManager,
    /// Capability registry shared between modules
    pub core: Capabilities,
    /// Long-lived state that survives reloads
    pub hold: StateStore,
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module_name", &self.module_name)
            .field("load_id", &self.load_id)
            .finish_non_exhaustive()
    }
}

/// Result of a rollback request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The target load-id was already current; nothing ran
    AlreadyCurrent,
    /// The module was re-run under the historical load-id
    RolledBack(LoadId),
}

/// Module system errors
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    #[error("{path}: module must export a \"run\" entry point known to the catalog")]
    MissingEntryPoint { path: PathBuf },

    #[error("{path}: module must export a non-empty string \"name\"")]
    MissingName { path: PathBuf },

    #[error("{path}: module name '{name}' is already registered")]
    DuplicateName { name: String, path: PathBuf },

    #[error("{path}: \"dependencies\" must be an array of strings ({reason})")]
    MalformedDependencies { path: PathBuf, reason: String },

    #[error("{path}: \"priority\" must be an integer")]
    MalformedPriority { path: PathBuf },

    #[error("Invalid module manifest: {0}")]
    InvalidManifest(String),

    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("Module not found: {0}")]
    UnknownModule(String),

    #[error("Module {module} has no recorded version {load_id}")]
    UnknownVersion { module: String, load_id: LoadId },

    #[error("Module {module} failed: {reason}")]
    EntryPointFailure { module: String, reason: String },

    #[error("Module operation failed: {0}")]
    OperationError(String),

    #[error("Module initialization failed: {0}")]
    InitializationFailed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ModuleError {
    /// Whether this error concerns a single candidate and should not abort
    /// the whole resolution
    pub fn is_candidate_error(&self) -> bool {
        matches!(
            self,
            ModuleError::MissingEntryPoint { .. }
                | ModuleError::MissingName { .. }
                | ModuleError::DuplicateName { .. }
                | ModuleError::MalformedDependencies { .. }
                | ModuleError::MalformedPriority { .. }
                | ModuleError::InvalidManifest(_)
        )
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(e: std::io::Error) -> Self {
        ModuleError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for ModuleError {
    fn from(e: toml::de::Error) -> Self {
        ModuleError::InvalidManifest(e.to_string())
    }
}

impl From<anyhow::Error> for ModuleError {
    fn from(e: anyhow::Error) -> Self {
        ModuleError::OperationError(e.to_string())
    }
}
