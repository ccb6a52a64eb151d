//! Configuration management for the chat host
//!
//! Handles configuration loading and the kernel's discovery settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Module kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Directory scanned (recursively) for module files
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Directory names never descended into during discovery
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,

    /// Basename prefix marking a file as private (not a module)
    #[serde(default = "default_private_prefix")]
    pub private_prefix: String,

    /// Extension of module files
    #[serde(default = "default_manifest_extension")]
    pub manifest_extension: String,

    /// Abort a load pass on the first rejected module file
    #[serde(default)]
    pub strict: bool,
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_ignored_dirs() -> Vec<String> {
    vec![
        "target".to_string(),
        "node_modules".to_string(),
        ".git".to_string(),
    ]
}

fn default_private_prefix() -> String {
    "_".to_string()
}

fn default_manifest_extension() -> String {
    "toml".to_string()
}

fn default_project_name() -> String {
    "hotwire-chat".to_string()
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            ignored_dirs: default_ignored_dirs(),
            private_prefix: default_private_prefix(),
            manifest_extension: default_manifest_extension(),
            strict: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "hotwire_chat::module=debug"); RUST_LOG wins
    pub filter: Option<String>,

    /// Emit JSON lines (needs the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Host configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Name shown in startup/shutdown logs
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Module kernel configuration
    #[serde(default)]
    pub kernel: KernelConfig,

    /// Logging configuration
    pub logging: Option<LoggingConfig>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            kernel: KernelConfig::default(),
            logging: None,
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file
    ///
    /// A relative `modules_dir` is resolved against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: HostConfig = toml::from_str(&content)?;

        if config.kernel.modules_dir.is_relative() {
            if let Some(base) = path.parent() {
                config.kernel.modules_dir = base.join(&config.kernel.modules_dir);
            }
        }
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
