//! Module discovery
//!
//! Walks the module directory and yields candidate manifest files.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::KernelConfig;

/// Module discovery scanner
#[derive(Debug, Clone)]
pub struct ModuleDiscovery {
    /// Base directory to scan for modules
    modules_dir: PathBuf,
    /// Directory names never descended into
    ignored_dirs: Vec<String>,
    /// Basename prefix marking a file as private (not a module)
    private_prefix: String,
    /// Extension of module manifest files
    extension: String,
}

impl ModuleDiscovery {
    /// Create a scanner with default filters
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self::with_config(modules_dir, &KernelConfig::default())
    }

    /// Create a scanner using the kernel's filter configuration
    pub fn with_config<P: AsRef<Path>>(modules_dir: P, config: &KernelConfig) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            ignored_dirs: config.ignored_dirs.clone(),
            private_prefix: config.private_prefix.clone(),
            extension: config.manifest_extension.clone(),
        }
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Discover all candidate module files under the modules directory
    ///
    /// Paths are absolute when the modules directory can be canonicalized
    /// and sorted so repeated passes see the same declaration order.
    pub fn discover(&self) -> Vec<PathBuf> {
        info!("Discovering modules in {:?}", self.modules_dir);

        if !self.modules_dir.is_dir() {
            warn!("Modules directory {:?} does not exist", self.modules_dir);
            return Vec::new();
        }

        let root = self
            .modules_dir
            .canonicalize()
            .unwrap_or_else(|_| self.modules_dir.clone());

        let mut candidates = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };
            // Symlinked files count; symlinked directories are not walked
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file {
                if entry.path_is_symlink() {
                    debug!("Skipping symlink {:?}", entry.path());
                }
                continue;
            }
            if self.is_candidate_file(entry.path()) {
                debug!("Found module candidate {:?}", entry.path());
                candidates.push(entry.into_path());
            }
        }

        candidates.sort();
        info!("Discovered {} module candidates", candidates.len());
        candidates
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.ignored_dirs.iter().any(|ignored| *ignored == name)
    }

    fn is_candidate_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(OsStr::to_str) else {
            return false;
        };
        if name.starts_with('.') {
            return false;
        }
        if !self.private_prefix.is_empty() && name.starts_with(&self.private_prefix) {
            debug!("Skipping private file {:?}", path);
            return false;
        }
        path.extension()
            .and_then(OsStr::to_str)
            .map_or(false, |ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}
