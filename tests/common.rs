//! Shared fixtures for kernel integration tests
//!
//! Builds a temporary module directory and a catalog whose entry points
//! record every invocation.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use hotwire_chat::module::{LoadId, ModuleCatalog, ModuleError, ModuleManager};

/// Temporary module directory
pub struct ModuleTestFixture {
    pub temp_dir: TempDir,
    pub modules_dir: PathBuf,
}

impl ModuleTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let modules_dir = temp_dir.path().join("modules");
        std::fs::create_dir_all(&modules_dir).unwrap();
        Self {
            temp_dir,
            modules_dir,
        }
    }

    /// Write a raw module file at `relative` under the module directory
    pub fn write(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.modules_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    /// Write `<name>.toml` with the given entry point, dependencies and priority
    pub fn module(&self, name: &str, run: &str, dependencies: &[&str], priority: i64) -> PathBuf {
        self.write(&format!("{}.toml", name), &manifest(name, run, dependencies, priority))
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.modules_dir.join(relative)).unwrap();
    }

    pub fn manager(&self, catalog: ModuleCatalog) -> ModuleManager {
        ModuleManager::new(&self.modules_dir, catalog)
    }

    pub fn path(&self) -> &Path {
        &self.modules_dir
    }
}

/// Manifest text for a module file
pub fn manifest(name: &str, run: &str, dependencies: &[&str], priority: i64) -> String {
    let deps = dependencies
        .iter()
        .map(|d| format!("\"{}\"", d))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "run = \"{}\"\nname = \"{}\"\ndependencies = [{}]\npriority = {}\n",
        run, name, deps, priority
    )
}

/// Invocation log shared with the catalog's entry points
#[derive(Clone, Default)]
pub struct Recorder {
    runs: Arc<Mutex<Vec<(String, LoadId)>>>,
}

impl Recorder {
    /// Module names in invocation order
    pub fn names(&self) -> Vec<String> {
        self.runs.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn runs(&self) -> Vec<(String, LoadId)> {
        self.runs.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.runs.lock().unwrap().iter().filter(|(n, _)| n == name).count()
    }

    pub fn clear(&self) {
        self.runs.lock().unwrap().clear();
    }
}

/// Catalog with `record`, `fail` and `panic` entry points
///
/// Every entry point logs its invocation before doing anything else.
pub fn recording_catalog(recorder: &Recorder) -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();

    let log = recorder.clone();
    catalog.register_fn("record", move |ctx| {
        let log = log.clone();
        async move {
            log.runs.lock().unwrap().push((ctx.module_name.clone(), ctx.load_id.clone()));
            Ok(())
        }
    });

    let log = recorder.clone();
    catalog.register_fn("fail", move |ctx| {
        let log = log.clone();
        async move {
            log.runs.lock().unwrap().push((ctx.module_name.clone(), ctx.load_id.clone()));
            Err(ModuleError::OperationError("refusing to start".to_string()))
        }
    });

    let log = recorder.clone();
    catalog.register_fn("panic", move |ctx| {
        let log = log.clone();
        async move {
            log.runs.lock().unwrap().push((ctx.module_name.clone(), ctx.load_id.clone()));
            if ctx.module_name.is_empty() {
                return Ok(());
            }
            panic!("entry point blew up");
        }
    });

    catalog
}
