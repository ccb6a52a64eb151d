//! Module manager for orchestrating all modules
//!
//! The kernel: runs discovery, validation and resolution, loads modules in
//! order under fresh load-ids, and reloads or rolls back modules at run
//! time. A `ModuleManager` is a cheap handle; every entry point receives a
//! clone as its `api`.
//!
//! Full and single-module reloads touch the same registry and capability
//! table and are not serialized here; callers drive them from one place
//! (the admin command runs on a single console task).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::KernelConfig;
use crate::module::api::{Capabilities, ErrorContext, EventBus, KernelEvent, StateStore};
use crate::module::loader::{ModuleCatalog, ModuleLoader};
use crate::module::registry::{
    DependencyResolver, DroppedDependency, ModuleDescriptor, ModuleDiscovery, ModuleInfo,
    ModuleRegistry, VersionEntry,
};
use crate::module::traits::{LoadId, ModuleContext, ModuleError, RollbackOutcome};
use crate::module::validation::ValidatedModule;

/// Outcome of a full load pass
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Whether the pass ran in best-effort mode
    pub forced: bool,
    /// Whether the pass stopped before any entry point ran
    pub aborted: bool,
    /// Modules whose entry point completed, in load order
    pub loaded: Vec<String>,
    /// Modules whose entry point failed
    pub failed: Vec<String>,
    /// Rejected candidates and resolution failures
    pub rejected: Vec<Arc<ModuleError>>,
    /// Dependency edges ignored because their target was absent
    pub dropped: Vec<DroppedDependency>,
    /// Wall-clock duration of the pass
    pub elapsed: Duration,
}

impl LoadReport {
    fn new(forced: bool) -> Self {
        Self {
            forced,
            ..Self::default()
        }
    }

    /// Whether the pass counts as successful
    ///
    /// A forced pass succeeds unless it was aborted; otherwise any
    /// rejection or entry point failure makes it fail.
    pub fn success(&self) -> bool {
        if self.aborted {
            return false;
        }
        self.forced || (self.rejected.is_empty() && self.failed.is_empty())
    }

    /// One-line summary for logs and admin replies
    pub fn summary(&self) -> String {
        if self.aborted {
            format!(
                "aborted after {} error(s): {}",
                self.rejected.len(),
                self.rejected
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            )
        } else {
            format!(
                "{} loaded, {} failed, {} rejected in {} ms",
                self.loaded.len(),
                self.failed.len(),
                self.rejected.len(),
                self.elapsed.as_millis()
            )
        }
    }

    fn finish(mut self, started: Instant) -> Self {
        self.elapsed = started.elapsed();
        self
    }
}

/// Module manager coordinates all loaded modules
#[derive(Clone)]
pub struct ModuleManager {
    /// Filters and mode for discovery/validation
    config: Arc<KernelConfig>,
    /// Compiled-in entry points
    catalog: Arc<ModuleCatalog>,
    /// Active modules (name -> descriptor) and load order
    modules: Arc<Mutex<ModuleRegistry>>,
    /// Capability registry (`core`)
    core: Capabilities,
    /// State store (`hold`)
    hold: StateStore,
    /// Lifecycle event bus
    event_manager: EventBus,
    /// Set after the first successful initialization
    initialized: Arc<AtomicBool>,
}

impl ModuleManager {
    /// Create a module manager scanning `modules_dir` with default filters
    pub fn new<P: AsRef<Path>>(modules_dir: P, catalog: ModuleCatalog) -> Self {
        let config = KernelConfig {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            ..KernelConfig::default()
        };
        Self::with_config(config, catalog)
    }

    /// Create a module manager from kernel configuration
    pub fn with_config(config: KernelConfig, catalog: ModuleCatalog) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            modules: Arc::new(Mutex::new(ModuleRegistry::default())),
            core: Capabilities::new(),
            hold: StateStore::new(),
            event_manager: EventBus::new(),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// First full load; emits `initialized` on success
    pub async fn initialize(&self, force: bool) -> Result<LoadReport, ModuleError> {
        info!("Initializing modules from {:?}", self.config.modules_dir);
        let report = self.load_all(force).await;
        if !report.success() {
            return Err(ModuleError::InitializationFailed(report.summary()));
        }

        self.initialized.store(true, Ordering::SeqCst);
        self.event_manager.emit(KernelEvent::Initialized);
        info!("Initialize complete: {}", report.summary());
        Ok(report)
    }

    /// Discover, validate, resolve and run every module
    ///
    /// Without `force`, any rejection stops the pass before entry points run
    /// and the active generation stays in place. A dependency cycle always
    /// stops the pass. Entry point failures are reported and, without
    /// `force`, fail the pass; the remaining modules still run.
    pub async fn load_all(&self, force: bool) -> LoadReport {
        let started = Instant::now();
        let mut report = LoadReport::new(force);

        let (accepted, discovered) = self.validate_candidates(&mut report);
        if report.aborted {
            return report.finish(started);
        }

        let resolution = match DependencyResolver::resolve(&accepted) {
            Ok(resolution) => resolution,
            Err(e) => {
                error!("Dependency resolution failed: {}", e);
                self.reject(&mut report, e);
                report.aborted = true;
                return report.finish(started);
            }
        };
        report.dropped = resolution.dropped;

        if !force && !report.rejected.is_empty() {
            warn!(
                "{} module(s) rejected, not running entry points (use force to load the rest)",
                report.rejected.len()
            );
            report.aborted = true;
            return report.finish(started);
        }

        // New generation: subscribers and capabilities are re-established by
        // the modules themselves
        self.event_manager.remove_all_listeners();
        self.core.clear();

        let ordered = self
            .install_generation(accepted, &resolution.order, &discovered)
            .await;

        for descriptor in &ordered {
            match ModuleLoader::invoke(descriptor, self.context_for(descriptor)).await {
                Ok(()) => report.loaded.push(descriptor.name.clone()),
                Err(e) => {
                    report.failed.push(descriptor.name.clone());
                    self.report_error(e, None);
                }
            }
        }

        let report = report.finish(started);
        info!("Load pass finished: {}", report.summary());
        report
    }

    /// Reload every module, bracketed by `reload-start`/`reload-complete`
    pub async fn reload_all_soft(&self) -> LoadReport {
        self.event_manager.emit(KernelEvent::ReloadStart);
        let report = self.load_all(false).await;
        self.event_manager.emit(KernelEvent::ReloadComplete {
            success: report.success(),
        });
        report
    }

    /// Re-import one module and run it under a new load-id
    ///
    /// Other modules, including dependents, are left untouched.
    pub async fn reload_one(&self, name: &str) -> Result<LoadId, ModuleError> {
        let current = self.descriptor(name).await?;
        let validated = self.reimport(&current)?;
        let load_id = LoadId::generate();
        info!("Reloading module {} as {}", name, load_id);
        self.activate(&current, &validated, load_id.clone()).await?;
        Ok(load_id)
    }

    /// Re-run a module under a previously recorded load-id
    pub async fn rollback(&self, name: &str, target: &LoadId) -> Result<RollbackOutcome, ModuleError> {
        let current = self.descriptor(name).await?;
        if !current.has_version(target) {
            return Err(ModuleError::UnknownVersion {
                module: name.to_string(),
                load_id: target.clone(),
            });
        }
        if current.current_load_id() == Some(target) {
            info!("Module {} is already at {}", name, target);
            return Ok(RollbackOutcome::AlreadyCurrent);
        }

        let validated = self.reimport(&current)?;
        info!("Rolling module {} back to {}", name, target);
        self.activate(&current, &validated, target.clone()).await?;
        Ok(RollbackOutcome::RolledBack(target.clone()))
    }

    /// Snapshot of one module
    pub async fn get_module(&self, name: &str) -> Option<ModuleInfo> {
        self.modules.lock().await.get(name).map(ModuleDescriptor::info)
    }

    /// Snapshots of every module, in load order
    pub async fn list_modules(&self) -> Vec<ModuleInfo> {
        self.modules
            .lock()
            .await
            .iter_ordered()
            .map(ModuleDescriptor::info)
            .collect()
    }

    /// Current load order
    pub async fn load_order(&self) -> Vec<String> {
        self.modules.lock().await.order().to_vec()
    }

    /// A module's recorded load-ids, first occurrence order, current flagged
    pub async fn list_versions(&self, name: &str) -> Result<Vec<VersionEntry>, ModuleError> {
        let modules = self.modules.lock().await;
        let history = modules
            .history(name)
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))?;
        let current = history.last();

        let mut seen = HashSet::new();
        Ok(history
            .iter()
            .filter(|id| seen.insert(*id))
            .map(|id| VersionEntry {
                load_id: id.clone(),
                current: Some(id) == current,
            })
            .collect())
    }

    /// Report an error raised outside an entry point, e.g. while serving a peer
    pub fn report_error(&self, error: ModuleError, context: Option<ErrorContext>) {
        match &context {
            Some(ctx) => warn!("Error while serving {}: {}", ctx.peer, error),
            None => debug!("Reporting error: {}", error),
        }
        self.event_manager.emit(KernelEvent::Error {
            error: Arc::new(error),
            context,
        });
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.core
    }

    pub fn state(&self) -> &StateStore {
        &self.hold
    }

    pub fn events(&self) -> &EventBus {
        &self.event_manager
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn modules_dir(&self) -> &PathBuf {
        &self.config.modules_dir
    }

    /// Import and validate every discovered candidate
    ///
    /// Returns the accepted modules and every discovered path.
    fn validate_candidates(&self, report: &mut LoadReport) -> (Vec<ValidatedModule>, HashSet<PathBuf>) {
        let discovery = ModuleDiscovery::with_config(&self.config.modules_dir, &self.config);
        let paths = discovery.discover();
        let mut accepted = Vec::new();
        let mut taken = HashSet::new();

        for path in &paths {
            match ModuleLoader::import(path, &self.catalog, &taken) {
                Ok(validated) => {
                    debug!("Accepted module {} from {:?}", validated.name, path);
                    taken.insert(validated.name.clone());
                    accepted.push(validated);
                }
                Err(e) => {
                    warn!("Rejected {:?}: {}", path, e);
                    self.reject(report, e);
                    if self.config.strict {
                        warn!("Strict mode: stopping the load pass at {:?}", path);
                        report.aborted = true;
                        break;
                    }
                }
            }
        }
        (accepted, paths.into_iter().collect())
    }

    /// Replace the registry with a new generation in `order`
    ///
    /// Modules seen before keep their history; each gets one new load-id.
    /// A known module left out of the generation keeps its history as long
    /// as its file was still discovered.
    async fn install_generation(
        &self,
        accepted: Vec<ValidatedModule>,
        order: &[String],
        discovered: &HashSet<PathBuf>,
    ) -> Vec<ModuleDescriptor> {
        let mut by_name: HashMap<String, ValidatedModule> = accepted
            .into_iter()
            .map(|validated| (validated.name.clone(), validated))
            .collect();

        let mut modules = self.modules.lock().await;
        let mut histories = modules.histories();

        let descriptors: Vec<ModuleDescriptor> = order
            .iter()
            .filter_map(|name| by_name.remove(name))
            .map(|validated| {
                let history = histories
                    .remove(&validated.name)
                    .map(|(_, history)| history)
                    .unwrap_or_default();
                ModuleLoader::instantiate(&validated, history, LoadId::generate())
            })
            .collect();

        let mut dormant = HashMap::new();
        for (name, (path, history)) in histories {
            if discovered.contains(&path) {
                info!("Module {} is inactive this pass, keeping its history", name);
                dormant.insert(name, (path, history));
            } else {
                info!("Module {} is no longer present, removing it", name);
            }
        }

        *modules = ModuleRegistry::from_ordered(descriptors).with_dormant(dormant);
        modules.iter_ordered().cloned().collect()
    }

    /// Install a fresh instance of an existing module and run it
    async fn activate(
        &self,
        current: &ModuleDescriptor,
        validated: &ValidatedModule,
        load_id: LoadId,
    ) -> Result<(), ModuleError> {
        let descriptor = ModuleLoader::instantiate(validated, current.load_history.clone(), load_id);
        let descriptor = {
            let mut modules = self.modules.lock().await;
            modules.replace(descriptor.clone());
            modules.get(&descriptor.name).cloned().unwrap_or(descriptor)
        };

        if let Err(e) = ModuleLoader::invoke(&descriptor, self.context_for(&descriptor)).await {
            self.report_error(e.clone(), None);
            return Err(e);
        }
        Ok(())
    }

    /// Re-read a registered module's file
    fn reimport(&self, current: &ModuleDescriptor) -> Result<ValidatedModule, ModuleError> {
        let result = ModuleLoader::import(&current.file_path, &self.catalog, &HashSet::new())
            .and_then(|validated| {
                if validated.name == current.name {
                    Ok(validated)
                } else {
                    Err(ModuleError::InvalidManifest(format!(
                        "{}: module file now declares name '{}' instead of '{}'",
                        current.file_path.display(),
                        validated.name,
                        current.name
                    )))
                }
            });

        if let Err(e) = &result {
            warn!("Could not re-import module {}: {}", current.name, e);
            self.report_error(e.clone(), None);
        }
        result
    }

    async fn descriptor(&self, name: &str) -> Result<ModuleDescriptor, ModuleError> {
        self.modules
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))
    }

    fn context_for(&self, descriptor: &ModuleDescriptor) -> ModuleContext {
        ModuleContext {
            module_name: descriptor.name.clone(),
            load_id: descriptor
                .current_load_id()
                .cloned()
                .unwrap_or_else(LoadId::generate),
            api: self.clone(),
            core: self.core.clone(),
            hold: self.hold.clone(),
        }
    }

    fn reject(&self, report: &mut LoadReport, error: ModuleError) {
        let error = Arc::new(error);
        self.event_manager.emit(KernelEvent::Error {
            error: Arc::clone(&error),
            context: None,
        });
        report.rejected.push(error);
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules_dir", &self.config.modules_dir)
            .field("catalog", &self.catalog)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, file: &str, body: &str) {
        std::fs::write(dir.join(file), body).unwrap();
    }

    fn catalog() -> ModuleCatalog {
        let mut catalog = ModuleCatalog::new();
        catalog.register_fn("noop", |_ctx| async { Ok(()) });
        catalog
    }

    #[tokio::test]
    async fn test_report_success_rules() {
        let mut report = LoadReport::new(false);
        assert!(report.success());
        report.failed.push("x".into());
        assert!(!report.success());
        report.forced = true;
        assert!(report.success());
        report.aborted = true;
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_full_pass_carries_history() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.toml", "run = \"noop\"\nname = \"a\"\n");
        let manager = ModuleManager::new(dir.path(), catalog());

        assert!(manager.load_all(false).await.success());
        assert!(manager.load_all(false).await.success());

        let info = manager.get_module("a").await.unwrap();
        assert_eq!(info.load_history.len(), 2);
        assert_eq!(info.position, Some(0));
    }

    #[tokio::test]
    async fn test_removed_file_drops_module() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.toml", "run = \"noop\"\nname = \"a\"\n");
        write(dir.path(), "b.toml", "run = \"noop\"\nname = \"b\"\n");
        let manager = ModuleManager::new(dir.path(), catalog());
        manager.load_all(false).await;
        assert_eq!(manager.load_order().await.len(), 2);

        std::fs::remove_file(dir.path().join("b.toml")).unwrap();
        manager.load_all(false).await;
        assert_eq!(manager.load_order().await, vec!["a".to_string()]);
        assert!(manager.get_module("b").await.is_none());
    }

    #[tokio::test]
    async fn test_reload_rejects_renamed_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.toml", "run = \"noop\"\nname = \"a\"\n");
        let manager = ModuleManager::new(dir.path(), catalog());
        manager.load_all(false).await;

        write(dir.path(), "a.toml", "run = \"noop\"\nname = \"renamed\"\n");
        let err = manager.reload_one("a").await.unwrap_err();
        assert!(matches!(err, ModuleError::InvalidManifest(_)));
        assert_eq!(manager.get_module("a").await.unwrap().load_history.len(), 1);
    }
}
