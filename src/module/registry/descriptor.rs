//! Module descriptors and the kernel-owned registry

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::module::traits::{LoadId, Module};

/// Everything the kernel knows about one accepted module
#[derive(Clone)]
pub struct ModuleDescriptor {
    /// Unique module name
    pub name: String,
    /// Modules that must be initialized first
    pub dependencies: Vec<String>,
    /// Tie-break among otherwise unordered modules (higher first)
    pub priority: i64,
    /// Catalog key of the entry point
    pub entry: String,
    /// Instantiated entry point for the current load
    pub module: Arc<dyn Module>,
    /// Absolute path of the module file
    pub file_path: PathBuf,
    /// Every load-id this module ran under, last is current
    pub load_history: Vec<LoadId>,
    /// Index in the resolved load order
    pub position: Option<usize>,
    /// Optional description from the manifest
    pub description: Option<String>,
}

impl ModuleDescriptor {
    /// The load-id of the active generation
    pub fn current_load_id(&self) -> Option<&LoadId> {
        self.load_history.last()
    }

    pub fn has_version(&self, load_id: &LoadId) -> bool {
        self.load_history.contains(load_id)
    }

    /// Read-only snapshot for callers outside the kernel
    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: self.name.clone(),
            dependencies: self.dependencies.clone(),
            priority: self.priority,
            entry: self.entry.clone(),
            file_path: self.file_path.clone(),
            load_history: self.load_history.clone(),
            position: self.position,
            description: self.description.clone(),
        }
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("entry", &self.entry)
            .field("file_path", &self.file_path)
            .field("load_history", &self.load_history)
            .field("position", &self.position)
            .finish()
    }
}

/// Snapshot of a descriptor without the entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub dependencies: Vec<String>,
    pub priority: i64,
    pub entry: String,
    pub file_path: PathBuf,
    pub load_history: Vec<LoadId>,
    pub position: Option<usize>,
    pub description: Option<String>,
}

impl ModuleInfo {
    pub fn current_load_id(&self) -> Option<&LoadId> {
        self.load_history.last()
    }
}

/// One entry of a module's version listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub load_id: LoadId,
    pub current: bool,
}

/// Name -> active descriptor, plus the resolved load order
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleDescriptor>,
    order: Vec<String>,
    /// Modules whose file is still on disk but was rejected by the last
    /// forced pass: name -> (file, history)
    dormant: HashMap<String, (PathBuf, Vec<LoadId>)>,
}

impl ModuleRegistry {
    /// Build a registry from descriptors already in load order
    pub fn from_ordered(descriptors: Vec<ModuleDescriptor>) -> Self {
        let mut modules = HashMap::with_capacity(descriptors.len());
        let mut order = Vec::with_capacity(descriptors.len());
        for (index, mut descriptor) in descriptors.into_iter().enumerate() {
            descriptor.position = Some(index);
            order.push(descriptor.name.clone());
            modules.insert(descriptor.name.clone(), descriptor);
        }
        Self {
            modules,
            order,
            dormant: HashMap::new(),
        }
    }

    /// Attach histories of modules that are inactive but not gone
    pub fn with_dormant(mut self, dormant: HashMap<String, (PathBuf, Vec<LoadId>)>) -> Self {
        self.dormant = dormant;
        self
    }

    /// Every known history, active and dormant, with the owning file
    pub fn histories(&self) -> HashMap<String, (PathBuf, Vec<LoadId>)> {
        let mut histories = self.dormant.clone();
        for descriptor in self.modules.values() {
            histories.insert(
                descriptor.name.clone(),
                (descriptor.file_path.clone(), descriptor.load_history.clone()),
            );
        }
        histories
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Replace a module's descriptor, keeping its position
    pub fn replace(&mut self, mut descriptor: ModuleDescriptor) -> Option<ModuleDescriptor> {
        let previous = self.modules.get(&descriptor.name)?;
        descriptor.position = previous.position;
        self.modules.insert(descriptor.name.clone(), descriptor)
    }

    /// Load history of a module, if registered
    pub fn history(&self, name: &str) -> Option<&[LoadId]> {
        self.modules.get(name).map(|d| d.load_history.as_slice())
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Descriptors in load order
    pub fn iter_ordered(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.order.iter().filter_map(|name| self.modules.get(name))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
