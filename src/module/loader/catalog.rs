//! Entry point catalog
//!
//! Compiled-in table of module factories keyed by the name a manifest's
//! `run` export refers to. Machine code cannot be swapped at run time, so a
//! reload builds a fresh value from the same factory; what changes between
//! loads is the manifest (dependencies, priority, which entry it binds).

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::module::traits::{Module, ModuleContext, ModuleError};

/// Builds a fresh entry point instance
pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn Module> + Send + Sync>;

/// Compiled-in entry points
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `key`, replacing any previous one
    pub fn register<F, M>(&mut self, key: &str, factory: F) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Module + 'static,
    {
        debug!("Registering entry point {}", key);
        self.factories.insert(
            key.to_string(),
            Arc::new(move || Arc::new(factory()) as Arc<dyn Module>),
        );
        self
    }

    /// Register a closure as an entry point
    pub fn register_fn<F, Fut>(&mut self, key: &str, run: F) -> &mut Self
    where
        F: Fn(ModuleContext) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
    {
        self.register(key, move || FnModule::new(run.clone()))
    }

    pub fn factory(&self, key: &str) -> Option<ModuleFactory> {
        self.factories.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCatalog").field("keys", &self.keys()).finish()
    }
}

/// Adapter turning an async closure into a [`Module`]
pub struct FnModule<F> {
    run: F,
}

impl<F> FnModule<F> {
    pub fn new(run: F) -> Self {
        Self { run }
    }
}

#[async_trait]
impl<F, Fut> Module for FnModule<F>
where
    F: Fn(ModuleContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
{
    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        (self.run)(ctx).await
    }
}
