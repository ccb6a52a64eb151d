//! Module loader implementation
//!
//! Imports module files, instantiates entry points under a load-id and runs
//! them with failures contained.

use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tracing::{debug, error, info};

use crate::module::loader::catalog::ModuleCatalog;
use crate::module::registry::descriptor::ModuleDescriptor;
use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::{LoadId, ModuleContext, ModuleError};
use crate::module::validation::{ContractValidator, ValidatedModule};

/// Module loader for importing and running modules
pub struct ModuleLoader;

impl ModuleLoader {
    /// Import a module file and check it against the contract
    pub fn import<P: AsRef<Path>>(
        path: P,
        catalog: &ModuleCatalog,
        taken: &HashSet<String>,
    ) -> Result<ValidatedModule, ModuleError> {
        let manifest = ModuleManifest::import(path)?;
        ContractValidator::new(catalog).validate(&manifest, taken)
    }

    /// Build a descriptor for a new load of `validated`
    ///
    /// `history` is the module's previous load history (empty on first
    /// load); `load_id` is appended to it.
    pub fn instantiate(
        validated: &ValidatedModule,
        mut history: Vec<LoadId>,
        load_id: LoadId,
    ) -> ModuleDescriptor {
        debug!("Instantiating {} under load-id {}", validated.name, load_id);
        history.push(load_id);
        ModuleDescriptor {
            name: validated.name.clone(),
            dependencies: validated.dependencies.clone(),
            priority: validated.priority,
            entry: validated.entry.clone(),
            module: (validated.factory)(),
            file_path: validated.file_path.clone(),
            load_history: history,
            position: None,
            description: validated.description.clone(),
        }
    }

    /// Run a module's entry point
    ///
    /// Errors and panics raised by the module are both returned as
    /// `EntryPointFailure`; nothing unwinds into the caller.
    pub async fn invoke(descriptor: &ModuleDescriptor, ctx: ModuleContext) -> Result<(), ModuleError> {
        info!("* Initializing {} ({})", descriptor.name, ctx.load_id);
        let module = descriptor.module.clone();
        let outcome = AssertUnwindSafe(async move { module.run(ctx).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Module {} failed: {}", descriptor.name, e);
                Err(ModuleError::EntryPointFailure {
                    module: descriptor.name.clone(),
                    reason: e.to_string(),
                })
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!("Module {} panicked: {}", descriptor.name, reason);
                Err(ModuleError::EntryPointFailure {
                    module: descriptor.name.clone(),
                    reason: format!("panicked: {}", reason),
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
