//! `/reload` administrative command
//!
//! - `/reload` reloads every module
//! - `/reload <name>` reloads one module under a new load-id
//! - `/reload <name> <load-id>` rolls a module back to a recorded load-id
//! - `/reload list <name>` lists a module's recorded load-ids

use async_trait::async_trait;
use futures::FutureExt;
use std::time::Instant;
use tracing::{info, warn};

use crate::module::api::StateStore;
use crate::module::manager::ModuleManager;
use crate::module::traits::{LoadId, Module, ModuleContext, ModuleError, RollbackOutcome};
use crate::modules::command_service::{CommandInvocation, CommandService, Reply, COMMAND_SERVICE, LEVEL_ROOT};
use crate::modules::server_state::ServerStats;
use crate::utils::time::elapsed_millis;

const CODE: &str = "ROOT";

/// Entry point for `reload`
pub struct ReloadCommand;

#[async_trait]
impl Module for ReloadCommand {
    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        let Some(service) = ctx.core.get::<CommandService>(COMMAND_SERVICE) else {
            warn!("No command service installed, /reload unavailable");
            return Ok(());
        };

        let api = ctx.api.clone();
        let hold = ctx.hold.clone();
        service.register_slash_command("reload", LEVEL_ROOT, "Reload modules", move |inv| {
            let api = api.clone();
            let hold = hold.clone();
            async move { reload(&api, &hold, inv).await }.boxed()
        });
        Ok(())
    }
}

/// Route a `/reload` invocation
pub async fn reload(api: &ModuleManager, hold: &StateStore, inv: CommandInvocation) -> Vec<Reply> {
    if let Some(stats) = ServerStats::shared(hold) {
        stats.record_command();
    }
    let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
    info!("{} issued {}", inv.caller.peer, inv.line.trim());

    match args.as_slice() {
        [] => reload_all(api, hold).await,
        ["list", name] => list_versions(api, name).await,
        [name] => reload_module(api, name).await,
        [name, version] => rollback_module(api, name, version).await,
        _ => vec![Reply::warn("MALFORMED_COMMAND", "Usage: /reload [list] [name] [load-id]")],
    }
}

async fn reload_all(api: &ModuleManager, hold: &StateStore) -> Vec<Reply> {
    let started = Instant::now();
    let mut replies = vec![Reply::info(CODE, "Full reload requested.")];

    let report = api.reload_all_soft().await;
    if let Some(stats) = ServerStats::shared(hold) {
        stats.mark_reload();
    }
    let elapsed = elapsed_millis(started);

    if report.success() {
        replies.push(Reply::info(
            CODE,
            format!("Full reload finished in {} ms ({} modules).", elapsed, report.loaded.len()),
        ));
    } else {
        replies.push(Reply::warn(
            CODE,
            format!(
                "Full reload failed after {} ms: {} rejected, {} failed.",
                elapsed,
                report.rejected.len(),
                report.failed.len()
            ),
        ));
    }
    replies
}

async fn reload_module(api: &ModuleManager, name: &str) -> Vec<Reply> {
    if api.get_module(name).await.is_none() {
        return vec![not_found(name)];
    }
    let started = Instant::now();
    match api.reload_one(name).await {
        Ok(load_id) => vec![Reply::info(
            CODE,
            format!(
                "Module {} reloaded, current version is {}, took {} ms.",
                name,
                load_id,
                elapsed_millis(started)
            ),
        )],
        Err(e) => vec![failed(name, &e)],
    }
}

async fn rollback_module(api: &ModuleManager, name: &str, version: &str) -> Vec<Reply> {
    let target = LoadId::from(version);
    let started = Instant::now();
    match api.rollback(name, &target).await {
        Ok(RollbackOutcome::AlreadyCurrent) => {
            vec![Reply::info(CODE, format!("Module {} is already at version {}.", name, target))]
        }
        Ok(RollbackOutcome::RolledBack(load_id)) => vec![Reply::info(
            CODE,
            format!(
                "Module {} restored to version {}, took {} ms.",
                name,
                load_id,
                elapsed_millis(started)
            ),
        )],
        Err(ModuleError::UnknownModule(_)) => vec![not_found(name)],
        Err(ModuleError::UnknownVersion { .. }) => vec![Reply::info(
            CODE,
            format!("Module {} has no version {}.", name, target),
        )],
        Err(e) => vec![failed(name, &e)],
    }
}

async fn list_versions(api: &ModuleManager, name: &str) -> Vec<Reply> {
    match api.list_versions(name).await {
        Ok(versions) => {
            let listing = versions
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    let marker = if entry.current { " (current)" } else { "" };
                    format!("[{}] {}{}", i + 1, entry.load_id, marker)
                })
                .collect::<Vec<_>>()
                .join("\n");
            vec![
                Reply::info(CODE, format!("Versions of module {}:", name)),
                Reply::info(CODE, listing),
            ]
        }
        Err(_) => vec![not_found(name)],
    }
}

fn not_found(name: &str) -> Reply {
    Reply::info(CODE, format!("Module {} does not exist.", name))
}

/// The error itself goes to the `error` event; the caller gets a short line
fn failed(name: &str, error: &ModuleError) -> Reply {
    let what = match error {
        ModuleError::EntryPointFailure { .. } => "its entry point failed",
        ModuleError::InvalidManifest(_)
        | ModuleError::MissingEntryPoint { .. }
        | ModuleError::MissingName { .. }
        | ModuleError::MalformedDependencies { .. }
        | ModuleError::MalformedPriority { .. } => "its module file is invalid",
        _ => "the operation failed",
    };
    Reply::warn(CODE, format!("Module {} could not be reloaded: {}.", name, what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::loader::ModuleCatalog;
    use crate::modules::command_service::Caller;
    use tempfile::TempDir;

    async fn manager_with(dir: &TempDir) -> ModuleManager {
        std::fs::write(dir.path().join("a.toml"), "run = \"noop\"\nname = \"a\"\n").unwrap();
        let mut catalog = ModuleCatalog::new();
        catalog.register_fn("noop", |_ctx| async { Ok(()) });
        let manager = ModuleManager::new(dir.path(), catalog);
        manager.initialize(false).await.unwrap();
        manager
    }

    fn invocation(args: &[&str]) -> CommandInvocation {
        let mut line = String::from("/reload");
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        CommandInvocation {
            caller: Caller::new("console", LEVEL_ROOT),
            command: "reload".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            line,
        }
    }

    #[tokio::test]
    async fn test_too_many_arguments_is_malformed() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with(&dir).await;
        let replies = reload(&manager, &StateStore::new(), invocation(&["a", "b", "c"])).await;
        assert_eq!(replies[0].code, "MALFORMED_COMMAND");
    }

    #[tokio::test]
    async fn test_unknown_module_replies_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with(&dir).await;
        let replies = reload(&manager, &StateStore::new(), invocation(&["ghost"])).await;
        assert_eq!(replies, vec![not_found("ghost")]);

        let replies = reload(&manager, &StateStore::new(), invocation(&["list", "ghost"])).await;
        assert_eq!(replies, vec![not_found("ghost")]);
    }

    #[tokio::test]
    async fn test_list_marks_current() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with(&dir).await;
        let first = manager.get_module("a").await.unwrap().load_history[0].clone();
        let second = manager.reload_one("a").await.unwrap();

        let replies = reload(&manager, &StateStore::new(), invocation(&["list", "a"])).await;
        assert_eq!(replies[1].text, format!("[1] {}\n[2] {} (current)", first, second));
    }
}
