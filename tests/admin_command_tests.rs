//! Admin command tests
//!
//! Boots the shipped module directory with the builtin catalog and drives
//! `/reload` through the installed command service.

mod common;

use common::ModuleTestFixture;
use std::path::Path;
use std::sync::Arc;

use hotwire_chat::module::{ErrorContext, ModuleError, ModuleManager};
use hotwire_chat::modules::{
    builtin_catalog, Caller, CommandService, Reply, ReplyKind, ServerStats, COMMAND_SERVICE,
    LEVEL_ADMIN, LEVEL_ROOT, SERVER_STATS,
};

const SHIPPED: &[&str] = &[
    "core/server-state.toml",
    "core/handle-error.toml",
    "core/command-service.toml",
    "command/reload.toml",
];

/// Copy the repository's module files into the fixture
fn install_shipped_modules(fixture: &ModuleTestFixture) {
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("modules");
    for relative in SHIPPED {
        let body = std::fs::read_to_string(source.join(relative)).unwrap();
        fixture.write(relative, &body);
    }
}

async fn boot() -> (ModuleTestFixture, ModuleManager) {
    let fixture = ModuleTestFixture::new();
    install_shipped_modules(&fixture);
    let manager = fixture.manager(builtin_catalog());
    manager.initialize(false).await.unwrap();
    (fixture, manager)
}

fn service(manager: &ModuleManager) -> Arc<CommandService> {
    manager
        .capabilities()
        .get::<CommandService>(COMMAND_SERVICE)
        .unwrap()
}

async fn root(manager: &ModuleManager, line: &str) -> Vec<Reply> {
    service(manager).dispatch(line, Caller::new("console", LEVEL_ROOT)).await
}

#[tokio::test]
async fn test_shipped_modules_load_in_order() {
    let (_fixture, manager) = boot().await;
    assert_eq!(
        manager.load_order().await,
        vec!["server-state", "handle-error", "command-service", "reload"]
    );
    assert!(manager.state().contains(SERVER_STATS));
}

#[tokio::test]
async fn test_reload_requires_root() {
    let (_fixture, manager) = boot().await;
    let replies = service(&manager)
        .dispatch("/reload", Caller::new("10.0.0.2", LEVEL_ADMIN))
        .await;
    assert_eq!(replies, vec![Reply::warn("PERMISSION_DENIED", "You are not allowed to use this command.")]);

    let replies = service(&manager)
        .dispatch("/help", Caller::new("10.0.0.2", LEVEL_ADMIN))
        .await;
    assert!(!replies[0].text.contains("/reload"));
    let replies = root(&manager, "/help").await;
    assert!(replies[0].text.contains("/reload - Reload modules"));
}

#[tokio::test]
async fn test_reload_single_module() {
    let (_fixture, manager) = boot().await;

    let replies = root(&manager, "/reload handle-error").await;

    let current = manager
        .get_module("handle-error")
        .await
        .unwrap()
        .current_load_id()
        .cloned()
        .unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].cmd, ReplyKind::Info);
    assert!(replies[0].text.contains(&format!("current version is {}", current)));
    assert_eq!(manager.list_versions("handle-error").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_and_rollback() {
    let (_fixture, manager) = boot().await;
    let first = manager.list_versions("server-state").await.unwrap()[0].load_id.clone();
    root(&manager, "/reload server-state").await;

    let replies = root(&manager, "/reload list server-state").await;
    assert_eq!(replies[0].text, "Versions of module server-state:");
    assert!(replies[1].text.starts_with(&format!("[1] {}\n[2] ", first)));
    assert!(replies[1].text.ends_with(" (current)"));

    let replies = root(&manager, &format!("/reload server-state {}", first)).await;
    assert!(replies[0].text.contains(&format!("restored to version {}", first)));

    let replies = root(&manager, &format!("/reload server-state {}", first)).await;
    assert_eq!(
        replies[0].text,
        format!("Module server-state is already at version {}.", first)
    );

    let replies = root(&manager, "/reload server-state nope42").await;
    assert_eq!(replies[0].text, "Module server-state has no version nope42.");
}

#[tokio::test]
async fn test_unknown_module_and_malformed() {
    let (_fixture, manager) = boot().await;

    let replies = root(&manager, "/reload ghost").await;
    assert_eq!(replies[0].text, "Module ghost does not exist.");

    let replies = root(&manager, "/reload ghost abc123").await;
    assert_eq!(replies[0].text, "Module ghost does not exist.");

    let replies = root(&manager, "/reload a b c").await;
    assert_eq!(replies[0].code, "MALFORMED_COMMAND");
}

#[tokio::test]
async fn test_full_reload_replaces_services_and_keeps_state() {
    let (_fixture, manager) = boot().await;
    let old_service = service(&manager);
    let stats = manager.state().get::<ServerStats>(SERVER_STATS).unwrap();

    let replies = root(&manager, "/reload").await;

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].text, "Full reload requested.");
    assert!(replies[1].text.starts_with("Full reload finished in "));
    assert!(replies[1].text.ends_with("(4 modules)."));

    let new_service = service(&manager);
    assert!(!Arc::ptr_eq(&old_service, &new_service));
    assert!(new_service.has_command("reload"));

    let kept = manager.state().get::<ServerStats>(SERVER_STATS).unwrap();
    assert!(Arc::ptr_eq(&stats, &kept));
    assert_eq!(kept.commands(), 1);
    for info in manager.list_modules().await {
        assert_eq!(info.load_history.len(), 2, "{}", info.name);
    }
}

#[tokio::test]
async fn test_full_reload_failure_is_reported() {
    let (fixture, manager) = boot().await;
    fixture.write("command/broken.toml", "run = \"reload\"\n");

    let replies = root(&manager, "/reload").await;

    assert_eq!(replies[1].cmd, ReplyKind::Warn);
    assert!(replies[1].text.contains("1 rejected"));
    // Previous generation still serves commands
    assert!(service(&manager).has_command("reload"));
}

#[tokio::test]
async fn test_errors_are_counted_by_handler() {
    let (_fixture, manager) = boot().await;
    let stats = manager.state().get::<ServerStats>(SERVER_STATS).unwrap();

    manager.report_error(
        ModuleError::OperationError("send failed".to_string()),
        Some(ErrorContext::peer("10.0.0.9")),
    );
    manager.report_error(ModuleError::OperationError("tick failed".to_string()), None);
    assert_eq!(stats.errors(), 2);

    // Reloading the handler must not double-count
    root(&manager, "/reload handle-error").await;
    manager.report_error(ModuleError::OperationError("again".to_string()), None);
    assert_eq!(stats.errors(), 3);
}

#[tokio::test]
async fn test_errors_from_later_modules_are_counted() {
    let fixture = ModuleTestFixture::new();
    install_shipped_modules(&fixture);
    fixture.write(
        "feature/broken.toml",
        &common::manifest("broken-feature", "broken", &[], 0),
    );
    let mut catalog = builtin_catalog();
    catalog.register_fn("broken", |_ctx| async {
        Err(ModuleError::OperationError("boot failed".to_string()))
    });
    let manager = fixture.manager(catalog);

    let report = manager.initialize(true).await.unwrap();

    assert_eq!(report.failed, vec!["broken-feature"]);
    let order = manager.load_order().await;
    let handler = order.iter().position(|n| n == "handle-error").unwrap();
    let broken = order.iter().position(|n| n == "broken-feature").unwrap();
    assert!(handler < broken);
    let stats = manager.state().get::<ServerStats>(SERVER_STATS).unwrap();
    assert!(stats.errors() > 0);
}
