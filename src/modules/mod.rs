//! Host modules compiled into the binary
//!
//! Each is reachable from a module file through its `run` key.

pub mod command_service;
pub mod handle_error;
pub mod reload;
pub mod server_state;

pub use command_service::{
    Caller, CommandInvocation, CommandService, CommandServiceModule, Reply, ReplyKind, COMMAND_SERVICE,
    LEVEL_ADMIN, LEVEL_ROOT, LEVEL_USER,
};
pub use handle_error::HandleErrorModule;
pub use reload::ReloadCommand;
pub use server_state::{ServerStateModule, ServerStats, SERVER_STATS};

use crate::module::loader::ModuleCatalog;

/// Catalog with every host module registered under its `run` key
pub fn builtin_catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    catalog
        .register("server-state", || ServerStateModule)
        .register("handle-error", || HandleErrorModule)
        .register("command-service", || CommandServiceModule)
        .register("reload", || ReloadCommand);
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_keys() {
        assert_eq!(
            builtin_catalog().keys(),
            vec!["command-service", "handle-error", "reload", "server-state"]
        );
    }
}
