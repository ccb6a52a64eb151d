//! Process-wide error sink
//!
//! Subscribes to the kernel's `error` event, tags each error with a short
//! id an operator can grep for, and counts it in [`ServerStats`].

use async_trait::async_trait;
use tracing::error;

use crate::module::api::{EventKind, KernelEvent};
use crate::module::traits::{Module, ModuleContext, ModuleError};
use crate::modules::server_state::ServerStats;

/// Random 8-hex-digit error id
pub fn error_id() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}

/// Entry point for `handle-error`
pub struct HandleErrorModule;

#[async_trait]
impl Module for HandleErrorModule {
    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        let events = ctx.api.events();
        // A single-module reload must not stack a second handler
        events.remove_listeners(EventKind::Error);

        let hold = ctx.hold.clone();
        events.subscribe(EventKind::Error, move |event| {
            let KernelEvent::Error { error, context } = event else {
                return;
            };
            let id = error_id();
            match context {
                Some(context) => error!("SERVER ERROR #{} while serving {}: {}", id, context.peer, error),
                None => error!("SERVER ERROR #{}: {}", id, error),
            }
            if let Some(stats) = ServerStats::shared(&hold) {
                stats.record_error();
            }
        });
        Ok(())
    }
}
