//! Long-lived server bookkeeping
//!
//! Seeds `hold` with a [`ServerStats`] record the first time it runs and
//! only touches `last_reload` afterwards, so counters survive every reload.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::module::api::StateStore;
use crate::module::traits::{Module, ModuleContext, ModuleError};
use crate::utils::current_timestamp;

/// Key the stats record lives under in `hold`
pub const SERVER_STATS: &str = "server-stats";

/// Process-wide counters
#[derive(Debug)]
pub struct ServerStats {
    /// Unix seconds the record was created
    pub started_at: u64,
    last_reload: AtomicU64,
    errors: AtomicU64,
    commands: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        let now = current_timestamp();
        Self {
            started_at: now,
            last_reload: AtomicU64::new(now),
            errors: AtomicU64::new(0),
            commands: AtomicU64::new(0),
        }
    }

    /// Fetch the shared record, creating it if nothing seeded it yet
    ///
    /// `None` if the key holds something else.
    pub fn shared(hold: &StateStore) -> Option<Arc<ServerStats>> {
        hold.get_or_insert_with(SERVER_STATS, ServerStats::new)
    }

    pub fn last_reload(&self) -> u64 {
        self.last_reload.load(Ordering::Relaxed)
    }

    pub fn mark_reload(&self) {
        self.last_reload.store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn record_error(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    /// Seconds since the record was created
    pub fn uptime(&self) -> u64 {
        current_timestamp().saturating_sub(self.started_at)
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point for `server-state`
pub struct ServerStateModule;

#[async_trait]
impl Module for ServerStateModule {
    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        let fresh = !ctx.hold.contains(SERVER_STATS);
        let stats = ServerStats::shared(&ctx.hold).ok_or_else(|| {
            ModuleError::OperationError(format!("'{}' in hold is not server stats", SERVER_STATS))
        })?;
        stats.mark_reload();

        if fresh {
            info!("Server state seeded at {}", stats.started_at);
        } else {
            debug!(
                "Server state kept across reload (uptime {}s, {} errors)",
                stats.uptime(),
                stats.errors()
            );
        }
        Ok(())
    }
}
