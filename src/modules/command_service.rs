//! Slash command registry
//!
//! Installed into `core` as `command-service`. Other modules register their
//! commands here from their entry points; the console (or any transport)
//! dispatches raw lines through it.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::module::traits::{Module, ModuleContext, ModuleError};

/// Capability name the service is installed under
pub const COMMAND_SERVICE: &str = "command-service";

/// Privilege levels
pub const LEVEL_USER: u8 = 1;
pub const LEVEL_ADMIN: u8 = 5;
pub const LEVEL_ROOT: u8 = 10;

/// Who issued a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Peer address or console label
    pub peer: String,
    /// Privilege level
    pub level: u8,
}

impl Caller {
    pub fn new(peer: impl Into<String>, level: u8) -> Self {
        Self {
            peer: peer.into(),
            level,
        }
    }
}

/// Reply severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    Info,
    Warn,
}

/// One message sent back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub cmd: ReplyKind,
    pub code: String,
    pub text: String,
}

impl Reply {
    pub fn info(code: &str, text: impl Into<String>) -> Self {
        Self {
            cmd: ReplyKind::Info,
            code: code.to_string(),
            text: text.into(),
        }
    }

    pub fn warn(code: &str, text: impl Into<String>) -> Self {
        Self {
            cmd: ReplyKind::Warn,
            code: code.to_string(),
            text: text.into(),
        }
    }

    /// Wire form, one JSON object per reply
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.text.clone())
    }
}

/// A parsed command line
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub caller: Caller,
    /// Command name without the leading slash
    pub command: String,
    /// Arguments after the command name
    pub args: Vec<String>,
    /// The raw line
    pub line: String,
}

/// Async command handler
pub type CommandHandler = Arc<dyn Fn(CommandInvocation) -> BoxFuture<'static, Vec<Reply>> + Send + Sync>;

#[derive(Clone)]
struct RegisteredCommand {
    handler: CommandHandler,
    required_level: u8,
    description: String,
}

/// Slash command registry
#[derive(Default)]
pub struct CommandService {
    commands: RwLock<BTreeMap<String, RegisteredCommand>>,
}

impl CommandService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a slash command
    pub fn register_slash_command<F>(&self, name: &str, required_level: u8, description: &str, handler: F)
    where
        F: Fn(CommandInvocation) -> BoxFuture<'static, Vec<Reply>> + Send + Sync + 'static,
    {
        debug!("Registering /{} (level {})", name, required_level);
        self.commands
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.to_string(),
                RegisteredCommand {
                    handler: Arc::new(handler),
                    required_level,
                    description: description.to_string(),
                },
            );
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Commands visible to `level`, with descriptions
    pub fn describe(&self, level: u8) -> Vec<(String, String)> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, cmd)| cmd.required_level <= level)
            .map(|(name, cmd)| (name.clone(), cmd.description.clone()))
            .collect()
    }

    /// Parse and run a slash command line
    pub async fn dispatch(&self, line: &str, caller: Caller) -> Vec<Reply> {
        let mut args = split_args(line);
        if args.is_empty() || !args[0].starts_with('/') {
            return vec![Reply::warn("MALFORMED_COMMAND", "Commands start with '/'.")];
        }
        let command = args.remove(0).trim_start_matches('/').to_string();

        let registered = self
            .commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&command)
            .cloned();
        let Some(registered) = registered else {
            return vec![Reply::warn("UNKNOWN_COMMAND", format!("Unknown command /{}.", command))];
        };
        if caller.level < registered.required_level {
            info!("{} denied /{} (level {})", caller.peer, command, caller.level);
            return vec![Reply::warn("PERMISSION_DENIED", "You are not allowed to use this command.")];
        }

        let invocation = CommandInvocation {
            caller,
            command,
            args,
            line: line.to_string(),
        };
        (registered.handler)(invocation).await
    }
}

/// Split a command line on whitespace
pub fn split_args(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Entry point installing the service and its `/help` command
pub struct CommandServiceModule;

#[async_trait]
impl Module for CommandServiceModule {
    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        let service = Arc::new(CommandService::new());

        let weak = Arc::downgrade(&service);
        service.register_slash_command("help", LEVEL_USER, "List available commands", move |inv| {
            let service = weak.upgrade();
            async move {
                let Some(service) = service else {
                    return Vec::new();
                };
                let listing = service
                    .describe(inv.caller.level)
                    .into_iter()
                    .map(|(name, description)| format!("/{} - {}", name, description))
                    .collect::<Vec<_>>()
                    .join("\n");
                vec![Reply::info("HELP", listing)]
            }
            .boxed()
        });

        ctx.core.install_arc(COMMAND_SERVICE, service);
        info!("Command service installed ({})", ctx.load_id);
        Ok(())
    }
}
