// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle hook engine.
//!
//! Events fire to handlers declared in `hooks.json` (or `alt-hooks.json`
//! when the primary is absent; only one file applies). Handlers run
//! sequentially in declaration order. For pre-* events a blocking handler
//! stops dispatch; for everything else failures are logged and ignored.

use chrono::{DateTime, SecondsFormat, Utc};
use gaffer_adapters::subprocess::run_with_timeout;
use gaffer_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// The closed set of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    PreSessionStart,
    PostSessionStart,
    PreShutdown,
    PostShutdown,
    MailReceived,
    WorkAssigned,
    SessionIdle,
    OnPaneOutput,
}

impl HookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            HookEvent::PreSessionStart => "pre-session-start",
            HookEvent::PostSessionStart => "post-session-start",
            HookEvent::PreShutdown => "pre-shutdown",
            HookEvent::PostShutdown => "post-shutdown",
            HookEvent::MailReceived => "mail-received",
            HookEvent::WorkAssigned => "work-assigned",
            HookEvent::SessionIdle => "session-idle",
            HookEvent::OnPaneOutput => "on-pane-output",
        }
    }

    /// Pre-events may block the enclosing operation.
    pub fn is_pre(self) -> bool {
        matches!(self, HookEvent::PreSessionStart | HookEvent::PreShutdown)
    }

    fn all() -> [HookEvent; 8] {
        [
            HookEvent::PreSessionStart,
            HookEvent::PostSessionStart,
            HookEvent::PreShutdown,
            HookEvent::PostShutdown,
            HookEvent::MailReceived,
            HookEvent::WorkAssigned,
            HookEvent::SessionIdle,
            HookEvent::OnPaneOutput,
        ]
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Context handed to every handler.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub event: HookEvent,
    pub timestamp: DateTime<Utc>,
    pub workdir: PathBuf,
    pub metadata: HashMap<String, String>,
}

impl HookContext {
    pub fn new(event: HookEvent, workdir: impl Into<PathBuf>) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            workdir: workdir.into(),
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// Outcome of one handler.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub success: bool,
    pub message: String,
    pub block: bool,
}

/// Outcome of firing one event.
#[derive(Debug, Clone, Default)]
pub struct FireResult {
    pub outcomes: Vec<HandlerOutcome>,
    pub blocked: bool,
    pub block_message: Option<String>,
}

/// Handler declaration from the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum HandlerConfig {
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Builtin {
        name: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct HookConfigFile {
    #[serde(default)]
    hooks: HashMap<String, Vec<HandlerConfig>>,
}

/// In-process handler: (success, message, block) from a context.
pub type BuiltinHandler = Arc<dyn Fn(&HookContext) -> HandlerOutcome + Send + Sync>;

/// Dispatches lifecycle events to configured handlers.
pub struct HookEngine {
    handlers: HashMap<HookEvent, Vec<HandlerConfig>>,
    builtins: HashMap<String, BuiltinHandler>,
    timeout: Duration,
}

impl std::fmt::Debug for HookEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookEngine")
            .field("handlers", &self.handlers)
            .field("builtins", &self.builtins.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HookEngine {
    /// Load configuration from the primary path, falling back to the
    /// secondary. Only one file applies; primary wins. Missing both
    /// yields an engine with no handlers.
    pub fn load(primary: &Path, fallback: &Path, timeout: Duration) -> Result<Self> {
        let config = match read_config(primary)? {
            Some(config) => config,
            None => read_config(fallback)?.unwrap_or_default(),
        };

        let mut handlers: HashMap<HookEvent, Vec<HandlerConfig>> = HashMap::new();
        for event in HookEvent::all() {
            if let Some(declared) = config.hooks.get(event.as_str()) {
                handlers.insert(event, declared.clone());
            }
        }
        for name in config.hooks.keys() {
            if !HookEvent::all().iter().any(|e| e.as_str() == name) {
                tracing::warn!(event = %name, "unknown hook event in config, ignoring");
            }
        }

        Ok(Self {
            handlers,
            builtins: HashMap::new(),
            timeout,
        })
    }

    /// Engine with no configured handlers (every fire is a no-op).
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            builtins: HashMap::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Register an in-process handler addressable as `builtin` type.
    pub fn register_builtin(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&HookContext) -> HandlerOutcome + Send + Sync + 'static,
    ) {
        self.builtins.insert(name.into(), Arc::new(handler));
    }

    /// Number of handlers declared for `event`.
    pub fn handler_count(&self, event: HookEvent) -> usize {
        self.handlers.get(&event).map(Vec::len).unwrap_or(0)
    }

    /// Fire `event` with `ctx`.
    ///
    /// Pre-events stop on the first blocking handler; the result carries
    /// `blocked` and the blocker's message. Non-pre events run every
    /// handler, logging failures.
    pub async fn fire(&self, ctx: &HookContext) -> FireResult {
        let mut result = FireResult::default();
        let Some(declared) = self.handlers.get(&ctx.event) else {
            return result;
        };

        for handler in declared {
            let outcome = match handler {
                HandlerConfig::Command { command, args } => {
                    self.run_command(command, args, ctx).await
                }
                HandlerConfig::Builtin { name } => self.run_builtin(name, ctx),
            };

            if !outcome.success {
                tracing::warn!(
                    event = %ctx.event,
                    message = %outcome.message,
                    "hook handler failed"
                );
            }

            let blocks = ctx.event.is_pre() && outcome.block;
            let message = outcome.message.clone();
            result.outcomes.push(outcome);

            if blocks {
                result.blocked = true;
                result.block_message = Some(message);
                break;
            }
        }

        result
    }

    async fn run_command(&self, command: &str, args: &[String], ctx: &HookContext) -> HandlerOutcome {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(&ctx.workdir)
            .env("EVENT", ctx.event.as_str())
            .env(
                "TIMESTAMP",
                ctx.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        for (key, value) in &ctx.metadata {
            cmd.env(key.to_uppercase(), value);
        }

        match run_with_timeout(cmd, self.timeout, "hook command").await {
            Ok(output) => {
                let success = output.status.success();
                let message = if output.stderr.is_empty() {
                    String::from_utf8_lossy(&output.stdout).trim().to_string()
                } else {
                    String::from_utf8_lossy(&output.stderr).trim().to_string()
                };
                HandlerOutcome {
                    success,
                    message,
                    // Non-zero exit signals block for pre-events.
                    block: !success,
                }
            }
            Err(message) => HandlerOutcome {
                success: false,
                message,
                block: true,
            },
        }
    }

    fn run_builtin(&self, name: &str, ctx: &HookContext) -> HandlerOutcome {
        let Some(handler) = self.builtins.get(name) else {
            return HandlerOutcome {
                success: false,
                message: format!("unknown builtin handler: {}", name),
                block: false,
            };
        };
        let handler = Arc::clone(handler);
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(ctx))) {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(event = %ctx.event, builtin = name, "builtin handler panicked");
                HandlerOutcome {
                    success: false,
                    message: format!("builtin {} panicked", name),
                    block: false,
                }
            }
        }
    }
}

fn read_config(path: &Path) -> Result<Option<HookConfigFile>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(gaffer_core::error::io_error("hook.ConfigIO", path, e)),
    };
    serde_json::from_str(&text).map(Some).map_err(|e| {
        Error::user("hook.ConfigInvalid", e.to_string())
            .with_context("path", path.display())
            .with_hint("fix the hooks JSON; shape is {\"hooks\": {\"<event>\": [handlers]}}")
            .with_cause(e)
    })
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
