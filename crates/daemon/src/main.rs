// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gaffer coordinator daemon (gafferd)
//!
//! Background process that supervises the agent pool: claims flow to
//! workers, sessions are monitored, mail is orchestrated, and state is
//! recovered after crashes.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use gaffer_adapters::{GitCli, TmuxAdapter};
use gaffer_core::{Config, SystemClock};
use gaffer_daemon::coordinator::{Coordinator, CoordinatorDeps};
use gaffer_daemon::env;
use gaffer_daemon::inject::PoolInjector;
use gaffer_daemon::lifecycle::{LifecycleError, PidLock};
use gaffer_engine::{
    HookEngine, MailOrchestrator, NullBacklog, Router, RouterRegistry, SessionManager,
};
use gaffer_storage::{
    AgentStateStore, LockManager, MailboxStore, OrchQueueStore, RootLayout, WorkQueue,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};

/// Rotate the daemon log when it grows past this size.
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

const EXIT_OK: u8 = 0;
const EXIT_CONFIG: u8 = 1;
const EXIT_INCONSISTENT: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("gafferd {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::from(EXIT_OK);
            }
            "--help" | "-h" | "help" => {
                print_help();
                return ExitCode::from(EXIT_OK);
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: gafferd [--help | --version]");
                return ExitCode::from(EXIT_CONFIG);
            }
        }
    }

    let root = match env::state_root() {
        Ok(root) => root,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let layout = RootLayout::new(&root);

    let config = match Config::load(&layout.config_file()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.render());
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let log_path = root.join("gafferd.log");
    rotate_log_if_needed(&log_path);
    let _log_guard = match setup_logging(&log_path) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: cannot set up logging: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    info!(pid = std::process::id(), root = %root.display(), "gafferd starting");

    let (pid_lock, crashed) = match PidLock::acquire(&layout) {
        Ok(result) => result,
        Err(LifecycleError::AlreadyRunning) => {
            eprintln!("error: another coordinator is already running");
            return ExitCode::from(EXIT_CONFIG);
        }
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let locks = LockManager::new(layout.locks_dir(), &config.lock);
    let queue = WorkQueue::new(layout.clone(), locks);
    let agents = AgentStateStore::new(layout.clone());

    let hooks = match HookEngine::load(
        &layout.hooks_file(),
        &layout.alt_hooks_file(),
        config.hook_timeout(),
    ) {
        Ok(hooks) => Arc::new(hooks),
        Err(e) => {
            eprintln!("{}", e.render());
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // Mail plane: router over the registry, orchestrator loops above it.
    let registry = match RouterRegistry::load(&root.join("registry.json")) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{}", e.render());
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let locks_for_mail = LockManager::new(layout.locks_dir(), &config.lock);
    let router = Arc::new(Router::new(
        MailboxStore::new(layout.clone(), locks_for_mail.clone()),
        Arc::clone(&hooks),
        registry.clone(),
    ));
    let injector = Arc::new(PoolInjector::new(
        SessionManager::new(
            TmuxAdapter::new(),
            agents.clone(),
            Arc::clone(&hooks),
            SystemClock,
            config.session_startup_wait(),
        ),
        registry,
    ));
    let orchestrator = Arc::new(MailOrchestrator::new(
        OrchQueueStore::new(layout.clone(), locks_for_mail),
        router,
        injector,
        Arc::new(NullBacklog),
        SystemClock,
        config.orchestrator.clone(),
    ));
    let mail_handle = orchestrator.spawn();

    let coordinator = Coordinator::new(CoordinatorDeps {
        layout,
        queue,
        agents,
        session_adapter: TmuxAdapter::new(),
        vcs: GitCli::new(),
        hooks,
        clock: SystemClock,
        cfg: config,
        base_repo: root.join("rig"),
        agent_cmd: env::agent_command(),
    });

    if crashed {
        info!("previous coordinator crashed, running recovery sweep");
    }
    match coordinator.recover() {
        Ok(report) => {
            if !report.dead_agents.is_empty() || !report.reclaimed_items.is_empty() {
                info!(
                    dead_agents = report.dead_agents.len(),
                    reclaimed = report.reclaimed_items.len(),
                    "startup recovery complete"
                );
            }
        }
        Err(e) => {
            error!(error = %e, "startup recovery failed");
            return ExitCode::from(EXIT_INCONSISTENT);
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interrupted = tokio::spawn(signal_loop(shutdown_tx));

    if let Err(e) = coordinator.run(shutdown_rx).await {
        error!(error = %e, "coordinator failed");
    }
    mail_handle.shutdown().await;

    drop(pid_lock);
    info!("gafferd stopped");

    // The signal task may still be waiting if shutdown came from
    // somewhere else; abort rather than hang on it.
    interrupted.abort();
    match interrupted.await {
        Ok(true) => ExitCode::from(EXIT_INTERRUPTED),
        _ => ExitCode::from(EXIT_OK),
    }
}

/// Flip the shutdown signal on SIGINT/SIGTERM; true when interrupted.
async fn signal_loop(shutdown_tx: watch::Sender<bool>) -> bool {
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let interrupted = tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received, shutting down");
            true
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down");
            false
        }
    };
    let _ = shutdown_tx.send(true);
    interrupted
}

fn print_help() {
    println!("gafferd {}", env!("CARGO_PKG_VERSION"));
    println!("Gaffer coordinator - supervises a pool of coding agents");
    println!();
    println!("USAGE:");
    println!("    gafferd");
    println!();
    println!("State lives under $GAFFER_ROOT (default ~/.local/state/gaffer).");
    println!("Configuration is read from <root>/config.json.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

/// Keep the previous log around as `.old` once the current one is large.
fn rotate_log_if_needed(path: &Path) {
    let Ok(meta) = std::fs::metadata(path) else {
        return;
    };
    if meta.len() > MAX_LOG_SIZE {
        let old = path.with_extension("log.old");
        let _ = std::fs::rename(path, old);
    }
}

fn setup_logging(
    path: &Path,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
