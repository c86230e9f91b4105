// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mcpxd — the mcpx background daemon.
//!
//! Spawned detached by the CLI on first use. Serves requests over a
//! per-user Unix socket and terminates itself once every MCP session has
//! been idle past the keepalive window.

use std::io::Write as _;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcpx_daemon::cache::ResponseCache;
use mcpx_daemon::config::{Config, FileConfigLoader};
use mcpx_daemon::handler::{Handler, HandlerDeps, TempStore};
use mcpx_daemon::keepalive::{IdleCallback, KeepaliveManager, SessionCloser};
use mcpx_daemon::lifecycle::{self, Paths};
use mcpx_daemon::listener::{ListenCtx, Listener};
use mcpx_daemon::pool::{Pool, RmcpConnector};
use mcpx_daemon::env;

fn main() {
    if let Err(e) = run() {
        eprintln!("mcpxd: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let paths = Paths::load()?;
    std::fs::create_dir_all(&paths.runtime_dir)?;

    // Startup marker goes in before tracing initializes, so even an early
    // failure leaves a trace in daemon.log.
    if let Ok(mut log) =
        std::fs::OpenOptions::new().create(true).append(true).open(&paths.log_path)
    {
        let _ = writeln!(log, "--- mcpxd: starting (pid: {}) ---\n", std::process::id());
    }

    let file_appender = tracing_appender::rolling::never(&paths.runtime_dir, "daemon.log");
    let (writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env::log_filter()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    // Detach from the spawning client's session.
    let _ = nix::unistd::setsid();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(paths))
}

async fn serve(paths: Paths) -> Result<(), Box<dyn std::error::Error>> {
    let (state, unix_listener) = lifecycle::startup(&paths)?;

    let pool = Arc::new(Pool::new(Config::default(), Arc::new(RmcpConnector::new())));

    // When every server has been idle past the window, SIGTERM ourselves;
    // the signal loop below owns the clean teardown.
    let on_all_idle: IdleCallback = Arc::new(|| {
        info!("all servers idle, terminating");
        let _ = nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM);
    });
    let keepalive = Arc::new(KeepaliveManager::new(
        env::idle_timeout(),
        Arc::clone(&pool) as Arc<dyn SessionCloser>,
        Some(on_all_idle),
    ));

    let handler = Arc::new(Handler::new(
        HandlerDeps {
            config_loader: Arc::new(FileConfigLoader::new()),
            request_shutdown: Arc::new(|| {
                tokio::spawn(async {
                    // Give the response a moment to flush before the
                    // signal lands.
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    let _ = nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM);
                });
            }),
        },
        Arc::clone(&pool),
        keepalive,
        ResponseCache::new(&paths.cache_dir),
        TempStore::new(),
    ));

    let ctx = Arc::new(ListenCtx { nonce: state.nonce.clone(), handler });
    let shutdown = CancellationToken::new();
    let listener_task = tokio::spawn(Listener::new(unix_listener, ctx).run(shutdown.clone()));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    shutdown.cancel();
    let _ = listener_task.await;
    pool.close_all().await;
    state.shutdown();
    Ok(())
}
