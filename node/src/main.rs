// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ZDAG Node
//!
//! Entry point for the `zdag-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and drives a [`ZdagEngine`] from JSON commands.
//!
//! The binary supports three subcommands:
//!
//! - `run`:     process NDJSON commands from stdin, serve `/metrics`
//! - `replay`:  execute a JSON scenario file and exit
//! - `version`: print build version information
//!
//! [`ZdagEngine`]: zdag_protocol::zdag::ZdagEngine

mod cli;
mod commands;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;

use cli::{Commands, ZdagNodeCli};
use commands::{Command, Processor};
use metrics::EngineMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ZdagNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Replay(args) => replay(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Serves `/metrics`, runs periodic expiry and processes stdin until it
/// closes or a shutdown signal arrives.
async fn run(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log.log_level, args.log.log_format);

    let config = args.policy.to_config();
    tracing::info!(
        metrics_port = args.metrics_port,
        max_pool_size = config.max_pool_size,
        zdag_max_depth = config.zdag_max_depth,
        "starting zdag-node"
    );

    let metrics = Arc::new(EngineMetrics::new().context("failed to create metrics registry")?);
    let processor = Arc::new(Processor::new(config, Arc::clone(&metrics)));

    // --- Metrics server ---
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("metrics server listening on {}", metrics_addr);

    // --- Expiry sweep ---
    let expiry_loop = (args.expire_interval_secs > 0).then(|| {
        let processor = Arc::clone(&processor);
        let period = Duration::from_secs(args.expire_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let reply = processor.execute(Command::Expire { now: None });
                tracing::debug!(?reply, "expiry sweep");
            }
        })
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(metrics_listener, metrics::router(Arc::clone(&metrics))) => {
            if let Err(e) = res {
                tracing::error!("metrics server error: {}", e);
            }
        }
        res = process_stdin(Arc::clone(&processor)) => {
            res?;
            tracing::info!("stdin closed");
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Some(handle) = expiry_loop {
        handle.abort();
    }
    tracing::info!("zdag-node stopped");
    Ok(())
}

/// Executes one command per stdin line, writing one reply per stdout line.
async fn process_stdin(processor: Arc<Processor>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = processor.execute_line(&line);
        let mut out = serde_json::to_vec(&reply).context("failed to encode reply")?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Executes a scenario file and prints one reply per command.
fn replay(args: cli::ReplayArgs) -> Result<()> {
    logging::init_logging(&args.log.log_level, args.log.log_format);

    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read scenario {}", args.scenario.display()))?;
    let script: Vec<Command> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse scenario {}", args.scenario.display()))?;
    tracing::info!(commands = script.len(), "replaying scenario");

    let metrics = Arc::new(EngineMetrics::new().context("failed to create metrics registry")?);
    let processor = Processor::new(args.policy.to_config(), Arc::clone(&metrics));

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for command in script {
        let reply = processor.execute(command);
        serde_json::to_writer(&mut out, &reply).context("failed to encode reply")?;
        writeln!(out)?;
    }

    if args.metrics {
        write!(out, "{}", metrics.encode()?)?;
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("zdag-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. A handler that cannot
/// be installed is logged and simply never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
