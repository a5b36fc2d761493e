// ███╗   ███╗ █████╗ ███████╗████████╗███████╗██████╗ ███████╗
// ████╗ ████║██╔══██╗██╔════╝╚══██╔══╝██╔════╝██╔══██╗██╔════╝
// ██╔████╔██║███████║███████╗   ██║   █████╗  ██████╔╝███████╗
// ██║╚██╔╝██║██╔══██║╚════██║   ██║   ██╔══╝  ██╔══██╗╚════██║
// ██║ ╚═╝ ██║██║  ██║███████║   ██║   ███████╗██║  ██║███████║
// ╚═╝     ╚═╝╚═╝  ╚═╝╚══════╝   ╚═╝   ╚══════╝╚═╝  ╚═╝╚══════╝
//
// R A N K I N G S   E N G I N E
//
// Pulls masters athletics rankings tables off the web, one year / age group /
// event at a time, and files every row into SQLite as an athlete, a meet and
// a performance. Run it twice and nothing changes the second time.

mod cli;
mod config;
mod error;
mod extractor;
mod fetch;
mod magnitude;
mod markup;
mod metrics;
mod models;
mod normalizer;
mod pipeline;
mod query_plan;
mod stats;
mod stats_server;
mod store;
mod writer;

use std::io::{self, BufWriter};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::{Cli, Command, QueryArgs};
use crate::config::Config;
use crate::fetch::HttpRankingsClient;
use crate::metrics::IngestMetrics;
use crate::pipeline::RunOptions;
use crate::stats::StatsQuery;
use crate::store::SqliteStore;

fn print_banner(config: &Config) {
    let banner = r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║   🏃  MASTERS RANKINGS ENGINE                                 ║
    ║                                                              ║
    ║   fetch ─▶ extract ─▶ normalize ─▶ INSERT OR IGNORE          ║
    ║                                                              ║
    ║   "Every masters mark, counted exactly once."                ║
    ╚══════════════════════════════════════════════════════════════╝
    "#;
    eprintln!("{}", banner);
    eprintln!("    source:   {}", config.rankings_url);
    eprintln!("    database: {}\n", config.database_path);
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    // Logs go to stderr so `read` can own stdout.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(debug)
        .with_line_number(debug)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = Config::from_env();
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    match cli.command {
        Command::Import(args) => import(&config, &args).await,
        Command::Read(args) => read(&config, &args).await,
        Command::Stats(args) => {
            let store = SqliteStore::open(&config.database_path)?;
            let query = StatsQuery::from_pairs(args.pairs())?;
            let response = stats::run_query(&store, &query)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.stats_bind_addr.clone());
            serve(&config, &bind).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn import(config: &Config, args: &QueryArgs) -> anyhow::Result<ExitCode> {
    // Range errors stop us before any network traffic.
    let plan = args.plan()?;
    print_banner(config);

    let client = HttpRankingsClient::new(config)?;
    let store = SqliteStore::open(&config.database_path)?;
    let metrics = Arc::new(IngestMetrics::new());
    let options = RunOptions {
        keep_going: args.keep_going,
        skip: args.skip,
    };

    info!(queries = plan.len(), keep_going = options.keep_going, "🚀 import starting");
    let result = pipeline::run_import(
        &client,
        &store,
        &plan,
        options,
        config.seen_cache_size,
        metrics.clone(),
    )
    .await;

    report(&metrics);
    match store.counts() {
        Ok((athletes, meets, performances)) => {
            info!(athletes, meets, performances, "📦 database totals")
        }
        Err(e) => warn!(error = %e, "could not count database rows"),
    }

    if let Err(e) = result {
        error!(error = %e, "❌ import aborted");
        return Ok(ExitCode::FAILURE);
    }
    Ok(exit_code(&metrics))
}

async fn read(config: &Config, args: &QueryArgs) -> anyhow::Result<ExitCode> {
    let plan = args.plan()?;
    let client = HttpRankingsClient::new(config)?;
    let metrics = IngestMetrics::new();
    let options = RunOptions {
        keep_going: args.keep_going,
        skip: args.skip,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = pipeline::run_read(&client, &plan, options, &metrics, &mut out).await;

    report(&metrics);
    if let Err(e) = result {
        error!(error = %e, "❌ read aborted");
        return Ok(ExitCode::FAILURE);
    }
    Ok(exit_code(&metrics))
}

async fn serve(config: &Config, bind: &str) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.database_path)?;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind stats server on {bind}"))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(stats_server::run_stats_server(
        listener,
        Arc::new(Mutex::new(store)),
        shutdown_rx,
    ));

    info!("⚡ Press Ctrl+C to stop");
    match signal::ctrl_c().await {
        Ok(()) => warn!("🛑 Shutdown signal received!"),
        Err(err) => error!("❌ Signal listener error: {}", err),
    }
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(Duration::from_secs(5), server).await {
        Ok(joined) => joined.context("stats server task panicked")?,
        Err(_) => {
            warn!("stats server did not stop within 5s");
            Ok(())
        }
    }
}

fn report(metrics: &IngestMetrics) {
    let snapshot = metrics.snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => info!(metrics = %json, "📊 run finished"),
        Err(e) => warn!(error = %e, "could not serialize metrics"),
    }
}

fn exit_code(metrics: &IngestMetrics) -> ExitCode {
    if metrics.has_failures() {
        warn!("some queries or records failed; see the errors above");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
