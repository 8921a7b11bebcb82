//! Telemetry-Store: Main entry point

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use telemetry_store::cli::{Cli, Commands};
use telemetry_store::core::EventRecord;
use telemetry_store::db::TelemetryDB;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs go to stderr so stdout carries only JSON output. The returned guard
/// must be held until exit for the file writer to flush.
fn init_logging(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "telemetry-store.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn read_records(file: Option<&Path>) -> anyhow::Result<Vec<EventRecord>> {
    let raw = match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("parsing records (expected a JSON array)")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_dir.as_deref())?;

    let config = cli.store_config();
    let db = TelemetryDB::open(&config)
        .await
        .with_context(|| format!("opening store at {}", config.root_dir.display()))?;

    let outcome = match &cli.command {
        Commands::Ingest { file } => {
            let records = read_records(file.as_deref())?;
            let count = records.len();
            db.insert_reports(records).await?;
            db.flush().await.context("flushing ingested records")?;
            print_json(&serde_json::json!({ "ingested": count }))
        }
        Commands::Query(args) => {
            let page = db.get_reports(&args.to_options()).await?;
            print_json(&page)
        }
        Commands::Stats => print_json(&db.get_stats().await?),
        Commands::Prune { before } => {
            let deleted = db.delete_old_reports(*before).await?;
            print_json(&serde_json::json!({ "deleted_segments": deleted }))
        }
        Commands::Clear => {
            db.clear_all().await?;
            print_json(&serde_json::json!({ "cleared": true }))
        }
    };

    db.close().await.context("closing store")?;
    outcome
}
