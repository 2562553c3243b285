//! Tick Studies Binary
//!
//! Feeds one study either from a replay of stored ticks or from wire records
//! read line by line on stdin, and logs every result and the final summary.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tick-studies
//! TICK_STUDIES_MODE=live cargo run --bin tick-studies < ticks.jsonl
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TICK_STUDIES_INSTRUMENT_ID`: Instrument to study
//! - `TICK_STUDIES_REPLAY_START`: Range start, RFC 3339 (inclusive, replay only)
//! - `TICK_STUDIES_REPLAY_END`: Range end, RFC 3339 (exclusive, replay only)
//!
//! ## Optional
//! - `TICK_STUDIES_MODE`: replay | live (default: replay)
//! - `TICK_STUDIES_BUFFER_CAPACITY`, `TICK_STUDIES_BACKPRESSURE`: live queue
//!   size and block | drop_oldest policy (default: 10000, block)
//! - `TICK_STUDIES_STUDY`: delta | vwap | bollinger (default: delta)
//! - `TICK_STUDIES_WINDOW_SECS`, `TICK_STUDIES_MAX_SAMPLES`,
//!   `TICK_STUDIES_BAND_K`, `TICK_STUDIES_MIN_SAMPLES`,
//!   `TICK_STUDIES_ANNUALIZATION`, `TICK_STUDIES_NEUTRAL_POLICY`: study parameters
//! - `TICK_STUDIES_OUT_OF_ORDER_TOLERANCE_US`: tolerate late ticks (default: reject)
//! - `TICK_STUDIES_STORE_DIR`: JSON-lines store root (default: data/ticks)
//! - `TICK_STUDIES_METRICS_PORT`: Prometheus metrics port, 0 disables (default: 9090)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`: span export
//! - `RUST_LOG`: Log filter (default: `tick_studies=info`)

use std::sync::Arc;

use anyhow::Context;
use tick_studies::infrastructure::telemetry;
use tick_studies::{
    AppConfig, IngestConfig, JsonLinesTickStore, LineSource, LiveOutcome, LiveRunner,
    ReplayMerger, ReplayOutcome, ReplayRange, RunMode, StudyEngine, TracingSink, WireCodec,
    init_metrics,
};
use tokio::io::BufReader;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting tick studies");

    let config = AppConfig::from_env().context("failed to load configuration")?;
    log_config(&config);

    if config.metrics_port != 0 {
        let addr = init_metrics(config.metrics_port).context("failed to start metrics exporter")?;
        tracing::info!(addr = %addr, "Prometheus metrics listening");
    }

    let engine = StudyEngine::new(config.study.clone()).context("invalid study parameters")?;

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    match config.mode {
        RunMode::Replay(range) => run_replay(&config, range, engine, shutdown_token).await?,
        RunMode::Live(ingest) => run_live(ingest, engine, &shutdown_token).await,
    }

    tracing::info!("Tick studies stopped");
    Ok(())
}

/// Replay the configured range from the JSON-lines store.
async fn run_replay(
    config: &AppConfig,
    range: ReplayRange,
    mut engine: StudyEngine,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let store = Arc::new(JsonLinesTickStore::new(&config.store_dir));
    let mut merger = ReplayMerger::new(store, WireCodec::new(), range);

    let (outcome, progress) = tokio::task::spawn_blocking(move || {
        let outcome = merger.run(&mut engine, &mut TracingSink, &shutdown_token);
        (outcome, merger.progress().clone())
    })
    .await
    .context("replay task panicked")?;

    let outcome = outcome.context("replay failed")?;
    tracing::info!(
        events = progress.events_emitted,
        malformed = progress.malformed,
        buckets = progress.buckets_loaded,
        elapsed_secs = progress.elapsed_seconds,
        "Replay complete"
    );
    if outcome == ReplayOutcome::Cancelled {
        tracing::warn!("Replay interrupted before the end of the range");
    }
    Ok(())
}

/// Process wire records from stdin until it closes.
async fn run_live(
    ingest: IngestConfig,
    mut engine: StudyEngine,
    shutdown_token: &CancellationToken,
) {
    let source = LineSource::new("stdin", BufReader::new(tokio::io::stdin()));
    let runner = LiveRunner::new(source, WireCodec::new(), ingest);

    let outcome = runner
        .run(&mut engine, &mut TracingSink, shutdown_token)
        .await;

    let counters = engine.counters();
    tracing::info!(
        outcome = ?outcome,
        events = counters.events_processed,
        malformed = counters.malformed_messages,
        dropped = counters.dropped,
        "Live processing complete"
    );
    if let LiveOutcome::Disconnected(reason) = outcome {
        tracing::warn!(reason = %reason, "Input closed with an error");
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        study = config.study.kind().as_str(),
        mode = config.mode.as_str(),
        instrument_id = config.instrument_id,
        store_dir = %config.store_dir.display(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(study = ?config.study, mode = ?config.mode, "Run parameters");
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Cancel the token on Ctrl+C or SIGTERM.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping");
        }
    }

    shutdown_token.cancel();
}
