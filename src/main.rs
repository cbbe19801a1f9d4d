//! Vigilant Sentinel - Main Entry Point
//!
//! Serves the HTTP/WebSocket API, runs the pipeline workers and optionally
//! bridges transactions and notifications over NATS.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vigilant_sentinel::{
    analysis::DetectionEngine,
    api::{create_router, AppState},
    case_manager::CaseManager,
    config::{AppConfig, LoggingConfig, NarrativeConfig},
    consumer::TransactionConsumer,
    generator::TransactionGenerator,
    metrics::MetricsReporter,
    narrative::{HttpNarrator, Narrator, StaticNarrator},
    pipeline::{Pipeline, PipelineContext},
    producer::AlertProducer,
    response::{InMemoryActions, ResponseExecutor},
    store::AlertStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Vigilant Sentinel");
    info!(
        high_risk_locations = ?config.detection.high_risk_locations,
        unknown_devices = ?config.detection.unknown_devices,
        velocity = ?config.detection.velocity,
        "Detection rules loaded"
    );

    let narrator = build_narrator(&config.narrative)?;
    let velocity = config
        .detection
        .velocity
        .build()
        .context("Invalid velocity configuration")?;
    let engine = DetectionEngine::new(config.detection.rules(), velocity);
    let executor = ResponseExecutor::new(Arc::new(InMemoryActions::new()));
    let store = AlertStore::new(config.store.max_alerts);
    let case_manager = CaseManager::seeded(config.case_manager.seed);

    let shutdown = CancellationToken::new();
    let ctx = PipelineContext::new(engine, executor, narrator, store, case_manager);
    let (pipeline, workers) = Pipeline::start(ctx, shutdown.clone());
    let metrics = pipeline.context().metrics.clone();

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.run(shutdown.clone()));
    }

    if config.nats.enabled {
        start_nats_bridge(&config, &pipeline, shutdown.clone()).await?;
    }

    let state = AppState::new(pipeline, TransactionGenerator::from_entropy());
    let app = create_router(state, &config.server.cors_origins);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "HTTP server listening");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    workers.join().await;

    info!("Pipeline shutting down...");
    metrics.print_summary();
    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level {:?}", logging.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn build_narrator(narrative: &NarrativeConfig) -> Result<Arc<dyn Narrator>> {
    if !narrative.enabled {
        info!("Narrative service disabled, using placeholder narratives");
        return Ok(Arc::new(StaticNarrator::disabled()));
    }

    let narrator = HttpNarrator::new(
        &narrative.endpoint,
        &narrative.model,
        narrative.max_tokens,
        Duration::from_millis(narrative.timeout_ms),
    )
    .context("Failed to build narrative client")?;
    info!(
        endpoint = %narrative.endpoint,
        model = %narrative.model,
        "Narrative service configured"
    );
    Ok(Arc::new(narrator))
}

async fn start_nats_bridge(
    config: &AppConfig,
    pipeline: &Pipeline,
    shutdown: CancellationToken,
) -> Result<()> {
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = TransactionConsumer::new(client.clone(), &config.nats.transaction_subject);
    let producer = AlertProducer::new(
        client,
        &config.nats.alert_subject,
        &config.nats.response_subject,
    );
    info!(
        transactions = %config.nats.transaction_subject,
        alerts = %config.nats.alert_subject,
        responses = %config.nats.response_subject,
        "NATS bridge started"
    );

    let consumer_pipeline = pipeline.clone();
    let consumer_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = consumer.run(consumer_pipeline, consumer_shutdown).await {
            warn!(error = %e, "NATS consumer failed");
        }
    });

    let ctx = pipeline.context().clone();
    tokio::spawn(async move {
        producer.run(&ctx.broadcaster, shutdown).await;
    });
    Ok(())
}
