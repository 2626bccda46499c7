//! Bookrelay Worker - Main entry point

use anyhow::{Context, Result};
use bookrelay_common::logging::{init_logging, LogConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use bookrelay_worker::{
    config::Config,
    consumer::{AmqpQueue, Consumer},
    enrichment::GoogleBooksClient,
    pipeline::{FilePipeline, PipelineSettings},
    storage::Storage,
    stream::TcpConnector,
    webhook,
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("bookrelay-worker")
        .filter_directives("bookrelay_worker=debug,tower_http=debug,lapin=warn,aws=warn")
        .build()
        .with_env_overrides()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting bookrelay worker");

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        queue = %config.amqp.queue,
        stream_addr = %config.stream.addr,
        webhook_addr = %config.webhook.listen_addr,
        "Configuration loaded"
    );

    let storage = Storage::new(config.storage.clone());
    let lookup = GoogleBooksClient::from_config(&config.enrichment)
        .context("Failed to build enrichment client")?;

    let pipeline = Arc::new(FilePipeline::new(
        Arc::new(storage),
        Arc::new(lookup),
        TcpConnector::from_config(&config.stream),
        PipelineSettings::from(&config.stream),
    ));

    let queue = AmqpQueue::connect(&config.amqp)
        .await
        .context("Failed to subscribe to the work queue")?;

    let webhook = tokio::spawn(webhook::serve(config.webhook.clone()));

    let consumer = Consumer::new(config.shutdown.clone());

    tokio::select! {
        stats = consumer.run(queue, pipeline, shutdown_signal()) => {
            let stats = stats.context("Queue consumer failed")?;
            info!(received = stats.received, "Worker stopped");
        }
        served = webhook => {
            match served {
                Ok(Ok(())) => error!("Webhook server exited"),
                Ok(Err(e)) => error!(error = %e, "Webhook server failed"),
                Err(e) => error!(error = %e, "Webhook task panicked"),
            }
            anyhow::bail!("Webhook server stopped unexpectedly");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
