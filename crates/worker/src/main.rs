use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use letterpress_cloud::aws::load_sdk_config;
use letterpress_cloud::queue::SqsJobQueue;
use letterpress_cloud::storage::S3ArtifactSink;
use letterpress_comfyui::render::RenderStreamClient;
use letterpress_pipeline::adapters::MySqlStatusStore;
use letterpress_pipeline::consumer::JobConsumer;
use letterpress_worker::config::WorkerConfig;
use letterpress_worker::logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    if let Err(e) = run().await {
        tracing::error!(error = %format!("{e:#}"), "Worker exited with error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    tracing::info!(
        comfyui_api = %config.comfyui_api_url,
        comfyui_ws = %config.comfyui_ws_url,
        queue_url = %config.queue_url,
        bucket = %config.bucket,
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = letterpress_db::create_pool(&config.db)
        .await
        .context("Failed to connect to database")?;
    letterpress_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!(host = %config.db.host, database = %config.db.database, "Database connection pool created");

    // --- AWS ---
    let sdk_config = load_sdk_config(&config.aws).await;
    let queue = SqsJobQueue::new(&sdk_config, config.queue_url.clone())
        .with_wait_time(config.receive_wait);
    let sink = S3ArtifactSink::new(&sdk_config, config.bucket.clone());

    // --- Render backend ---
    let render = RenderStreamClient::new(config.comfyui_ws_url.clone(), config.comfyui_api_url.clone())
        .with_idle_timeout(config.frame_idle_timeout);

    let consumer = JobConsumer::new(
        Arc::new(queue),
        Arc::new(render),
        Arc::new(sink),
        Arc::new(MySqlStatusStore::new(pool.clone())),
        config.consumer.clone(),
    );

    // --- Shutdown ---
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    consumer.run(cancel).await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM on Unix.
///
/// If a handler cannot be installed the worker keeps running and only
/// the remaining signal stops it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), finishing current job before exit");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing current job before exit");
        }
    }
}
