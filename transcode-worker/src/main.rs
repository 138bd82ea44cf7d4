//! Transcode Worker
//!
//! Consumes transcode jobs from the message bus and turns each source video
//! into an encrypted, obfuscated HLS rendition:
//! - Fetches the source (local upload or HTTP download)
//! - Encodes HLS at the requested quality tier
//! - Verifies the encoded duration, re-encoding once on mismatch
//! - Renames segments to hashed names
//! - Posts the outcome to the job's callback URL
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use anyhow::Result;
use message_bus_client::nats::NatsClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use transcode_worker::{
    health::HealthServer, worker::IntakeWorker, FfmpegToolchain, HttpNotifier, JobProcessor,
    WorkerPool,
};
use transcoder_config::AppConfig;
use transcoder_logging::LogFormat;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    transcoder_logging::init(
        "transcode-worker",
        config.log_level(),
        LogFormat::from_json_flag(config.json_logs()),
    );

    info!(
        message_bus_url = config.message_bus_url(),
        subject = %config.message_bus.job_subject,
        workers = config.worker_pool_size,
        output_dir = %config.pipeline.output_dir.display(),
        "Configuration loaded"
    );

    let toolchain = FfmpegToolchain::new(
        config.pipeline.ffmpeg_path.clone(),
        config.pipeline.ffprobe_path.clone(),
    );
    if !toolchain.check_available().await {
        warn!(
            ffmpeg = %config.pipeline.ffmpeg_path,
            "FFmpeg not available, every encode will fail"
        );
    }

    let processor = Arc::new(JobProcessor::new(
        Arc::new(toolchain),
        Arc::new(HttpNotifier::new()),
        &config.pipeline,
    ));
    let pool = WorkerPool::start(config.worker_pool_size, processor);

    // Start health check server in background
    let (health_stop, health_stopped) = oneshot::channel::<()>();
    let health_server = HealthServer::new(config.health_port, pool.stats());
    let health_handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = health_stopped.await;
        };
        if let Err(e) = health_server.start(shutdown).await {
            error!(error = %e, "Health check server error");
        }
    });

    // Connect to message bus
    let message_bus = NatsClient::new(
        config.message_bus_url(),
        config.message_bus.stream_name.clone(),
        &config.message_bus.job_subject,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to connect to message bus: {}", e))?;

    info!("Connected to message bus");

    let intake = IntakeWorker::new(
        Arc::new(message_bus),
        pool.submitter(),
        config.message_bus.job_subject.clone(),
    );
    let intake_handle = tokio::spawn(async move { intake.run().await });

    // Wait for shutdown signal
    info!("Transcode Worker running. Press Ctrl+C to stop.");
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, initiating graceful shutdown");
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
    }

    // Stop intake first so its submitter is dropped and the queue can close
    intake_handle.abort();
    let _ = intake_handle.await;

    info!("Waiting for queued and in-flight jobs to complete...");
    if tokio::time::timeout(SHUTDOWN_GRACE, pool.shutdown()).await.is_err() {
        warn!("Shutdown timeout reached, forcing shutdown");
    }

    let _ = health_stop.send(());
    let _ = health_handle.await;
    info!("Transcode Worker stopped");

    Ok(())
}
