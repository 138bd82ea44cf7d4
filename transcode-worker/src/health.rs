//! Health check endpoint for the Transcode Worker
//!
//! Provides HTTP health check endpoint for orchestration and monitoring,
//! including the worker pool counters.
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


use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::pool::PoolStats;

/// Health check server state
pub struct HealthServer {
    port: u16,
    stats: Arc<PoolStats>,
}

impl HealthServer {
    /// Create a new health check server
    pub fn new(port: u16, stats: Arc<PoolStats>) -> Self {
        Self { port, stats }
    }

    pub fn router(stats: Arc<PoolStats>) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/api/health", get(health_check))
            .with_state(stats)
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;

        info!(port = self.port, "Health check server started");

        axum::serve(listener, Self::router(self.stats))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Health check server stopped");
        Ok(())
    }
}

/// Health check handler
async fn health_check(State(stats): State<Arc<PoolStats>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "transcode-worker",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "pool": stats.snapshot(),
    }))
}
