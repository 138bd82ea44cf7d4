//! Worker Pool
//!
//! A fixed number of tokio tasks share one unbounded queue. Each task takes
//! the next job and runs it to completion inside its own spawned task, so a
//! panicking job is contained and the worker moves on to the next one.
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


use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use transcoder_types::{QueuedJob, TranscodeJob};
use uuid::Uuid;

use crate::processor::JobProcessor;

/// Callback message for a job whose task panicked
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    Closed,
}

/// Live pool counters
#[derive(Debug, Default)]
pub struct PoolStats {
    queued: AtomicU64,
    in_flight: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub queued: u64,
    pub in_flight: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl PoolStats {
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable handle for enqueueing jobs
#[derive(Clone)]
pub struct JobSubmitter {
    sender: mpsc::UnboundedSender<QueuedJob>,
    stats: Arc<PoolStats>,
}

impl JobSubmitter {
    /// Enqueue a job without waiting; returns the id assigned to it
    pub fn submit(&self, job: TranscodeJob) -> Result<Uuid, PoolError> {
        let queued = QueuedJob::new(job);
        let job_id = queued.id;

        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(queued).is_err() {
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
            return Err(PoolError::Closed);
        }

        debug!(job_id = %job_id, "Job enqueued");
        Ok(job_id)
    }
}

pub struct WorkerPool {
    submitter: JobSubmitter,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing one queue
    pub fn start(size: usize, processor: Arc<JobProcessor>) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(PoolStats::default());

        let workers = (0..size)
            .map(|index| {
                tokio::spawn(run_worker(
                    index,
                    receiver.clone(),
                    processor.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        info!(workers = size, "Worker pool started");

        Self {
            submitter: JobSubmitter {
                sender,
                stats: stats.clone(),
            },
            workers,
            stats,
        }
    }

    pub fn submitter(&self) -> JobSubmitter {
        self.submitter.clone()
    }

    pub fn submit(&self, job: TranscodeJob) -> Result<Uuid, PoolError> {
        self.submitter.submit(job)
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        self.stats.clone()
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Close the queue, drain what is left and wait for every worker
    ///
    /// Outstanding [`JobSubmitter`] clones keep the queue open, so they
    /// must be dropped for this to return.
    pub async fn shutdown(self) {
        let WorkerPool {
            submitter, workers, ..
        } = self;
        drop(submitter);

        info!(workers = workers.len(), "Draining worker pool");
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task terminated abnormally");
            }
        }
        info!("Worker pool stopped");
    }
}

async fn run_worker(
    index: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    processor: Arc<JobProcessor>,
    stats: Arc<PoolStats>,
) {
    debug!(worker = index, "Worker started");

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(queued) = next else {
            break;
        };

        stats.queued.fetch_sub(1, Ordering::Relaxed);
        stats.in_flight.fetch_add(1, Ordering::Relaxed);

        let job_id = queued.id;
        let fallback = queued.clone();
        let job_processor = processor.clone();
        let outcome = tokio::spawn(async move { job_processor.process(&queued).await }).await;

        let succeeded = match outcome {
            Ok(Ok(result)) => result.is_success(),
            Ok(Err(e)) => {
                warn!(worker = index, job_id = %job_id, error = %e, "Job rejected");
                false
            }
            Err(e) => {
                error!(worker = index, job_id = %job_id, error = %e, "Job task panicked");
                // The job never reached its own callback
                processor.notify_failure(&fallback, INTERNAL_ERROR_MESSAGE).await;
                false
            }
        };

        let counter = if succeeded { &stats.succeeded } else { &stats.failed };
        counter.fetch_add(1, Ordering::Relaxed);
        stats.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    debug!(worker = index, "Worker stopped");
}
