//! Intake Worker - moves jobs from the message bus into the worker pool
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


use crate::pool::JobSubmitter;
use message_bus_client::traits::MessageBusClient;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

/// Counts reported when the job stream ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeSummary {
    pub accepted: u64,
    pub rejected: u64,
}

/// Subscribes to the job subject and hands every valid job to the pool
pub struct IntakeWorker {
    message_bus: Arc<dyn MessageBusClient>,
    submitter: JobSubmitter,
    subject: String,
}

impl IntakeWorker {
    /// Create a new intake worker
    pub fn new(
        message_bus: Arc<dyn MessageBusClient>,
        submitter: JobSubmitter,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            message_bus,
            submitter,
            subject: subject.into(),
        }
    }

    /// Consume jobs until the stream ends or the pool closes
    pub async fn run(&self) -> IntakeSummary {
        info!(
            subject = %self.subject,
            client = self.message_bus.client_type(),
            "Subscribing to transcode jobs"
        );

        let mut job_stream = self.message_bus.subscribe_jobs(&self.subject);
        let mut summary = IntakeSummary::default();

        while let Some(job_result) = job_stream.next().await {
            match job_result {
                Ok(job) => match self.submitter.submit(job) {
                    Ok(job_id) => {
                        summary.accepted += 1;
                        info!(job_id = %job_id, "Transcode job accepted");
                    }
                    Err(e) => {
                        error!(error = %e, "Cannot submit job, stopping intake");
                        break;
                    }
                },
                Err(e) => {
                    // Malformed messages never reach the queue
                    summary.rejected += 1;
                    warn!(error = %e, "Rejected message from job stream");
                }
            }
        }

        warn!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            "Job stream ended"
        );
        summary
    }
}
