//! NATS JetStream implementation of the message bus client
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


use async_nats::connection::State;
use async_nats::jetstream::{self, Context};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{error, info, warn};
use transcoder_types::TranscodeJob;

use crate::error::{MessageBusError, Result};
use crate::traits::{JobStream, MessageBusClient};

/// NATS JetStream message bus client
pub struct NatsClient {
    client: Arc<async_nats::Client>,
    jetstream: Arc<Context>,
    stream_name: String,
}

impl NatsClient {
    /// Connect and make sure the job stream covers `job_subject`
    pub async fn new(url: &str, stream_name: Option<String>, job_subject: &str) -> Result<Self> {
        info!(url = url, "Connecting to NATS server");

        let client = async_nats::connect(url)
            .await
            .map_err(|e| MessageBusError::Connection(e.to_string()))?;

        let client_arc = Arc::new(client.clone());
        let jetstream = jetstream::new(client);

        let stream_name = stream_name.unwrap_or_else(|| "transcode-jobs".to_string());

        if let Err(e) = Self::ensure_stream(&jetstream, &stream_name, job_subject).await {
            warn!(stream = stream_name, error = %e, "Could not ensure JetStream stream");
        }

        info!(
            stream = stream_name,
            subject = job_subject,
            "NATS client initialized"
        );

        Ok(Self {
            client: client_arc,
            jetstream: Arc::new(jetstream),
            stream_name,
        })
    }

    /// Ensure the JetStream stream exists
    async fn ensure_stream(jetstream: &Context, stream_name: &str, subject: &str) -> Result<()> {
        jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: stream_name.to_string(),
                subjects: vec![subject.to_string()],
                max_age: std::time::Duration::from_secs(86400 * 7), // 7 days retention
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| MessageBusError::Connection(format!("Failed to create stream: {}", e)))?;

        info!(stream = stream_name, "Stream ensured");

        Ok(())
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }
}

/// Decode one raw intake message into a validated job
pub fn decode_job(payload: &[u8]) -> Result<TranscodeJob> {
    TranscodeJob::from_slice(payload).map_err(|e| MessageBusError::MalformedJob(e.to_string()))
}

#[async_trait]
impl MessageBusClient for NatsClient {
    async fn publish_job(&self, subject: &str, job: &TranscodeJob) -> Result<()> {
        let payload = serde_json::to_vec(job).map_err(MessageBusError::Serialization)?;

        self.jetstream
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| MessageBusError::Publish(e.to_string()))?;

        info!(
            subject = subject,
            media_url = job.media_url,
            "Job published"
        );

        Ok(())
    }

    fn subscribe_jobs(&self, subject: &str) -> JobStream<'_> {
        info!(subject = subject, "Subscribing to transcode jobs");

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<TranscodeJob>>(100);
        let subject = subject.to_string();
        let client = Arc::clone(&self.client);

        tokio::spawn(async move {
            match client.subscribe(subject.clone()).await {
                Ok(mut subscriber) => {
                    info!(subject = subject, "Subscription created, waiting for jobs");

                    while let Some(message) = subscriber.next().await {
                        let decoded = decode_job(&message.payload);
                        if let Err(ref e) = decoded {
                            error!(error = %e, "Rejected malformed job message");
                        }
                        if tx.send(decoded).await.is_err() {
                            error!("Receiver dropped, stopping subscription");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to create subscription");
                    let _ = tx.send(Err(MessageBusError::Subscribe(e.to_string()))).await;
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    async fn is_connected(&self) -> bool {
        self.client.connection_state() == State::Connected
    }

    fn client_type(&self) -> &str {
        "nats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_job() {
        let job = tokio_test::assert_ok!(decode_job(
            br#"{"media_url":"https://cdn.example.com/a.mp4","standard":"720p","notify_url":"https://hooks.example.com/cb"}"#,
        ));
        assert_eq!(job.standard, "720p");
    }

    #[test]
    fn test_decode_rejects_missing_notify_url() {
        let result = decode_job(br#"{"media_url":"https://cdn.example.com/a.mp4","standard":"720p"}"#);
        assert!(matches!(result, Err(MessageBusError::MalformedJob(_))));
    }

    #[test]
    fn test_decode_rejects_non_utf8_garbage() {
        let result = decode_job(&[0xff, 0xfe, 0x00]);
        assert!(matches!(result, Err(MessageBusError::MalformedJob(_))));
    }
}
