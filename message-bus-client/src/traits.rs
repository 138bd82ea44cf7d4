//! Traits for message bus operations

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use transcoder_types::TranscodeJob;

/// Stream of decoded jobs; malformed messages surface as errors and are never
/// turned into jobs
pub type JobStream<'a> =
    Pin<Box<dyn Stream<Item = std::result::Result<TranscodeJob, crate::error::MessageBusError>> + Send + 'a>>;

/// Trait for message bus clients
#[async_trait]
pub trait MessageBusClient: Send + Sync {
    /// Publish a transcode job on a subject
    async fn publish_job(
        &self,
        subject: &str,
        job: &TranscodeJob,
    ) -> Result<(), crate::error::MessageBusError>;

    /// Subscribe to transcode jobs on a subject
    fn subscribe_jobs(&self, subject: &str) -> JobStream<'_>;

    /// Check if the client is connected
    async fn is_connected(&self) -> bool;

    /// Get the client type name
    fn client_type(&self) -> &str;
}
