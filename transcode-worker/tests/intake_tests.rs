//! Intake Worker Tests

mod common;

use async_trait::async_trait;
use common::{FakeToolchain, RecordingNotifier, Workspace, SOURCE_URL};
use futures::stream;
use message_bus_client::{JobStream, MessageBusClient, MessageBusError};
use std::sync::{Arc, Mutex};
use transcode_worker::worker::{IntakeSummary, IntakeWorker};
use transcode_worker::WorkerPool;
use transcoder_types::TranscodeJob;

/// Bus that replays a fixed list of messages once
#[derive(Default)]
struct ScriptedBus {
    messages: Mutex<Vec<Result<TranscodeJob, MessageBusError>>>,
}

#[async_trait]
impl MessageBusClient for ScriptedBus {
    async fn publish_job(&self, _subject: &str, job: &TranscodeJob) -> Result<(), MessageBusError> {
        self.messages.lock().unwrap().push(Ok(job.clone()));
        Ok(())
    }

    fn subscribe_jobs(&self, _subject: &str) -> JobStream<'_> {
        let messages = std::mem::take(&mut *self.messages.lock().unwrap());
        Box::pin(stream::iter(messages))
    }

    async fn is_connected(&self) -> bool {
        true
    }

    fn client_type(&self) -> &str {
        "scripted"
    }
}

#[tokio::test]
async fn test_intake_submits_valid_jobs_only() {
    let workspace = Workspace::new().await;
    let toolchain = Arc::new(FakeToolchain::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let processor = Arc::new(workspace.processor(toolchain.clone(), notifier.clone()));
    let pool = WorkerPool::start(2, processor);

    let bus = Arc::new(ScriptedBus::default());
    bus.publish_job("transcode.jobs", &TranscodeJob::new(SOURCE_URL, "720p", "https://cb/1"))
        .await
        .unwrap();
    bus.messages
        .lock()
        .unwrap()
        .push(Err(MessageBusError::MalformedJob("missing field `notify_url`".to_string())));
    bus.publish_job("transcode.jobs", &TranscodeJob::new(SOURCE_URL, "low", "https://cb/2"))
        .await
        .unwrap();

    let intake = IntakeWorker::new(bus, pool.submitter(), "transcode.jobs");
    let summary = intake.run().await;
    drop(intake);

    assert_eq!(summary, IntakeSummary { accepted: 2, rejected: 1 });

    pool.shutdown().await;

    let mut urls: Vec<String> = notifier.calls().into_iter().map(|(url, _)| url).collect();
    urls.sort();
    assert_eq!(urls, vec!["https://cb/1", "https://cb/2"]);
}

#[test]
fn test_malformed_messages_never_decode() {
    assert!(message_bus_client::decode_job(b"{not json").is_err());
    assert!(message_bus_client::decode_job(
        br#"{"media_url":"https://cdn.example.com/a.mp4","standard":"720p","notify_url":""}"#
    )
    .is_err());
    assert!(message_bus_client::decode_job(
        br#"{"media_url":"https://cdn.example.com/a.mp4","standard":"720p","notify_url":"https://cb"}"#
    )
    .is_ok());
}
