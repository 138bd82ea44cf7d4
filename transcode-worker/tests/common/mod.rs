//! Shared fakes and fixtures for the pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use transcode_worker::notifier::{CallbackNotifier, NotifyError};
use transcode_worker::toolchain::{EncodeRequest, MediaToolchain, ProbeRequest, ToolError};
use transcode_worker::JobProcessor;
use transcoder_config::PipelineConfig;
use transcoder_types::{CallbackPayload, QueuedJob, TranscodeJob};

pub const SOURCE_URL: &str = "https://media.example.com/uploads/clip.mp4";

/// Toolchain that writes manifests instead of running ffmpeg
pub struct FakeToolchain {
    resolution: String,
    source_duration: String,
    /// Segment durations written by each successive encode; the last entry
    /// repeats once the list is exhausted
    attempts: Vec<Vec<f64>>,
    fail_encode: bool,
    panic_on_encode: bool,
    delay: Duration,
    encodes: AtomicUsize,
    duration_probes: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    requests: Mutex<Vec<EncodeRequest>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self {
            resolution: "1920x1080".to_string(),
            source_duration: "10.000000".to_string(),
            attempts: vec![vec![5.0, 5.0]],
            fail_encode: false,
            panic_on_encode: false,
            delay: Duration::ZERO,
            encodes: AtomicUsize::new(0),
            duration_probes: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_attempts(mut self, attempts: Vec<Vec<f64>>) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_source_duration(mut self, output: &str) -> Self {
        self.source_duration = output.to_string();
        self
    }

    pub fn with_resolution(mut self, output: &str) -> Self {
        self.resolution = output.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_encode(mut self) -> Self {
        self.fail_encode = true;
        self
    }

    pub fn panicking_encode(mut self) -> Self {
        self.panic_on_encode = true;
        self
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }

    pub fn duration_probes(&self) -> usize {
        self.duration_probes.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<EncodeRequest> {
        self.requests.lock().unwrap().clone()
    }

    async fn write_output(request: &EncodeRequest, durations: &[f64]) -> std::io::Result<()> {
        let mut manifest = String::from(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:5\n#EXT-X-MEDIA-SEQUENCE:0\n\
             #EXT-X-PLAYLIST-TYPE:VOD\n#EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.example.com/enc.key\"\n",
        );
        for (index, duration) in durations.iter().enumerate() {
            let segment = format!("{}_{:03}.ts", request.base_name, index);
            tokio::fs::write(request.output_dir.join(&segment), format!("segment {}", index))
                .await?;
            manifest.push_str(&format!("#EXTINF:{:.6},\n{}\n", duration, segment));
        }
        manifest.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(request.manifest_path(), manifest).await
    }
}

#[async_trait]
impl MediaToolchain for FakeToolchain {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), ToolError> {
        let attempt = self.encodes.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on_encode {
            panic!("encoder crashed");
        }
        if self.fail_encode {
            return Err(ToolError::Exit {
                tool: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
            });
        }

        let durations = self
            .attempts
            .get(attempt)
            .or_else(|| self.attempts.last())
            .cloned()
            .unwrap_or_default();

        Self::write_output(request, &durations)
            .await
            .map_err(|source| ToolError::Launch {
                tool: "ffmpeg".to_string(),
                source,
            })
    }

    async fn probe(&self, request: &ProbeRequest) -> Result<String, ToolError> {
        match request {
            ProbeRequest::Resolution(_) => Ok(self.resolution.clone()),
            ProbeRequest::Duration(_) => {
                self.duration_probes.fetch_add(1, Ordering::SeqCst);
                Ok(self.source_duration.clone())
            }
        }
    }
}

/// Notifier that records every callback
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, CallbackPayload)>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<(String, CallbackPayload)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallbackNotifier for RecordingNotifier {
    async fn notify(&self, url: &str, payload: &CallbackPayload) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));
        Ok(())
    }
}

/// Temporary filesystem layout with `clip.mp4` already uploaded
pub struct Workspace {
    pub root: TempDir,
    pub config: PipelineConfig,
}

impl Workspace {
    pub async fn new() -> Self {
        let root = TempDir::new().unwrap();
        let upload_dir = root.path().join("uploads");
        tokio::fs::create_dir_all(&upload_dir).await.unwrap();
        tokio::fs::write(upload_dir.join("clip.mp4"), b"source").await.unwrap();

        let config = PipelineConfig {
            trusted_media_host: "media.example.com".to_string(),
            public_base_url: "https://media.example.com/converter".to_string(),
            upload_dir,
            scratch_dir: root.path().join("scratch"),
            output_dir: root.path().join("converter"),
            key_info_path: PathBuf::from("./asckey/enc.keyinfo"),
            segment_duration_secs: 5,
            ..PipelineConfig::default()
        };

        Self { root, config }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn processor(
        &self,
        toolchain: Arc<FakeToolchain>,
        notifier: Arc<RecordingNotifier>,
    ) -> JobProcessor {
        JobProcessor::new(toolchain, notifier, &self.config)
    }
}

pub fn job(standard: &str, notify_url: &str) -> QueuedJob {
    QueuedJob::new(TranscodeJob::new(SOURCE_URL, standard, notify_url))
}
