//! Job Processor
//!
//! Drives one job through the pipeline as an explicit state machine:
//!
//! ```text
//! Fetching -> Planning -> Encoding -> Verifying -> Obfuscating -> Notifying -> Done
//!                            ^            |
//!                            +- Retrying <+  (duration mismatch, at most once)
//! ```
//!
//! Any stage error moves straight to `Notifying` with a failure result, so
//! every accepted job produces exactly one callback.
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


use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use transcoder_config::PipelineConfig;
use transcoder_types::{JobResult, QueuedJob};

use crate::downloader::AssetFetcher;
use crate::error::PipelineError;
use crate::notifier::CallbackNotifier;
use crate::obfuscator;
use crate::resolution::plan_for_standard;
use crate::toolchain::{parse_resolution, EncodeRequest, MediaToolchain, ProbeRequest};
use crate::verifier::{OutputVerifier, Verification};

/// Re-encodes allowed after a duration mismatch
pub const MAX_ENCODE_RETRIES: u32 = 1;

/// Basename the encoder writes before obfuscation
pub const ENCODER_BASE_NAME: &str = "stream";

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Fetching,
    Planning { input: PathBuf },
    Encoding { request: EncodeRequest, retries: u32 },
    Verifying { request: EncodeRequest, retries: u32 },
    Retrying { request: EncodeRequest, retries: u32 },
    Obfuscating { manifest_path: PathBuf },
    Notifying(JobResult),
    Done(JobResult),
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Fetching => "fetching",
            JobState::Planning { .. } => "planning",
            JobState::Encoding { .. } => "encoding",
            JobState::Verifying { .. } => "verifying",
            JobState::Retrying { .. } => "retrying",
            JobState::Obfuscating { .. } => "obfuscating",
            JobState::Notifying(_) => "notifying",
            JobState::Done(_) => "done",
        }
    }
}

/// Where a job's rendition is written and served from
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub output_root: PathBuf,
    pub public_base_url: String,
    pub key_info_path: PathBuf,
    pub segment_duration_secs: u32,
}

impl OutputLayout {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            output_root: config.output_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            key_info_path: config.key_info_path.clone(),
            segment_duration_secs: config.segment_duration_secs,
        }
    }

    /// `<output_root>/<YYYYMMDD>/<job id>`
    pub fn job_dir(&self, queued: &QueuedJob) -> PathBuf {
        self.output_root
            .join(date_bucket(queued))
            .join(queued.id.to_string())
    }

    /// Public URL of [`OutputLayout::job_dir`]
    pub fn public_dir_url(&self, queued: &QueuedJob) -> String {
        format!("{}/{}/{}", self.public_base_url, date_bucket(queued), queued.id)
    }
}

fn date_bucket(queued: &QueuedJob) -> String {
    queued.enqueued_at.format("%Y%m%d").to_string()
}

/// Values carried across states of one job
#[derive(Debug, Default)]
struct JobContext {
    /// Probed once and reused by the retry
    source_duration: Option<f64>,
    encode_attempts: u32,
}

/// Runs jobs end to end
pub struct JobProcessor {
    toolchain: Arc<dyn MediaToolchain>,
    notifier: Arc<dyn CallbackNotifier>,
    fetcher: AssetFetcher,
    verifier: OutputVerifier,
    layout: OutputLayout,
}

impl JobProcessor {
    /// Create a new job processor
    pub fn new(
        toolchain: Arc<dyn MediaToolchain>,
        notifier: Arc<dyn CallbackNotifier>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            verifier: OutputVerifier::new(toolchain.clone()),
            fetcher: AssetFetcher::new(
                config.trusted_media_host.clone(),
                config.upload_dir.clone(),
                config.scratch_dir.clone(),
            ),
            layout: OutputLayout::from_config(config),
            toolchain,
            notifier,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Process one job and deliver its callback
    ///
    /// Returns the result that was sent. A job without a callback reference
    /// is rejected before any stage runs and produces no callback.
    pub async fn process(&self, queued: &QueuedJob) -> Result<JobResult, PipelineError> {
        if queued.job.notify_url.trim().is_empty() {
            warn!(job_id = %queued.id, "Rejecting job without callback reference");
            return Err(PipelineError::MissingCallback);
        }

        info!(
            job_id = %queued.id,
            media_url = %queued.job.media_url,
            standard = %queued.job.standard,
            "Processing transcode job"
        );

        let mut context = JobContext::default();
        let mut state = JobState::Fetching;

        loop {
            state = match state {
                JobState::Done(result) => {
                    info!(
                        job_id = %queued.id,
                        success = result.is_success(),
                        encode_attempts = context.encode_attempts,
                        "Transcode job finished"
                    );
                    return Ok(result);
                }
                JobState::Notifying(result) => {
                    self.notify(queued, &result).await;
                    JobState::Done(result)
                }
                current => {
                    let stage = current.name();
                    info!(job_id = %queued.id, stage = stage, "Entering stage");

                    match self.advance(queued, current, &mut context).await {
                        Ok(next) => next,
                        Err(e) => {
                            error!(
                                job_id = %queued.id,
                                stage = stage,
                                error_stage = %e.stage(),
                                error = %e,
                                "Transcode job failed"
                            );
                            JobState::Notifying(JobResult::failure(
                                queued.job.media_url.clone(),
                                e.message(),
                            ))
                        }
                    }
                }
            };
        }
    }

    /// Run the work of one non-terminal state and return the next one
    async fn advance(
        &self,
        queued: &QueuedJob,
        state: JobState,
        context: &mut JobContext,
    ) -> Result<JobState, PipelineError> {
        let job = &queued.job;

        match state {
            JobState::Fetching => {
                let input = self.fetcher.fetch(&job.media_url, &queued.id).await?;
                Ok(JobState::Planning { input })
            }

            JobState::Planning { input } => {
                let standard = job
                    .quality_standard()
                    .ok_or_else(|| PipelineError::UnknownStandard(job.standard.clone()))?;

                let output = self
                    .toolchain
                    .probe(&ProbeRequest::Resolution(input.clone()))
                    .await
                    .map_err(PipelineError::ResolutionProbe)?;
                let (width, height) =
                    parse_resolution(&output).map_err(PipelineError::ResolutionOutput)?;
                let geometry = plan_for_standard(standard, width, height);

                let output_dir = self.layout.job_dir(queued);
                tokio::fs::create_dir_all(&output_dir)
                    .await
                    .map_err(|source| PipelineError::OutputDir {
                        path: output_dir.clone(),
                        source,
                    })?;

                info!(
                    job_id = %queued.id,
                    source = %format!("{}x{}", width, height),
                    target = %geometry,
                    standard = standard.as_str(),
                    "Planned target geometry"
                );

                Ok(JobState::Encoding {
                    request: EncodeRequest {
                        input_path: input,
                        geometry,
                        output_dir,
                        base_name: ENCODER_BASE_NAME.to_string(),
                        key_info_path: self.layout.key_info_path.clone(),
                        segment_duration_secs: self.layout.segment_duration_secs,
                    },
                    retries: 0,
                })
            }

            JobState::Encoding { request, retries } => {
                context.encode_attempts += 1;
                self.toolchain
                    .encode(&request)
                    .await
                    .map_err(|source| PipelineError::Encode {
                        attempt: context.encode_attempts,
                        source,
                    })?;
                Ok(JobState::Verifying { request, retries })
            }

            JobState::Verifying { request, retries } => {
                let expected = match context.source_duration {
                    Some(duration) => duration,
                    None => {
                        let duration = self.verifier.source_duration(&request.input_path).await?;
                        context.source_duration = Some(duration);
                        duration
                    }
                };

                match self.verifier.verify(&request.manifest_path(), expected).await? {
                    Verification::Match { duration } => {
                        info!(job_id = %queued.id, duration = duration, "Encoded duration verified");
                        Ok(JobState::Obfuscating {
                            manifest_path: request.manifest_path(),
                        })
                    }
                    Verification::Mismatch { .. } if retries < MAX_ENCODE_RETRIES => {
                        Ok(JobState::Retrying { request, retries })
                    }
                    Verification::Mismatch { expected, actual } => {
                        Err(PipelineError::DurationMismatch { expected, actual })
                    }
                }
            }

            JobState::Retrying { request, retries } => {
                warn!(
                    job_id = %queued.id,
                    retry = retries + 1,
                    max_retries = MAX_ENCODE_RETRIES,
                    "Duration mismatch, re-encoding"
                );
                Ok(JobState::Encoding {
                    request,
                    retries: retries + 1,
                })
            }

            JobState::Obfuscating { manifest_path } => {
                let public_dir_url = self.layout.public_dir_url(queued);
                let obfuscated = obfuscator::obfuscate(&manifest_path, &public_dir_url).await?;
                Ok(JobState::Notifying(JobResult::success(
                    job.media_url.clone(),
                    obfuscated.public_url,
                )))
            }

            terminal @ (JobState::Notifying(_) | JobState::Done(_)) => Ok(terminal),
        }
    }

    /// Send a failure callback for a job that ended outside the state machine
    pub async fn notify_failure(&self, queued: &QueuedJob, message: &str) -> JobResult {
        let result = JobResult::failure(queued.job.media_url.clone(), message);
        if !queued.job.notify_url.trim().is_empty() {
            self.notify(queued, &result).await;
        }
        result
    }

    /// Deliver the callback; delivery failures are logged only
    async fn notify(&self, queued: &QueuedJob, result: &JobResult) {
        let payload = result.to_callback_payload();

        match self.notifier.notify(&queued.job.notify_url, &payload).await {
            Ok(()) => info!(
                job_id = %queued.id,
                code = payload.code,
                "Callback delivered"
            ),
            Err(e) => error!(
                job_id = %queued.id,
                notify_url = %queued.job.notify_url,
                error = %e,
                "Callback delivery failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use transcoder_types::TranscodeJob;

    #[test]
    fn test_output_layout() {
        let config = PipelineConfig {
            output_dir: PathBuf::from("/srv/converter"),
            public_base_url: "https://media.example.com/converter/".to_string(),
            ..PipelineConfig::default()
        };
        let layout = OutputLayout::from_config(&config);

        let mut queued = QueuedJob::new(TranscodeJob::new(
            "https://cdn.example.com/a.mp4",
            "720p",
            "https://app.example.com/cb",
        ));
        queued.enqueued_at = chrono::Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();

        assert_eq!(
            layout.job_dir(&queued),
            PathBuf::from(format!("/srv/converter/20250309/{}", queued.id))
        );
        assert_eq!(
            layout.public_dir_url(&queued),
            format!("https://media.example.com/converter/20250309/{}", queued.id)
        );
    }

    #[test]
    fn test_state_names() {
        assert_eq!(JobState::Fetching.name(), "fetching");
        assert_eq!(JobState::Done(JobResult::failure("a", "b")).name(), "done");
    }
}
