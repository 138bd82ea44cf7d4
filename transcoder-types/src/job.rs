//! Transcode job definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TranscoderError};

/// Named target resolution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStandard {
    #[serde(alias = "480p")]
    Low,
    #[serde(alias = "720p")]
    Medium,
    #[serde(alias = "1080p")]
    High,
}

impl QualityStandard {
    /// Look up a standard by its wire name (`low`/`480p`, `medium`/`720p`, `high`/`1080p`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" | "480p" => Some(QualityStandard::Low),
            "medium" | "720p" => Some(QualityStandard::Medium),
            "high" | "1080p" => Some(QualityStandard::High),
            _ => None,
        }
    }

    /// Target long-edge pixel count for this tier
    pub fn long_edge(&self) -> u32 {
        match self {
            QualityStandard::Low => 854,
            QualityStandard::Medium => 1280,
            QualityStandard::High => 1920,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityStandard::Low => "480p",
            QualityStandard::Medium => "720p",
            QualityStandard::High => "1080p",
        }
    }
}

/// A transcode request as published on the message bus
///
/// `standard` is kept as the raw wire string: an unknown tier is a per-job
/// failure reported to the callback, not an intake rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub media_url: String,
    pub standard: String,
    pub notify_url: String,
}

impl TranscodeJob {
    pub fn new(
        media_url: impl Into<String>,
        standard: impl Into<String>,
        notify_url: impl Into<String>,
    ) -> Self {
        Self {
            media_url: media_url.into(),
            standard: standard.into(),
            notify_url: notify_url.into(),
        }
    }

    /// Decode and validate a job from a raw intake message
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let job: TranscodeJob = serde_json::from_slice(bytes)?;
        job.validate()?;
        Ok(job)
    }

    /// Check the fields every processor relies on
    pub fn validate(&self) -> Result<()> {
        if self.notify_url.trim().is_empty() {
            return Err(TranscoderError::MissingField("notify_url".to_string()));
        }
        if self.media_url.trim().is_empty() {
            return Err(TranscoderError::MissingField("media_url".to_string()));
        }
        url::Url::parse(&self.media_url)
            .map_err(|e| TranscoderError::InvalidMediaUrl(format!("{}: {}", self.media_url, e)))?;
        Ok(())
    }

    /// Resolve the requested tier, `None` when the name is unknown
    pub fn quality_standard(&self) -> Option<QualityStandard> {
        QualityStandard::from_name(&self.standard)
    }
}

/// A job as held in the worker queue
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: Uuid,
    pub enqueued_at: DateTime<Utc>,
    pub job: TranscodeJob,
}

impl QueuedJob {
    pub fn new(job: TranscodeJob) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            job,
        }
    }
}
