//! Configuration management for the transcoder services

use config::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Message bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBusConfig {
    pub url: String,
    pub stream_name: Option<String>,
    /// Subject the intake listens on for transcode jobs
    pub job_subject: String,
}

/// Filesystem layout and external tools used by the pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Host whose media is already on local disk under `upload_dir`
    pub trusted_media_host: String,
    /// Public URL prefix that maps onto `output_dir`
    pub public_base_url: String,
    pub upload_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
    pub key_info_path: PathBuf,
    pub segment_duration_secs: u32,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            trusted_media_host: "media.example.com".to_string(),
            public_base_url: "https://media.example.com/converter".to_string(),
            upload_dir: PathBuf::from("./resource/uploads"),
            scratch_dir: PathBuf::from("./resource"),
            output_dir: PathBuf::from("./resource/converter"),
            key_info_path: PathBuf::from("./asckey/enc.keyinfo"),
            segment_duration_secs: 5,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub message_bus: MessageBusConfig,
    pub pipeline: PipelineConfig,
    pub worker_pool_size: usize,
    pub health_port: u16,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

pub const DEFAULT_POOL_SIZE: usize = 10;

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PipelineConfig::default();
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let path = |key: &str, default: &PathBuf| lookup(key).map(PathBuf::from).unwrap_or_else(|| default.clone());

        let worker_pool_size = parse_or(&lookup, "WORKER_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        if worker_pool_size == 0 {
            return Err(ConfigError::Message(
                "WORKER_POOL_SIZE must be at least 1".to_string(),
            ));
        }

        let segment_duration_secs =
            parse_or(&lookup, "SEGMENT_DURATION_SECS", defaults.segment_duration_secs)?;
        if segment_duration_secs == 0 {
            return Err(ConfigError::Message(
                "SEGMENT_DURATION_SECS must be at least 1".to_string(),
            ));
        }

        let pipeline = PipelineConfig {
            trusted_media_host: text("TRUSTED_MEDIA_HOST", &defaults.trusted_media_host),
            public_base_url: text("PUBLIC_BASE_URL", &defaults.public_base_url)
                .trim_end_matches('/')
                .to_string(),
            upload_dir: path("UPLOAD_DIR", &defaults.upload_dir),
            scratch_dir: path("SCRATCH_DIR", &defaults.scratch_dir),
            output_dir: path("OUTPUT_DIR", &defaults.output_dir),
            key_info_path: path("KEY_INFO_PATH", &defaults.key_info_path),
            segment_duration_secs,
            ffmpeg_path: text("FFMPEG_PATH", &defaults.ffmpeg_path),
            ffprobe_path: text("FFPROBE_PATH", &defaults.ffprobe_path),
        };

        Ok(Self {
            message_bus: MessageBusConfig {
                url: text("MESSAGE_BUS_URL", "nats://localhost:4222"),
                stream_name: lookup("MESSAGE_BUS_STREAM_NAME"),
                job_subject: text("TRANSCODE_JOB_SUBJECT", "transcode.jobs"),
            },
            pipeline,
            worker_pool_size,
            health_port: parse_or(&lookup, "HEALTH_CHECK_PORT", 8080)?,
            log_level: Some(text("LOG_LEVEL", "info")),
            log_format: lookup("LOG_FORMAT"),
        })
    }

    /// Get message bus URL
    pub fn message_bus_url(&self) -> &str {
        &self.message_bus.url
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn json_logs(&self) -> bool {
        matches!(self.log_format.as_deref(), Some("json"))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{} has invalid value: {}", key, raw))),
        None => Ok(default),
    }
}
