//! External encoder and prober invocation
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


use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::resolution::Geometry;

/// Lines of encoder stderr kept in logs when an attempt fails
const STDERR_TAIL_LINES: usize = 20;

/// Everything needed to run one encode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    pub input_path: PathBuf,
    pub geometry: Geometry,
    pub output_dir: PathBuf,
    /// Deterministic basename for the encoder's manifest and segments
    pub base_name: String,
    pub key_info_path: PathBuf,
    pub segment_duration_secs: u32,
}

impl EncodeRequest {
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.m3u8", self.base_name))
    }

    pub fn segment_pattern(&self) -> PathBuf {
        self.output_dir.join(format!("{}_%03d.ts", self.base_name))
    }
}

/// Metadata queries against a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeRequest {
    /// First video stream as `WIDTHxHEIGHT`
    Resolution(PathBuf),
    /// Container duration in seconds
    Duration(PathBuf),
}

impl ProbeRequest {
    pub fn path(&self) -> &Path {
        match self {
            ProbeRequest::Resolution(path) | ProbeRequest::Duration(path) => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}")]
    Exit { tool: String, status: String },

    #[error("{tool} produced non UTF-8 output")]
    InvalidOutput { tool: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ProbeOutputError {
    #[error("unexpected resolution output: {0:?}")]
    Resolution(String),

    #[error("unexpected duration output: {0:?}")]
    Duration(String),
}

/// Runs the external encoder and prober
///
/// The pipeline only depends on this trait, so tests can swap in a fake
/// that writes manifests directly.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Run one encode; `Ok` means the encoder exited with status 0
    async fn encode(&self, request: &EncodeRequest) -> Result<(), ToolError>;

    /// Run one probe and return its trimmed standard output
    async fn probe(&self, request: &ProbeRequest) -> Result<String, ToolError>;
}

/// `ffmpeg`/`ffprobe` command line toolchain
pub struct FfmpegToolchain {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegToolchain {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Check if FFmpeg is available
    pub async fn check_available(&self) -> bool {
        match Command::new(&self.ffmpeg_path).arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Encoder arguments: H.264 video, copied audio, AES-encrypted VOD HLS
    /// with keyframes forced on every segment boundary
    pub fn encode_args(request: &EncodeRequest) -> Vec<OsString> {
        let seg = request.segment_duration_secs;
        let mut args: Vec<OsString> = Vec::new();
        let mut push = |value: OsString| args.push(value);

        push("-y".into());
        push("-i".into());
        push(request.input_path.clone().into_os_string());
        push("-c:v".into());
        push("libx264".into());
        push("-c:a".into());
        push("copy".into());
        push("-f".into());
        push("hls".into());
        push("-force_key_frames".into());
        push(format!("expr:gte(t,n_forced*{})", seg).into());
        push("-hls_time".into());
        push(seg.to_string().into());
        push("-s".into());
        push(request.geometry.to_string().into());
        push("-hls_list_size".into());
        push("0".into());
        push("-hls_key_info_file".into());
        push(request.key_info_path.clone().into_os_string());
        push("-hls_playlist_type".into());
        push("vod".into());
        push("-hls_segment_filename".into());
        push(request.segment_pattern().into_os_string());
        push(request.manifest_path().into_os_string());

        args
    }

    pub fn probe_args(request: &ProbeRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = match request {
            ProbeRequest::Resolution(_) => [
                "-v", "error", "-select_streams", "v:0", "-show_entries",
                "stream=width,height", "-of", "csv=s=x:p=0",
            ]
            .iter()
            .map(OsString::from)
            .collect(),
            ProbeRequest::Duration(_) => [
                "-v", "error", "-show_entries", "format=duration", "-of",
                "default=noprint_wrappers=1:nokey=1",
            ]
            .iter()
            .map(OsString::from)
            .collect(),
        };
        args.push(request.path().as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl MediaToolchain for FfmpegToolchain {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), ToolError> {
        info!(
            input = %request.input_path.display(),
            geometry = %request.geometry,
            manifest = %request.manifest_path().display(),
            "Running encoder"
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(Self::encode_args(request))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ToolError::Launch {
                tool: self.ffmpeg_path.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(STDERR_TAIL_LINES).collect();
            warn!(
                status = %output.status,
                stderr_tail = tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
                "Encoder exited unsuccessfully"
            );
            return Err(ToolError::Exit {
                tool: self.ffmpeg_path.clone(),
                status: output.status.to_string(),
            });
        }

        Ok(())
    }

    async fn probe(&self, request: &ProbeRequest) -> Result<String, ToolError> {
        debug!(request = ?request, "Running probe");

        let output = Command::new(&self.ffprobe_path)
            .args(Self::probe_args(request))
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ToolError::Launch {
                tool: self.ffprobe_path.clone(),
                source,
            })?;

        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Probe exited unsuccessfully"
            );
            return Err(ToolError::Exit {
                tool: self.ffprobe_path.clone(),
                status: output.status.to_string(),
            });
        }

        String::from_utf8(output.stdout)
            .map(|stdout| stdout.trim().to_string())
            .map_err(|_| ToolError::InvalidOutput {
                tool: self.ffprobe_path.clone(),
            })
    }
}

/// Parse `WIDTHxHEIGHT` probe output into positive dimensions
pub fn parse_resolution(output: &str) -> Result<(u32, u32), ProbeOutputError> {
    let trimmed = output.trim();
    let invalid = || ProbeOutputError::Resolution(trimmed.to_string());

    let (width, height) = trimmed.split_once('x').ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(invalid());
    }

    Ok((width, height))
}

/// Parse a duration in seconds
pub fn parse_duration(output: &str) -> Result<f64, ProbeOutputError> {
    let trimmed = output.trim();
    match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(ProbeOutputError::Duration(trimmed.to_string())),
    }
}
