//! Output verification - encoded manifest duration against source duration
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


use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::manifest::{Manifest, ManifestError};
use crate::toolchain::{parse_duration, MediaToolchain, ProbeOutputError, ProbeRequest, ToolError};

/// A probe that could not produce a usable number
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("source duration probe failed: {0}")]
    SourceProbe(#[from] ToolError),

    #[error("source duration unreadable: {0}")]
    SourceOutput(#[from] ProbeOutputError),

    #[error("manifest unreadable: {0}")]
    Manifest(#[from] ManifestError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verification {
    Match { duration: f64 },
    Mismatch { expected: f64, actual: f64 },
}

impl Verification {
    /// Exact comparison, no tolerance band
    pub fn compare(expected: f64, actual: f64) -> Self {
        if expected == actual {
            Verification::Match { duration: actual }
        } else {
            Verification::Mismatch { expected, actual }
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match { .. })
    }
}

pub struct OutputVerifier {
    toolchain: Arc<dyn MediaToolchain>,
}

impl OutputVerifier {
    pub fn new(toolchain: Arc<dyn MediaToolchain>) -> Self {
        Self { toolchain }
    }

    /// Duration of the source asset in seconds
    pub async fn source_duration(&self, input_path: &Path) -> Result<f64, VerifyError> {
        let output = self
            .toolchain
            .probe(&ProbeRequest::Duration(input_path.to_path_buf()))
            .await?;
        let duration = parse_duration(&output)?;
        debug!(input = %input_path.display(), duration = duration, "Source duration probed");
        Ok(duration)
    }

    /// Sum of the segment durations declared by the manifest
    pub async fn manifest_duration(&self, manifest_path: &Path) -> Result<f64, VerifyError> {
        let manifest = Manifest::load(manifest_path).await?;
        Ok(manifest.total_duration())
    }

    /// Compare the manifest against an already probed source duration
    pub async fn verify(
        &self,
        manifest_path: &Path,
        source_duration: f64,
    ) -> Result<Verification, VerifyError> {
        let actual = self.manifest_duration(manifest_path).await?;
        let verification = Verification::compare(source_duration, actual);

        if let Verification::Mismatch { expected, actual } = verification {
            warn!(
                manifest = %manifest_path.display(),
                expected = expected,
                actual = actual,
                "Encoded duration does not match source"
            );
        }

        Ok(verification)
    }
}
