//! Job-level error taxonomy
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


use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::downloader::FetchError;
use crate::obfuscator::ObfuscateError;
use crate::toolchain::{ProbeOutputError, ToolError};
use crate::verifier::VerifyError;

/// Pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intake,
    Acquisition,
    Planning,
    Encode,
    ProbeParse,
    Verification,
    Persistence,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Acquisition => "acquisition",
            Stage::Planning => "planning",
            Stage::Encode => "encode",
            Stage::ProbeParse => "probe_parse",
            Stage::Verification => "verification",
            Stage::Persistence => "persistence",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::Intake => "invalid job",
            Stage::Acquisition => "acquisition failed",
            Stage::Planning => "planning failed",
            Stage::Encode => "encode failed",
            Stage::ProbeParse => "probe parse failed",
            Stage::Verification => "duration mismatch",
            Stage::Persistence => "persistence failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job has no callback reference")]
    MissingCallback,

    #[error("failed to acquire source: {0}")]
    Acquisition(#[from] FetchError),

    #[error("unknown quality standard: {0:?}")]
    UnknownStandard(String),

    #[error("resolution probe failed: {0}")]
    ResolutionProbe(#[source] ToolError),

    #[error("resolution unreadable: {0}")]
    ResolutionOutput(#[source] ProbeOutputError),

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encode attempt {attempt} failed: {source}")]
    Encode {
        attempt: u32,
        #[source]
        source: ToolError,
    },

    #[error("probe parse failed: {0}")]
    ProbeParse(#[from] VerifyError),

    #[error("duration mismatch: expected {expected}s, encoded {actual}s")]
    DurationMismatch { expected: f64, actual: f64 },

    #[error("failed to persist obfuscated output: {0}")]
    Persistence(#[from] ObfuscateError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::MissingCallback => Stage::Intake,
            PipelineError::Acquisition(_) => Stage::Acquisition,
            PipelineError::UnknownStandard(_)
            | PipelineError::ResolutionProbe(_)
            | PipelineError::ResolutionOutput(_)
            | PipelineError::OutputDir { .. } => Stage::Planning,
            PipelineError::Encode { .. } => Stage::Encode,
            PipelineError::ProbeParse(_) => Stage::ProbeParse,
            PipelineError::DurationMismatch { .. } => Stage::Verification,
            PipelineError::Persistence(_) => Stage::Persistence,
        }
    }

    /// Text reported in the callback's `msg` field
    ///
    /// Only names the failing stage; paths and tool output stay in the logs.
    pub fn message(&self) -> String {
        self.stage().failure_message().to_string()
    }
}
