//! Transcode Worker Library
//!
//! This library provides the HLS transcoding pipeline:
//! - Source acquisition (local uploads or HTTP download)
//! - Resolution planning and encrypted HLS encoding
//! - Duration verification with a single re-encode on mismatch
//! - Segment name obfuscation
//! - Callback delivery and a fixed-size worker pool
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


pub mod downloader;
pub mod error;
pub mod health;
pub mod manifest;
pub mod notifier;
pub mod obfuscator;
pub mod pool;
pub mod processor;
pub mod resolution;
pub mod toolchain;
pub mod verifier;
pub mod worker;

pub use error::{PipelineError, Stage};
pub use notifier::{CallbackNotifier, HttpNotifier};
pub use pool::{JobSubmitter, PoolStats, WorkerPool};
pub use processor::{JobProcessor, JobState, MAX_ENCODE_RETRIES};
pub use toolchain::{EncodeRequest, FfmpegToolchain, MediaToolchain, ProbeRequest};
