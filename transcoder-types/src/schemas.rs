//! Callback and job result schemas
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


use serde::{Deserialize, Serialize};

pub const CODE_SUCCESS: u16 = 200;
pub const CODE_FAILURE: u16 = 500;

// ============================================================================
// Job Result
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failure,
}

/// Outcome of one transcode job, delivered once to its callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub source_ref: String,
    pub public_manifest_url: Option<String>,
    pub message: String,
}

impl JobResult {
    pub fn success(source_ref: impl Into<String>, manifest_url: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Success,
            source_ref: source_ref.into(),
            public_manifest_url: Some(manifest_url.into()),
            message: "success".to_string(),
        }
    }

    pub fn failure(source_ref: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failure,
            source_ref: source_ref.into(),
            public_manifest_url: None,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    /// Build the wire payload posted to the job's callback
    pub fn to_callback_payload(&self) -> CallbackPayload {
        let code = match self.status {
            JobStatus::Success => CODE_SUCCESS,
            JobStatus::Failure => CODE_FAILURE,
        };

        CallbackPayload {
            code,
            msg: self.message.clone(),
            data: CallbackData {
                media_url: self.source_ref.clone(),
                m3u8_url: self.public_manifest_url.clone().unwrap_or_default(),
            },
        }
    }
}

// ============================================================================
// Callback Payload
// ============================================================================

/// Body of the notification POST
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub code: u16,
    pub msg: String,
    pub data: CallbackData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackData {
    pub media_url: String,
    pub m3u8_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_payload() {
        let result = JobResult::success(
            "https://cdn.example.com/a.mp4",
            "https://media.example.com/converter/20250101/x/abc.m3u8",
        );
        let payload = result.to_callback_payload();
        assert_eq!(payload.code, 200);
        assert_eq!(payload.msg, "success");
        assert_eq!(
            payload.data.m3u8_url,
            "https://media.example.com/converter/20250101/x/abc.m3u8"
        );
    }

    #[test]
    fn test_failure_payload_has_no_manifest() {
        let result = JobResult::failure("https://cdn.example.com/a.mp4", "duration mismatch");
        let json = serde_json::to_value(result.to_callback_payload()).unwrap();
        assert_eq!(json["code"], 500);
        assert_eq!(json["msg"], "duration mismatch");
        assert_eq!(json["data"]["media_url"], "https://cdn.example.com/a.mp4");
        assert_eq!(json["data"]["m3u8_url"], "");
    }
}
