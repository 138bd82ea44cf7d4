//! Callback Notifier
//!
//! Delivers the job outcome to the job's callback URL as a JSON POST.
//! Exactly one attempt is made per job; failures are reported to the caller
//! for logging and never retried.
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
use thiserror::Error;
use tracing::info;
use transcoder_types::CallbackPayload;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("callback request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("callback returned status: {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    /// Deliver `payload` to `url` once
    async fn notify(&self, url: &str, payload: &CallbackPayload) -> Result<(), NotifyError>;
}

/// Notifier that POSTs the payload over HTTP
pub struct HttpNotifier {
    client: reqwest::Client,
}

impl HttpNotifier {
    /// Create a new HTTP notifier
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallbackNotifier for HttpNotifier {
    async fn notify(&self, url: &str, payload: &CallbackPayload) -> Result<(), NotifyError> {
        info!(
            url = url,
            code = payload.code,
            msg = %payload.msg,
            "Sending callback"
        );

        let response = self.client.post(url).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcoder_types::JobResult;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_json_payload() {
        let server = MockServer::start().await;
        let payload = JobResult::failure("https://cdn.example.com/a.mp4", "duration mismatch")
            .to_callback_payload();

        Mock::given(method("POST"))
            .and(path("/callback"))
            .and(body_json(serde_json::json!({
                "code": 500,
                "msg": "duration mismatch",
                "data": { "media_url": "https://cdn.example.com/a.mp4", "m3u8_url": "" }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        HttpNotifier::new()
            .notify(&format!("{}/callback", server.uri()), &payload)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let payload = JobResult::success("a", "b").to_callback_payload();
        let err = HttpNotifier::new()
            .notify(&server.uri(), &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Status(s) if s.as_u16() == 503));
    }
}
