//! Asset Fetcher - resolves a job's source to a local file, downloading over HTTP/HTTPS when needed
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


use futures::StreamExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::info;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid media url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("media url has no file name: {0}")]
    MissingFileName(String),

    #[error("local asset not found: {0}")]
    MissingLocalAsset(PathBuf),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request failed with status: {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves media URLs to local files
pub struct AssetFetcher {
    client: reqwest::Client,
    trusted_host: String,
    upload_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl AssetFetcher {
    /// Create a fetcher; sources on `trusted_host` are read from `upload_dir`,
    /// everything else is downloaded into `scratch_dir`
    pub fn new(
        trusted_host: impl Into<String>,
        upload_dir: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            trusted_host: trusted_host.into(),
            upload_dir: upload_dir.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Resolve `source_url` to a local path, downloading it if necessary
    pub async fn fetch(&self, source_url: &str, job_id: &Uuid) -> Result<PathBuf, FetchError> {
        let url = Url::parse(source_url).map_err(|e| FetchError::InvalidUrl {
            url: source_url.to_string(),
            reason: e.to_string(),
        })?;
        let file_name = file_name_of(&url)?;

        if self.is_trusted(&url) {
            let local = self.upload_dir.join(&file_name);
            if tokio::fs::metadata(&local).await.is_err() {
                return Err(FetchError::MissingLocalAsset(local));
            }
            info!(
                job_id = %job_id,
                path = %local.display(),
                "Resolved source to local upload"
            );
            return Ok(local);
        }

        match url.scheme() {
            "http" | "https" => {
                let destination = self.scratch_dir.join(format!("{}-{}", job_id, file_name));
                self.download_from_http(url, &destination, job_id).await
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Whether the URL's authority (host plus any non-default port) is the
    /// trusted media host
    fn is_trusted(&self, url: &Url) -> bool {
        let authority = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return false,
        };
        authority.eq_ignore_ascii_case(&self.trusted_host)
    }

    /// Download file from HTTP/HTTPS
    async fn download_from_http(
        &self,
        url: Url,
        destination: &Path,
        job_id: &Uuid,
    ) -> Result<PathBuf, FetchError> {
        info!(
            job_id = %job_id,
            url = %url,
            "Downloading from HTTP/HTTPS"
        );

        let response = self.client.get(url).send().await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(FetchError::Status(response.status()));
        }

        let io_error = |source| FetchError::Io {
            path: destination.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(&self.scratch_dir).await.map_err(io_error)?;
        let mut file = TokioFile::create(destination).await.map_err(io_error)?;

        let mut stream = response.bytes_stream();
        let mut total_bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(io_error)?;
            total_bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        info!(
            job_id = %job_id,
            size = total_bytes,
            destination = %destination.display(),
            "File downloaded from HTTP/HTTPS"
        );

        Ok(destination.to_path_buf())
    }
}

/// Last path segment of the URL, never `..` or empty
fn file_name_of(url: &Url) -> Result<String, FetchError> {
    Path::new(url.path())
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| FetchError::MissingFileName(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_of() {
        let url = Url::parse("https://cdn.example.com/videos/a.mp4?sig=1").unwrap();
        assert_eq!(file_name_of(&url).unwrap(), "a.mp4");

        let url = Url::parse("https://cdn.example.com/").unwrap();
        assert!(matches!(file_name_of(&url), Err(FetchError::MissingFileName(_))));
    }

    #[test]
    fn test_trusted_authority_includes_port() {
        let fetcher = AssetFetcher::new("media.example.com", "/uploads", "/scratch");
        let trusted = |s: &str| fetcher.is_trusted(&Url::parse(s).unwrap());

        assert!(trusted("https://media.example.com/uploads/a.mp4"));
        assert!(trusted("https://media.example.com:443/uploads/a.mp4"));
        assert!(!trusted("https://media.example.com:8443/uploads/a.mp4"));
        assert!(!trusted("https://cdn.example.com/uploads/a.mp4"));

        let fetcher = AssetFetcher::new("127.0.0.1:9000", "/uploads", "/scratch");
        assert!(fetcher.is_trusted(&Url::parse("http://127.0.0.1:9000/a.mp4").unwrap()));
        assert!(!fetcher.is_trusted(&Url::parse("http://127.0.0.1:9001/a.mp4").unwrap()));
    }

    #[tokio::test]
    async fn test_trusted_host_resolves_locally() {
        let uploads = tempfile::tempdir().unwrap();
        tokio::fs::write(uploads.path().join("a.mp4"), b"video").await.unwrap();

        let fetcher = AssetFetcher::new("media.example.com", uploads.path(), "/nonexistent");
        let path = fetcher
            .fetch("https://media.example.com/uploads/a.mp4", &Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(path, uploads.path().join("a.mp4"));
    }

    #[tokio::test]
    async fn test_trusted_host_missing_file() {
        let uploads = tempfile::tempdir().unwrap();
        let fetcher = AssetFetcher::new("media.example.com", uploads.path(), "/nonexistent");
        let result = fetcher
            .fetch("https://media.example.com/uploads/missing.mp4", &Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(FetchError::MissingLocalAsset(_))));
    }

    #[tokio::test]
    async fn test_unsupported_url_scheme() {
        let fetcher = AssetFetcher::new("media.example.com", "/uploads", "/scratch");
        let result = fetcher
            .fetch("ftp://example.com/file.mp4", &Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(FetchError::UnsupportedScheme(s)) if s == "ftp"));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let fetcher = AssetFetcher::new("media.example.com", "/uploads", "/scratch");
        let result = fetcher.fetch("not a url", &Uuid::new_v4()).await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }
}
