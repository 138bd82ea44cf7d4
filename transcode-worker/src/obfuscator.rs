//! Segment name obfuscation
//!
//! Replaces the encoder's sequential segment names with names derived from
//! an MD5 of the original name, prefixed by a per-session manifest basename.
//! Segment files are renamed first; the rewritten manifest is written to a
//! temporary file and swapped in only once every rename has succeeded.
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


use md5::{Digest, Md5};
use rand::{distributions::Alphanumeric, Rng};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::manifest::{Manifest, ManifestError};

const SESSION_TOKEN_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum ObfuscateError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("manifest path has no parent directory: {0}")]
    InvalidLayout(PathBuf),

    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the obfuscated rendition ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscatedManifest {
    pub base_name: String,
    pub manifest_path: PathBuf,
    pub public_url: String,
    pub segment_files: Vec<PathBuf>,
}

pub fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// Random alphanumeric token plus the current unix time, hashed
pub fn session_base_name() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect();
    md5_hex(&format!("{}{}", token, chrono::Utc::now().timestamp()))
}

pub fn obfuscated_segment_name(base_name: &str, original: &str) -> String {
    format!("{}_{}.ts", base_name, md5_hex(original))
}

/// Obfuscate a manifest under a fresh session basename
pub async fn obfuscate(
    manifest_path: &Path,
    public_dir_url: &str,
) -> Result<ObfuscatedManifest, ObfuscateError> {
    obfuscate_with_base_name(manifest_path, public_dir_url, &session_base_name()).await
}

pub async fn obfuscate_with_base_name(
    manifest_path: &Path,
    public_dir_url: &str,
    base_name: &str,
) -> Result<ObfuscatedManifest, ObfuscateError> {
    let dir = manifest_path
        .parent()
        .ok_or_else(|| ObfuscateError::InvalidLayout(manifest_path.to_path_buf()))?;
    let public_dir_url = public_dir_url.trim_end_matches('/');

    let mut manifest = Manifest::load(manifest_path).await?;
    let originals: Vec<String> = manifest.segments().iter().map(|s| s.uri.clone()).collect();

    let mut renamed: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(originals.len());
    for (index, original) in originals.iter().enumerate() {
        let new_name = obfuscated_segment_name(base_name, original);
        let from = dir.join(original);
        let to = dir.join(&new_name);

        if let Err(source) = fs::rename(&from, &to).await {
            rollback(&renamed).await;
            return Err(ObfuscateError::Rename { from, to, source });
        }
        renamed.push((from, to));
        manifest.set_segment_uri(index, format!("{}/{}", public_dir_url, new_name));
    }

    let final_path = dir.join(format!("{}.m3u8", base_name));
    let temp_path = dir.join(format!(".{}.m3u8.tmp", base_name));

    let persisted = async {
        fs::write(&temp_path, manifest.render()).await?;
        fs::rename(&temp_path, &final_path).await
    }
    .await;

    if let Err(source) = persisted {
        let _ = fs::remove_file(&temp_path).await;
        rollback(&renamed).await;
        return Err(ObfuscateError::Write {
            path: final_path,
            source,
        });
    }

    if final_path.as_path() != manifest_path {
        if let Err(e) = fs::remove_file(manifest_path).await {
            warn!(
                manifest = %manifest_path.display(),
                error = %e,
                "Failed to remove encoder manifest"
            );
        }
    }

    if let Some(encoder_stem) = manifest_path.file_stem().and_then(|stem| stem.to_str()) {
        let kept: Vec<&Path> = renamed.iter().map(|(_, to)| to.as_path()).collect();
        remove_stale_segments(dir, encoder_stem, &kept).await;
    }

    info!(
        manifest = %final_path.display(),
        segments = renamed.len(),
        "Segments obfuscated"
    );

    Ok(ObfuscatedManifest {
        base_name: base_name.to_string(),
        public_url: format!("{}/{}.m3u8", public_dir_url, base_name),
        manifest_path: final_path,
        segment_files: renamed.into_iter().map(|(_, to)| to).collect(),
    })
}

/// Delete `<encoder_stem>_*.ts` files the manifest no longer references,
/// e.g. extra segments left behind by an earlier, longer encode attempt
async fn remove_stale_segments(dir: &Path, encoder_stem: &str, kept: &[&Path]) {
    let prefix = format!("{}_", encoder_stem);
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to scan for stale segments");
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let stale = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(&prefix) && name.ends_with(".ts"))
            .unwrap_or(false);

        if stale && !kept.contains(&path.as_path()) {
            if let Err(e) = fs::remove_file(&path).await {
                warn!(segment = %path.display(), error = %e, "Failed to remove stale segment");
            }
        }
    }
}

/// Best-effort undo of completed renames, newest first
async fn rollback(renamed: &[(PathBuf, PathBuf)]) {
    for (from, to) in renamed.iter().rev() {
        if let Err(e) = fs::rename(to, from).await {
            warn!(
                from = %to.display(),
                to = %from.display(),
                error = %e,
                "Failed to roll back segment rename"
            );
        }
    }
}
