//! HLS media playlist parsing and rendering
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


use std::path::{Path, PathBuf};
use thiserror::Error;

const EXTINF: &str = "#EXTINF:";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: invalid segment duration {value:?}")]
    InvalidDuration { line: usize, value: String },

    #[error("line {line}: segment reference without a preceding #EXTINF")]
    OrphanSegment { line: usize },

    #[error("line {line}: #EXTINF not followed by a segment reference")]
    DanglingDuration { line: usize },

    #[error("manifest lists no segments")]
    NoSegments,
}

/// One media segment entry
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub duration: f64,
    pub uri: String,
    /// Index of the URI line in the manifest text
    pub line_index: usize,
}

/// A parsed media playlist that can be re-rendered after URI rewrites
#[derive(Debug, Clone)]
pub struct Manifest {
    lines: Vec<String>,
    segments: Vec<Segment>,
    trailing_newline: bool,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut segments = Vec::new();
        let mut pending: Option<(usize, f64)> = None;

        for (index, raw) in lines.iter().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix(EXTINF) {
                if let Some((extinf_index, _)) = pending {
                    return Err(ManifestError::DanglingDuration { line: extinf_index + 1 });
                }
                let value = rest.split(',').next().unwrap_or("").trim();
                let duration = value
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .ok_or_else(|| ManifestError::InvalidDuration {
                        line: index + 1,
                        value: value.to_string(),
                    })?;
                pending = Some((index, duration));
            } else if line.starts_with('#') {
                continue;
            } else {
                let (_, duration) = pending
                    .take()
                    .ok_or(ManifestError::OrphanSegment { line: index + 1 })?;
                segments.push(Segment {
                    duration,
                    uri: line.to_string(),
                    line_index: index,
                });
            }
        }

        if let Some((extinf_index, _)) = pending {
            return Err(ManifestError::DanglingDuration { line: extinf_index + 1 });
        }
        if segments.is_empty() {
            return Err(ManifestError::NoSegments);
        }

        Ok(Self {
            lines,
            segments,
            trailing_newline: text.ends_with('\n'),
        })
    }

    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&text)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Sum of the declared per-segment durations, in manifest order
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Replace the reference of segment `index`
    pub fn set_segment_uri(&mut self, index: usize, uri: impl Into<String>) {
        if let Some(segment) = self.segments.get_mut(index) {
            segment.uri = uri.into();
            self.lines[segment.line_index] = segment.uri.clone();
        }
    }

    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:5
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-PLAYLIST-TYPE:VOD
#EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.example.com/enc.key\",IV=0x0
#EXTINF:5.005000,
stream_000.ts
#EXTINF:5.005000,
stream_001.ts
#EXTINF:2.319000,
stream_002.ts
#EXT-X-ENDLIST
";

    fn manual_sum(text: &str) -> f64 {
        text.lines()
            .filter_map(|l| l.strip_prefix("#EXTINF:"))
            .map(|v| v.trim_end_matches(',').parse::<f64>().unwrap())
            .sum()
    }

    #[test]
    fn test_parse_segments() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let uris: Vec<&str> = manifest.segments().iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(uris, vec!["stream_000.ts", "stream_001.ts", "stream_002.ts"]);
        assert_eq!(manifest.total_duration(), manual_sum(SAMPLE));
    }

    #[test]
    fn test_duration_with_title() {
        let manifest = Manifest::parse("#EXTM3U\n#EXTINF:4.5,Intro\na.ts\n").unwrap();
        assert_eq!(manifest.total_duration(), 4.5);
    }

    #[test]
    fn test_render_is_identity_without_rewrites() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.render(), SAMPLE);
        let reparsed = Manifest::parse(&manifest.render()).unwrap();
        assert_eq!(reparsed.total_duration(), manifest.total_duration());
    }

    #[test]
    fn test_rewrite_keeps_tags() {
        let mut manifest = Manifest::parse(SAMPLE).unwrap();
        manifest.set_segment_uri(1, "https://cdn.example.com/x_1.ts");
        let text = manifest.render();
        assert!(text.contains("\nhttps://cdn.example.com/x_1.ts\n"));
        assert!(text.contains("#EXT-X-KEY:METHOD=AES-128"));
        assert!(!text.contains("stream_001.ts"));
        assert!(text.contains("stream_000.ts"));
    }

    #[test]
    fn test_malformed_duration() {
        let err = Manifest::parse("#EXTM3U\n#EXTINF:abc,\na.ts\n").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidDuration { line: 2, .. }));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            Manifest::parse("#EXTM3U\na.ts\n"),
            Err(ManifestError::OrphanSegment { line: 2 })
        ));
        assert!(matches!(
            Manifest::parse("#EXTM3U\n#EXTINF:1.0,\n"),
            Err(ManifestError::DanglingDuration { line: 2 })
        ));
        assert!(matches!(
            Manifest::parse("#EXTM3U\n#EXT-X-ENDLIST\n"),
            Err(ManifestError::NoSegments)
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = Manifest::load(Path::new("/nonexistent/stream.m3u8")).await.unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
