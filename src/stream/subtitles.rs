//! Subtitle locator client
//!
//! Lists Hebrew subtitle releases by IMDB id and downloads them as
//! single-file zip archives. Movies return a flat release list, series a
//! nested `season → episode → releases` object.
//!
//! Extracted subtitles are normalized to WebVTT and cached in
//! ~/.cache/tvhero/subtitles/

use std::io::{Cursor, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::SubtitleCandidate;

/// Header that marks native WebVTT content
pub const WEBVTT_HEADER: &str = "WEBVTT";

/// Subtitle download and extraction errors
#[derive(Error, Debug)]
pub enum SubtitleError {
    #[error("Subtitle service returned HTTP {0}")]
    Http(u16),

    #[error("Archive could not be read: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive contains no subtitle file")]
    EmptyArchive,

    #[error("Failed to read archived file: {0}")]
    Io(#[from] std::io::Error),
}

/// Release list response; `subs` is a list or a nested season map
#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    #[serde(default)]
    subs: Value,
}

/// Subtitle service client
pub struct SubtitleClient {
    base_url: String,
    client: reqwest::Client,
    cache_dir: Option<PathBuf>,
}

impl SubtitleClient {
    /// Create a client caching normalized tracks under `cache_dir`
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_base_url(base_url).with_cache_dir(cache_dir)
    }

    /// Create with custom base URL and no cache (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            cache_dir: None,
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Releases for a movie, or for one episode when season and episode are given
    ///
    /// Never fails: an unexpected shape or a failed request yields a list
    /// holding only [`SubtitleCandidate::error_sentinel`].
    pub async fn list_candidates(
        &self,
        imdb_id: &str,
        season: Option<u16>,
        episode: Option<u16>,
    ) -> Vec<SubtitleCandidate> {
        let releases = match self.fetch_releases(imdb_id).await {
            Ok(value) => value,
            Err(e) => {
                warn!(imdb_id, error = %e, "subtitle listing failed");
                return vec![SubtitleCandidate::error_sentinel()];
            }
        };

        match select_releases(&releases, season, episode) {
            Some(candidates) => candidates,
            None => {
                warn!(imdb_id, ?season, ?episode, "unexpected subtitle listing shape");
                vec![SubtitleCandidate::error_sentinel()]
            }
        }
    }

    async fn fetch_releases(&self, imdb_id: &str) -> Result<Value> {
        let url = format!(
            "{}/api/releases/{}",
            self.base_url,
            urlencoding::encode(&normalize_imdb_id(imdb_id))
        );
        debug!(%url, "listing subtitle releases");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach subtitle service")?;

        if !response.status().is_success() {
            return Err(SubtitleError::Http(response.status().as_u16()).into());
        }

        let body: ReleasesResponse = response
            .json()
            .await
            .context("Failed to parse subtitle listing")?;
        Ok(body.subs)
    }

    /// Download a release archive
    pub async fn download(&self, release_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/api/files/sub/{}",
            self.base_url,
            urlencoding::encode(release_id)
        );
        debug!(%url, "downloading subtitle archive");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach subtitle service")?;

        if !response.status().is_success() {
            return Err(SubtitleError::Http(response.status().as_u16()).into());
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Download, extract and normalize a release to WebVTT text
    pub async fn load(&self, release_id: &str) -> Result<String> {
        // Check cache first
        if let Some(path) = self.cache_path(release_id) {
            if path.exists() {
                return Ok(std::fs::read_to_string(&path)?);
            }
        }

        let archive = self.download(release_id).await?;
        let text = extract_single_file(&archive)?;
        let webvtt = normalize_to_webvtt(&text);

        if let Some(path) = self.cache_path(release_id) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &webvtt)?;
        }

        Ok(webvtt)
    }

    fn cache_path(&self, release_id: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            dir.join(format!("{}.vtt", urlencoding::encode(release_id)))
        })
    }
}

/// Pick the release list for a movie or for one episode
///
/// Returns `None` when the payload does not have the expected shape.
pub fn select_releases(
    subs: &Value,
    season: Option<u16>,
    episode: Option<u16>,
) -> Option<Vec<SubtitleCandidate>> {
    let list = match (season, episode) {
        (Some(s), Some(e)) => subs
            .as_object()?
            .get(&s.to_string())?
            .as_object()?
            .get(&e.to_string())?,
        (None, None) => subs,
        _ => return None,
    };

    list.as_array()?
        .iter()
        .map(release_to_candidate)
        .collect()
}

fn release_to_candidate(release: &Value) -> Option<SubtitleCandidate> {
    let id = match release.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let version = release
        .get("version")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(id.as_str());
    let mut label = version.to_string();

    match release.get("year") {
        Some(Value::Number(n)) => label.push_str(&format!(" ({})", n)),
        Some(Value::String(s)) if !s.is_empty() => label.push_str(&format!(" ({})", s)),
        _ => {}
    }
    if let Some(group) = release
        .get("release_group")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        label.push_str(&format!(" - {}", group));
    }

    Some(SubtitleCandidate { id, label })
}

/// Extract the sole file of a subtitle archive as text
pub fn extract_single_file(archive: &[u8]) -> std::result::Result<String, SubtitleError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;

    for index in 0..zip.len() {
        let mut file = zip.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let text = String::from_utf8_lossy(&bytes);
        return Ok(text.trim_start_matches('\u{feff}').to_string());
    }

    Err(SubtitleError::EmptyArchive)
}

/// Sniff the format: WebVTT passes through, anything else is treated as SRT
pub fn normalize_to_webvtt(text: &str) -> String {
    if text.trim_start().starts_with(WEBVTT_HEADER) {
        text.replace("\r\n", "\n")
    } else {
        srt_to_webvtt(text)
    }
}

/// Convert SRT content to WebVTT format
///
/// Converts SRT timestamps (00:00:00,000) to WebVTT format (00:00:00.000)
/// and adds the required WEBVTT header.
pub fn srt_to_webvtt(srt: &str) -> String {
    let mut webvtt = String::from("WEBVTT\n\n");

    // Process line by line, only converting timestamps (not dialogue text)
    for line in srt.lines() {
        let converted = if line.contains(" --> ") {
            line.replace(',', ".")
        } else {
            line.to_string()
        };
        webvtt.push_str(&converted);
        webvtt.push('\n');
    }

    webvtt
}

/// Normalize IMDB ID to have "tt" prefix
fn normalize_imdb_id(imdb_id: &str) -> String {
    if imdb_id.starts_with("tt") {
        imdb_id.to_string()
    } else {
        format!("tt{}", imdb_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_flat_releases() {
        let subs = json!([
            {"id": 101, "version": "Dune.2021.1080p.WEB-DL", "year": 2021, "release_group": "EVO"},
            {"id": "102", "version": ""}
        ]);
        let candidates = select_releases(&subs, None, None).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "101");
        assert_eq!(candidates[0].label, "Dune.2021.1080p.WEB-DL (2021) - EVO");
        assert_eq!(candidates[1].label, "102");
    }

    #[test]
    fn test_select_nested_episode() {
        let subs = json!({
            "1": {"1": [{"id": 7, "version": "S01E01.720p"}], "2": []},
            "2": {"1": [{"id": 9, "version": "S02E01"}]}
        });
        let candidates = select_releases(&subs, Some(2), Some(1)).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "9");

        assert!(select_releases(&subs, Some(1), Some(2)).unwrap().is_empty());
        assert!(select_releases(&subs, Some(3), Some(1)).is_none());
        assert!(select_releases(&subs, None, None).is_none());
        assert!(select_releases(&subs, Some(1), None).is_none());
    }

    #[test]
    fn test_normalize_sniffs_format() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nשלום\n";
        assert_eq!(normalize_to_webvtt(vtt), vtt);

        let srt = "1\n00:00:01,000 --> 00:00:02,500\nשלום, עולם\n";
        let converted = normalize_to_webvtt(srt);
        assert!(converted.starts_with("WEBVTT\n\n"));
        assert!(converted.contains("00:00:01.000 --> 00:00:02.500"));
        assert!(converted.contains("שלום, עולם"));
    }

    #[test]
    fn test_normalize_imdb_id() {
        assert_eq!(normalize_imdb_id("tt0133093"), "tt0133093");
        assert_eq!(normalize_imdb_id("0133093"), "tt0133093");
    }
}
