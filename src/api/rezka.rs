//! Stream locator client
//!
//! Fetches adaptive-stream URLs per resolution from the stream service.
//! The service answers with `stream_urls`, an `error`, or a `warning`
//! alongside still-valid `stream_urls`.

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::StreamMap;

/// Stream locator error types
#[derive(Error, Debug)]
pub enum StreamLocatorError {
    /// Message supplied by the provider, surfaced verbatim
    #[error("{0}")]
    Provider(String),

    #[error("Stream service returned HTTP {0}")]
    Http(u16),

    #[error("No playable stream URLs returned")]
    NoStreams,
}

/// Stream service response
#[derive(Debug, Deserialize)]
struct StreamResponse {
    stream_urls: Option<serde_json::Map<String, serde_json::Value>>,
    error: Option<String>,
    warning: Option<String>,
    /// FastAPI error body
    detail: Option<String>,
}

impl StreamResponse {
    /// Keep provider order, drop resolutions without a URL
    fn into_lookup(self) -> std::result::Result<StreamLookup, StreamLocatorError> {
        if let Some(error) = self.error.or(self.detail) {
            return Err(StreamLocatorError::Provider(error));
        }

        let entries: Vec<(String, String)> = self
            .stream_urls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(label, url)| match url {
                serde_json::Value::String(u) if !u.is_empty() => Some((label, u)),
                _ => None,
            })
            .collect();

        if entries.is_empty() {
            return Err(StreamLocatorError::NoStreams);
        }

        Ok(StreamLookup {
            streams: StreamMap::new(entries),
            warning: self.warning,
        })
    }
}

/// Successful stream lookup
#[derive(Debug, Clone, PartialEq)]
pub struct StreamLookup {
    pub streams: StreamMap,
    /// Non-fatal provider notice (e.g. ambiguous title match)
    pub warning: Option<String>,
}

/// Episode coordinates for series lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeRef {
    pub season: u16,
    pub episode: u16,
}

/// Stream service client
#[derive(Clone)]
pub struct StreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl StreamClient {
    /// Create a client pointed at the stream service
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Look up streams for a movie (`episode = None`) or a series episode
    pub async fn fetch_stream(&self, title: &str, episode: Option<EpisodeRef>) -> Result<StreamLookup> {
        let mut url = format!(
            "{}/fetch_stream?title={}",
            self.base_url,
            urlencoding::encode(title)
        );
        if let Some(ep) = episode {
            url.push_str(&format!("&season={}&episode={}", ep.season, ep.episode));
        }

        debug!(title, ?episode, "stream lookup");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach stream service")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        let data: StreamResponse = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(_) if !status.is_success() => {
                return Err(StreamLocatorError::Http(status.as_u16()).into());
            }
            Err(e) => return Err(e).context("Failed to parse JSON response"),
        };

        let lookup = data.into_lookup()?;
        if let Some(ref warning) = lookup.warning {
            warn!(title, warning = %warning, "stream service warning");
        }
        Ok(lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> std::result::Result<StreamLookup, StreamLocatorError> {
        serde_json::from_str::<StreamResponse>(body)
            .unwrap()
            .into_lookup()
    }

    #[test]
    fn test_preserves_provider_order() {
        let lookup = parse(
            r#"{"stream_urls": {"1080p": "https://cdn/a.m3u8", "360p": "https://cdn/b.m3u8", "720p": "https://cdn/c.m3u8"}}"#,
        )
        .unwrap();
        let labels: Vec<&str> = lookup.streams.resolutions().collect();
        assert_eq!(labels, vec!["1080p", "360p", "720p"]);
        assert!(lookup.warning.is_none());
    }

    #[test]
    fn test_drops_null_urls() {
        let lookup =
            parse(r#"{"stream_urls": {"1080p": null, "720p": "https://cdn/c.m3u8"}}"#).unwrap();
        assert_eq!(lookup.streams.len(), 1);
        assert!(matches!(
            parse(r#"{"stream_urls": {"1080p": null}}"#),
            Err(StreamLocatorError::NoStreams)
        ));
    }

    #[test]
    fn test_error_and_warning() {
        match parse(r#"{"error": "הזרם לא נמצא."}"#) {
            Err(StreamLocatorError::Provider(msg)) => assert_eq!(msg, "הזרם לא נמצא."),
            other => panic!("unexpected: {:?}", other),
        }
        let lookup = parse(
            r#"{"stream_urls": {"480p": "https://cdn/x.m3u8"}, "warning": "לא נמצא דיבוב באנגלית"}"#,
        )
        .unwrap();
        assert_eq!(lookup.warning.as_deref(), Some("לא נמצא דיבוב באנגלית"));
    }
}
