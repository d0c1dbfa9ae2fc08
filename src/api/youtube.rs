//! Video-platform search gateway
//!
//! Keyword search used as the trailer fallback when the catalog has no
//! trailer entry.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Embeddable player URL for a video id
pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{}", video_id)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
}

#[derive(Debug, Deserialize)]
struct ItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

/// YouTube Data API search client
#[derive(Clone)]
pub struct YoutubeClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl YoutubeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://www.googleapis.com/youtube/v3")
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// First matching video id for a keyword query
    pub async fn search(&self, query: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/search?part=snippet&maxResults=1&q={}&key={}",
            self.base_url,
            urlencoding::encode(query),
            self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach YouTube")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("YouTube returned HTTP {}", status);
        }

        let data: SearchResponse = response
            .json()
            .await
            .context("Failed to parse YouTube response")?;

        Ok(data.items.into_iter().find_map(|item| item.id.video_id))
    }
}
