//! Configuration management for TVHero
//!
//! Handles config file loading/saving and gateway key lookup.
//! Config is stored at ~/.config/tvhero/config.toml; environment variables
//! take precedence over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resolve::catalog::DEFAULT_DEBOUNCE;
use crate::stream::SubtitleSettings;

pub const ENV_TMDB_KEY: &str = "TMDB_API_KEY";
pub const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";
pub const ENV_YOUTUBE_KEY: &str = "YOUTUBE_API_KEY";
pub const ENV_STREAM_URL: &str = "TVHERO_STREAM_URL";
pub const ENV_SUBTITLE_URL: &str = "TVHERO_SUBTITLE_URL";
pub const ENV_USER: &str = "TVHERO_USER";

const DEFAULT_STREAM_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_SUBTITLE_URL: &str = "https://wizdom.xyz";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metadata catalog API key
    pub tmdb_api_key: Option<String>,
    /// Language model gateway key
    pub openai_api_key: Option<String>,
    /// Video platform search key
    pub youtube_api_key: Option<String>,
    /// Override for the metadata catalog endpoint base
    pub tmdb_base_url: Option<String>,
    /// Stream locator service base URL
    pub stream_base_url: Option<String>,
    /// Subtitle service base URL
    pub subtitle_base_url: Option<String>,
    /// Override for the chat completions endpoint base
    pub inference_base_url: Option<String>,
    /// Override for the chat model
    pub inference_model: Option<String>,
    /// Where libraries and profiles are stored
    pub data_dir: Option<PathBuf>,
    /// Where downloaded subtitles are cached
    pub cache_dir: Option<PathBuf>,
    /// Signed-in user id
    pub user_id: Option<String>,
    /// Live search debounce in milliseconds
    pub search_debounce_ms: Option<u64>,
    /// Initial subtitle presentation
    pub subtitles: SubtitleSettings,
}

impl Config {
    /// Get config file path (~/.config/tvhero/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tvhero").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    fn env_or(var: &str, fallback: &Option<String>) -> Option<String> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| fallback.clone())
    }

    /// Metadata key: environment, then config file
    pub fn tmdb_api_key(&self) -> Result<String> {
        Self::env_or(ENV_TMDB_KEY, &self.tmdb_api_key)
            .ok_or_else(|| anyhow::anyhow!("No TMDB API key; set {} or tmdb_api_key", ENV_TMDB_KEY))
    }

    pub fn openai_api_key(&self) -> Result<String> {
        Self::env_or(ENV_OPENAI_KEY, &self.openai_api_key).ok_or_else(|| {
            anyhow::anyhow!("No language model key; set {} or openai_api_key", ENV_OPENAI_KEY)
        })
    }

    /// Video platform key; trailers fall back to catalog-only without it
    pub fn youtube_api_key(&self) -> Option<String> {
        Self::env_or(ENV_YOUTUBE_KEY, &self.youtube_api_key)
    }

    pub fn stream_base_url(&self) -> String {
        Self::env_or(ENV_STREAM_URL, &self.stream_base_url)
            .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string())
    }

    pub fn subtitle_base_url(&self) -> String {
        Self::env_or(ENV_SUBTITLE_URL, &self.subtitle_base_url)
            .unwrap_or_else(|| DEFAULT_SUBTITLE_URL.to_string())
    }

    /// Signed-in user: CLI flag, environment, then config file
    pub fn user_id(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::to_string)
            .or_else(|| Self::env_or(ENV_USER, &self.user_id))
    }

    /// Library data directory (~/.local/share/tvhero by default)
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tvhero")
        })
    }

    /// Download cache directory (~/.cache/tvhero by default)
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("tvhero")
        })
    }

    pub fn search_debounce(&self) -> Duration {
        self.search_debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE)
    }
}
