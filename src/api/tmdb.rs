//! TMDB (The Movie Database) API client
//!
//! Metadata gateway for the pipeline: search, localized details, external
//! identifiers, videos, credits and season listings.
//! API docs: https://developer.themoviedb.org/docs

use anyhow::Result;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    extract_year, poster_url, Episode, Locale, MediaCategory, MediaSummary, SeasonSummary,
};

/// TMDB API error types
#[derive(Error, Debug)]
pub enum TmdbError {
    #[error("Resource not found (404)")]
    NotFound,

    #[error("Rate limited (429), retries exhausted")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid season number: {0}")]
    InvalidSeason(u16),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// TMDB API client
#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl TmdbClient {
    /// Create a new TMDB client with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.themoviedb.org/3")
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            max_retries: 3,
        }
    }

    /// Make a keyed GET request with retry logic for rate limits
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str, locale: Locale) -> Result<T> {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}{}language={}&api_key={}",
            self.base_url,
            endpoint,
            separator,
            locale.code(),
            self.api_key
        );
        let mut retries = 0;

        debug!(endpoint, language = locale.code(), "tmdb request");

        loop {
            let response = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(TmdbError::RequestFailed)?;

            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await.map_err(TmdbError::RequestFailed)?;
                    let parsed: T = serde_json::from_str(&body).map_err(|e| {
                        TmdbError::InvalidResponse(format!("JSON parse error: {}", e))
                    })?;
                    return Ok(parsed);
                }
                StatusCode::NOT_FOUND => {
                    return Err(TmdbError::NotFound.into());
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(TmdbError::RateLimited.into());
                    }

                    // Get Retry-After header or default to exponential backoff
                    let wait_secs = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(2u64.pow(retries));

                    warn!(endpoint, wait_secs, "tmdb rate limited, backing off");
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }
                status => {
                    return Err(TmdbError::ServerError(status.as_u16()).into());
                }
            }
        }
    }

    /// Search one catalog (movies or series), provider relevance order
    pub async fn search(
        &self,
        category: MediaCategory,
        query: &str,
        locale: Locale,
    ) -> Result<Vec<MediaSummary>> {
        let endpoint = format!(
            "/search/{}?query={}&page=1",
            category.path_segment(),
            urlencoding::encode(query)
        );

        let response: SearchResponse = self.get(&endpoint, locale).await?;
        Ok(response.into_summaries(category))
    }

    /// Localized details for a title
    pub async fn detail(
        &self,
        category: MediaCategory,
        id: u64,
        locale: Locale,
    ) -> Result<CatalogDetail> {
        let endpoint = format!("/{}/{}", category.path_segment(), id);
        let response: DetailResponse = self.get(&endpoint, locale).await?;
        Ok(response.into_detail(category))
    }

    /// IMDB identifier for a title, if the catalog knows one
    pub async fn external_ids(&self, category: MediaCategory, id: u64) -> Result<Option<String>> {
        let endpoint = format!("/{}/{}/external_ids", category.path_segment(), id);
        let response: ExternalIds = self.get(&endpoint, Locale::English).await?;
        Ok(response.imdb_id.filter(|s| !s.is_empty()))
    }

    /// Videos attached to a title
    pub async fn videos(
        &self,
        category: MediaCategory,
        id: u64,
        locale: Locale,
    ) -> Result<Vec<CatalogVideo>> {
        let endpoint = format!("/{}/{}/videos", category.path_segment(), id);
        let response: VideosResponse = self.get(&endpoint, locale).await?;
        Ok(response
            .results
            .into_iter()
            .map(|v| CatalogVideo {
                key: v.key,
                site: v.site,
                kind: v.kind,
            })
            .collect())
    }

    /// Cast names in billing order
    pub async fn credits(&self, category: MediaCategory, id: u64) -> Result<Vec<String>> {
        let endpoint = format!("/{}/{}/credits", category.path_segment(), id);
        let response: CreditsResponse = self.get(&endpoint, Locale::Hebrew).await?;
        Ok(response.cast.into_iter().map(|c| c.name).collect())
    }

    /// Episodes of one season
    pub async fn season(&self, id: u64, season: u16, locale: Locale) -> Result<Vec<Episode>> {
        if season < 1 {
            return Err(TmdbError::InvalidSeason(season).into());
        }
        let endpoint = format!("/tv/{}/season/{}", id, season);
        let response: SeasonResponse = self.get(&endpoint, locale).await?;
        let episodes = response.episodes.ok_or_else(|| {
            TmdbError::InvalidResponse("No episodes data received from TMDB.".into())
        })?;
        Ok(episodes
            .into_iter()
            .map(|e| e.into_episode(season))
            .collect())
    }
}

// =============================================================================
// Public Payloads
// =============================================================================

/// Localized detail payload (movies and series share one shape)
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogDetail {
    pub id: u64,
    pub category: MediaCategory,
    /// `title` for movies, `name` for series; empty strings dropped
    pub title: Option<String>,
    /// `release_date` for movies, `first_air_date` for series
    pub date: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f32>,
    pub genres: Vec<String>,
    pub seasons: Vec<SeasonSummary>,
}

impl CatalogDetail {
    pub fn year(&self) -> Option<u16> {
        self.date.as_deref().and_then(extract_year)
    }
}

/// Video listed by the catalog for a title
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogVideo {
    pub key: String,
    pub site: String,
    pub kind: String,
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHitRaw>,
}

impl SearchResponse {
    fn into_summaries(self, category: MediaCategory) -> Vec<MediaSummary> {
        self.results
            .into_iter()
            .map(|r| r.into_summary(category))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchHitRaw {
    id: u64,
    // Movies use "title", TV uses "name"
    title: Option<String>,
    name: Option<String>,
    // Movies use "release_date", TV uses "first_air_date"
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
}

impl SearchHitRaw {
    fn into_summary(self, category: MediaCategory) -> MediaSummary {
        let display_title = non_empty(self.title)
            .or_else(|| non_empty(self.name))
            .unwrap_or_default();
        let year = non_empty(self.release_date)
            .or_else(|| non_empty(self.first_air_date))
            .and_then(|d| extract_year(&d));

        MediaSummary {
            external_id: self.id,
            category,
            display_title,
            year,
            poster_url: poster_url(self.poster_path.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    vote_average: Option<f32>,
    #[serde(default)]
    genres: Vec<GenreRaw>,
    #[serde(default)]
    seasons: Vec<SeasonRaw>,
}

impl DetailResponse {
    fn into_detail(self, category: MediaCategory) -> CatalogDetail {
        let (title, date) = match category {
            MediaCategory::Movie => (
                non_empty(self.title).or_else(|| non_empty(self.name)),
                non_empty(self.release_date),
            ),
            MediaCategory::Series => (
                non_empty(self.name).or_else(|| non_empty(self.title)),
                non_empty(self.first_air_date),
            ),
        };

        // Filter out specials (season 0)
        let seasons = self
            .seasons
            .into_iter()
            .filter(|s| s.season_number > 0)
            .map(|s| s.into_summary())
            .collect();

        CatalogDetail {
            id: self.id,
            category,
            title,
            date,
            overview: non_empty(self.overview),
            poster_path: non_empty(self.poster_path),
            vote_average: self.vote_average,
            genres: self.genres.into_iter().map(|g| g.name).collect(),
            seasons,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenreRaw {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SeasonRaw {
    season_number: u16,
    #[serde(default)]
    episode_count: u16,
    name: Option<String>,
    air_date: Option<String>,
}

impl SeasonRaw {
    fn into_summary(self) -> SeasonSummary {
        SeasonSummary {
            season_number: self.season_number,
            episode_count: self.episode_count,
            name: self.name,
            air_date: self.air_date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    results: Vec<VideoRaw>,
}

#[derive(Debug, Deserialize)]
struct VideoRaw {
    key: String,
    site: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    cast: Vec<CastRaw>,
}

#[derive(Debug, Deserialize)]
struct CastRaw {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SeasonResponse {
    episodes: Option<Vec<EpisodeRaw>>,
}

#[derive(Debug, Deserialize)]
struct EpisodeRaw {
    episode_number: u16,
    #[serde(default)]
    name: String,
    overview: Option<String>,
}

impl EpisodeRaw {
    fn into_episode(self, season: u16) -> Episode {
        Episode {
            season,
            episode: self.episode_number,
            name: self.name,
            overview: self.overview.unwrap_or_default(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
