//! Data structures and types for TVHero
//!
//! Contains the shared models used across the pipeline, organized by domain:
//! - **Catalog**: categories, locales, search summaries and hydrated records
//! - **Series**: seasons and episodes used by the playback session
//! - **Streams**: resolution maps returned by the stream locator
//! - **Library**: per-user watch status
//! - **Subtitles**: candidate releases offered by the subtitle locator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Poster shown when the catalog has no artwork for a title
pub const PLACEHOLDER_POSTER: &str = "https://via.placeholder.com/300x450?text=No+Image";

/// Base URL for catalog poster paths
pub const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// Fallback for a missing Hebrew title
pub const NO_LOCAL_TITLE: &str = "אין כותרת בעברית";

/// Fallback for a missing English title
pub const NO_FOREIGN_TITLE: &str = "No English Title";

/// Fallback for a missing localized synopsis
pub const NO_OVERVIEW: &str = "תיאור לא זמין";

/// Display text for unknown years, ratings and identifiers
pub const UNKNOWN: &str = "N/A";

/// Display text when cast information could not be fetched
pub const NO_CAST_INFO: &str = "אין מידע";

/// Resolution picked by default when the provider offers it
pub const PREFERRED_RESOLUTION: &str = "480p";

// =============================================================================
// Catalog Models
// =============================================================================

/// Media category discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Movie,
    #[serde(rename = "tv")]
    Series,
}

impl MediaCategory {
    /// Path segment used by the metadata gateway ("movie" / "tv")
    pub fn path_segment(&self) -> &'static str {
        match self {
            MediaCategory::Movie => "movie",
            MediaCategory::Series => "tv",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaCategory::Movie => write!(f, "Movie"),
            MediaCategory::Series => write!(f, "TV"),
        }
    }
}

/// Category filter applied to searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    Movie,
    #[serde(rename = "tv")]
    Series,
    #[default]
    #[serde(rename = "all")]
    Any,
}

impl CategoryFilter {
    /// Categories to query, series first to match the catalog concatenation order
    pub fn categories(&self) -> &'static [MediaCategory] {
        match self {
            CategoryFilter::Movie => &[MediaCategory::Movie],
            CategoryFilter::Series => &[MediaCategory::Series],
            CategoryFilter::Any => &[MediaCategory::Series, MediaCategory::Movie],
        }
    }

    /// Wording used in the inference prompt
    pub fn prompt_noun(&self) -> &'static str {
        match self {
            CategoryFilter::Movie => "movie",
            CategoryFilter::Series => "tv",
            CategoryFilter::Any => "movies and TV series",
        }
    }
}

impl From<MediaCategory> for CategoryFilter {
    fn from(category: MediaCategory) -> Self {
        match category {
            MediaCategory::Movie => CategoryFilter::Movie,
            MediaCategory::Series => CategoryFilter::Series,
        }
    }
}

/// Catalog language used for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    Hebrew,
    English,
}

impl Locale {
    /// Locale code sent to the metadata gateway
    pub fn code(&self) -> &'static str {
        match self {
            Locale::Hebrew => "he",
            Locale::English => "en-US",
        }
    }

    /// Hebrew if the text contains any Hebrew-block character, English otherwise
    pub fn detect(text: &str) -> Self {
        if is_hebrew(text) {
            Locale::Hebrew
        } else {
            Locale::English
        }
    }
}

/// Check whether text contains characters from the Hebrew Unicode block
pub fn is_hebrew(text: &str) -> bool {
    text.chars().any(|c| ('\u{0590}'..='\u{05FF}').contains(&c))
}

/// Lightweight search result, created per query and never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub external_id: u64,
    pub category: MediaCategory,
    pub display_title: String,
    pub year: Option<u16>,
    pub poster_url: String,
}

impl fmt::Display for MediaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{}]",
            self.display_title,
            display_year(self.year),
            self.category
        )
    }
}

/// Fully hydrated bilingual record for one title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub external_id: u64,
    pub category: MediaCategory,
    pub title_local: String,
    pub title_foreign: String,
    pub year: Option<u16>,
    pub poster_url: String,
    pub overview: String,
    /// Rounded to one decimal
    pub vote_average: Option<f32>,
    pub genres: Vec<String>,
    pub imdb_id: Option<String>,
    /// At most five names; `None` when the credits lookup failed
    pub cast: Option<Vec<String>>,
}

impl MediaRecord {
    /// Library identity of a record
    pub fn key(&self) -> (u64, MediaCategory) {
        (self.external_id, self.category)
    }

    /// Query string sent to the stream locator: `title + " " + year`
    pub fn stream_query(&self) -> String {
        format!("{} {}", self.title_local, display_year(self.year))
    }

    /// Cast names joined for display, or the "no info" fallback
    pub fn cast_display(&self) -> String {
        match &self.cast {
            Some(names) if !names.is_empty() => names.join(", "),
            _ => NO_CAST_INFO.to_string(),
        }
    }
}

impl fmt::Display for MediaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year = display_year(self.year);
        let rating = self
            .vote_average
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| UNKNOWN.to_string());
        write!(
            f,
            "{} ({}) / {} ({}) [{}] - ⭐ {}",
            self.title_local, year, self.title_foreign, year, self.category, rating
        )
    }
}

/// Render an optional year the way the catalog screens do
pub fn display_year(year: Option<u16>) -> String {
    year.map(|y| y.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Build a poster URL from an optional catalog path
pub fn poster_url(path: Option<&str>) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("{}{}", POSTER_BASE_URL, p),
        _ => PLACEHOLDER_POSTER.to_string(),
    }
}

/// Extract year from a date string like "2022-03-04"
pub fn extract_year(date: &str) -> Option<u16> {
    date.get(..4).and_then(|y| y.parse().ok())
}

/// Round a rating to one decimal place
pub fn round_rating(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

// =============================================================================
// Series Models
// =============================================================================

/// Summary of a season (specials excluded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season_number: u16,
    pub episode_count: u16,
    pub name: Option<String>,
    pub air_date: Option<String>,
}

impl fmt::Display for SeasonSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("Season");
        write!(
            f,
            "{} {} ({} episodes)",
            name, self.season_number, self.episode_count
        )
    }
}

/// Episode of a season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub season: u16,
    pub episode: u16,
    pub name: String,
    pub overview: String,
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02} - {}", self.season, self.episode, self.name)
    }
}

// =============================================================================
// Stream Models
// =============================================================================

/// Resolution label to stream URL, in provider order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMap {
    entries: Vec<(String, String)>,
}

impl StreamMap {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolution labels in provider order
    pub fn resolutions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn get(&self, resolution: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(label, _)| label == resolution)
            .map(|(_, url)| url.as_str())
    }

    pub fn contains(&self, resolution: &str) -> bool {
        self.get(resolution).is_some()
    }

    /// "480p" when present, otherwise the first provider entry
    pub fn default_resolution(&self) -> Option<&str> {
        if self.contains(PREFERRED_RESOLUTION) {
            return Some(PREFERRED_RESOLUTION);
        }
        self.entries.first().map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, u)| (l.as_str(), u.as_str()))
    }
}

impl fmt::Display for StreamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.resolutions().collect();
        write!(f, "[{}]", labels.join(", "))
    }
}

// =============================================================================
// Library Models
// =============================================================================

/// Per-user, per-title watch tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatchStatus {
    #[default]
    None,
    Watched,
    ToWatch,
}

impl WatchStatus {
    /// none → watched → to-watch → none
    pub fn next(self) -> Self {
        match self {
            WatchStatus::None => WatchStatus::Watched,
            WatchStatus::Watched => WatchStatus::ToWatch,
            WatchStatus::ToWatch => WatchStatus::None,
        }
    }

    /// Button label shown next to the title
    pub fn label(&self) -> &'static str {
        match self {
            WatchStatus::None => "לסימון",
            WatchStatus::Watched => "נצפה",
            WatchStatus::ToWatch => "לצפייה",
        }
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchStatus::None => write!(f, "none"),
            WatchStatus::Watched => write!(f, "watched"),
            WatchStatus::ToWatch => write!(f, "to-watch"),
        }
    }
}

// =============================================================================
// Subtitle Models
// =============================================================================

/// Subtitle release offered for a title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCandidate {
    pub id: String,
    pub label: String,
}

impl SubtitleCandidate {
    /// Identifier of the sentinel entry returned when listing fails
    pub const ERROR_ID: &'static str = "error";

    pub fn error_sentinel() -> Self {
        Self {
            id: Self::ERROR_ID.to_string(),
            label: "שגיאה בטעינת כתוביות".to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.id == Self::ERROR_ID
    }
}

impl fmt::Display for SubtitleCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

// =============================================================================
// Tests
// =============================================================================
