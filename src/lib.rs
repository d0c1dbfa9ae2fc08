//! TVHero - Hebrew movie and TV tracker
//!
//! Turns a free-text description or a catalog search into bilingual media
//! records, then resolves streams, trailers and synchronized Hebrew
//! subtitles for a movie or an episode.
//!
//! # Modules
//!
//! - `models` - Records, summaries, stream maps, statuses
//! - `api` - Gateway clients (TMDB, language model, YouTube, stream locator)
//! - `resolve` - Catalog search, hydration and free-text resolution
//! - `stream` - Playback sessions, trailers and subtitles
//! - `library` - Personal libraries, watch status and ratings
//! - `cli` / `commands` - Command line front end

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod library;
pub mod models;
pub mod resolve;
pub mod stream;

// Re-export commonly used types
pub use models::{
    CategoryFilter, Episode, Locale, MediaCategory, MediaRecord, MediaSummary, SeasonSummary,
    StreamMap, SubtitleCandidate, WatchStatus,
};

pub use api::{InferenceClient, StreamClient, TmdbClient, YoutubeClient};
pub use error::{PipelineError, Result};
pub use library::{LibraryService, LibraryStore};
pub use resolve::{CatalogResolver, LiveSearch, TitleResolver};
pub use stream::{
    PlaybackSession, PlaybackState, StreamEngine, SubtitleClient, SubtitleSettings, SubtitleTrack,
    TrailerLocator,
};
