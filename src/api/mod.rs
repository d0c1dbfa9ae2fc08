//! API clients for external services
//!
//! - TMDB: catalog metadata gateway (search, details, videos, credits, seasons)
//! - Inference: language-model gateway for smart search
//! - YouTube: trailer keyword search
//! - Rezka: adaptive stream locator

pub mod inference;
pub mod rezka;
pub mod tmdb;
pub mod youtube;

pub use inference::InferenceClient;
pub use rezka::{EpisodeRef, StreamClient, StreamLookup};
pub use tmdb::TmdbClient;
pub use youtube::YoutubeClient;
