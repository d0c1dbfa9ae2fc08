//! Playback pipeline
//!
//! - Engine: per-title playback sessions, stream maps and resolution switching
//! - Trailer: catalog then video-platform trailer lookup
//! - Subtitles: release listing, archive download and WebVTT normalization
//! - Sync: timing offset, punctuation flip and caption styling

pub mod engine;
pub mod subtitles;
pub mod sync;
pub mod trailer;

pub use engine::{PlaybackSession, PlaybackState, SessionCache, StreamEngine};
pub use subtitles::SubtitleClient;
pub use sync::{SubtitleSettings, SubtitleTrack};
pub use trailer::TrailerLocator;
