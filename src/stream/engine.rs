//! Stream resolution engine
//!
//! Drives one playback session per opened title:
//!
//! ```text
//! Idle → LocatingTrailer → LocatingStream → StreamReady → Playing
//!   └──────────────┴──────────────┴─────────────┴──────────→ Error
//! ```
//!
//! Movies look up trailer and streams concurrently. Series first load their
//! season list; choosing a season loads its episodes, choosing an episode
//! loads its streams. Season, episode, stream and credits lookups are cached
//! for the life of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::rezka::StreamLocatorError;
use crate::api::{EpisodeRef, StreamClient, StreamLookup, TmdbClient};
use crate::error::{PipelineError, Result};
use crate::models::{Episode, Locale, MediaCategory, MediaRecord, SeasonSummary, StreamMap};
use crate::stream::trailer::TrailerLocator;

/// Generic message when the stream service fails without one of its own
const STREAM_FAILED: &str = "שגיאה בטעינת הזרם.";

// =============================================================================
// Session State
// =============================================================================

/// Playback session state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    /// Nothing requested yet (or a series waiting for an episode)
    #[default]
    Idle,
    LocatingTrailer,
    LocatingStream,
    /// A stream map is available and a resolution is attached
    StreamReady,
    Playing,
    /// Provider message, shown as a retryable notice
    Error(String),
}

impl PlaybackState {
    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackState::Error(_))
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::LocatingTrailer => write!(f, "locating trailer"),
            PlaybackState::LocatingStream => write!(f, "locating stream"),
            PlaybackState::StreamReady => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Adaptive-stream attachment for one resolution
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveStream {
    pub resolution: String,
    pub url: String,
    /// Position playback resumes from when attached
    pub start_position: Duration,
}

/// Video sink the adaptive stream is attached to
///
/// At most one adaptive stream is attached at a time; the previous one is
/// released before a new one is created.
#[derive(Debug, Default)]
pub struct Player {
    stream: Option<AdaptiveStream>,
    position: Duration,
    releases: u32,
}

impl Player {
    pub fn stream(&self) -> Option<&AdaptiveStream> {
        self.stream.as_ref()
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    /// Number of adaptive streams torn down so far
    pub fn releases(&self) -> u32 {
        self.releases
    }

    fn release(&mut self) {
        if let Some(old) = self.stream.take() {
            debug!(resolution = %old.resolution, "releasing adaptive stream");
            self.releases += 1;
        }
    }

    fn attach(&mut self, resolution: &str, url: &str, reuse_element: bool) {
        self.release();
        if !reuse_element {
            self.position = Duration::ZERO;
        }
        self.stream = Some(AdaptiveStream {
            resolution: resolution.to_string(),
            url: url.to_string(),
            start_position: self.position,
        });
    }

    fn reset(&mut self) {
        self.release();
        self.position = Duration::ZERO;
    }
}

/// One playback session for a movie or a series
#[derive(Debug)]
pub struct PlaybackSession {
    id: u64,
    record: MediaRecord,
    state: PlaybackState,
    trailer: Option<String>,
    seasons: Vec<SeasonSummary>,
    season: Option<u16>,
    episodes: Vec<Episode>,
    episode: Option<u16>,
    streams: Option<StreamMap>,
    notice: Option<String>,
    player: Player,
}

impl PlaybackSession {
    fn new(id: u64, record: MediaRecord) -> Self {
        Self {
            id,
            record,
            state: PlaybackState::Idle,
            trailer: None,
            seasons: Vec::new(),
            season: None,
            episodes: Vec::new(),
            episode: None,
            streams: None,
            notice: None,
            player: Player::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn record(&self) -> &MediaRecord {
        &self.record
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn trailer(&self) -> Option<&str> {
        self.trailer.as_deref()
    }

    pub fn seasons(&self) -> &[SeasonSummary] {
        &self.seasons
    }

    pub fn selected_season(&self) -> Option<u16> {
        self.season
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn selected_episode(&self) -> Option<u16> {
        self.episode
    }

    /// Synopsis of the selected episode
    pub fn episode_overview(&self) -> Option<&str> {
        let number = self.episode?;
        self.episodes
            .iter()
            .find(|e| e.episode == number)
            .map(|e| e.overview.as_str())
    }

    pub fn streams(&self) -> Option<&StreamMap> {
        self.streams.as_ref()
    }

    /// Non-fatal notice (provider warning or last failure)
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn selected_resolution(&self) -> Option<&str> {
        self.player.stream().map(|s| s.resolution.as_str())
    }

    /// Switch resolution, tearing down the current adaptive stream
    ///
    /// With `reuse_element` the playback position carries over; otherwise
    /// playback restarts at zero.
    pub fn select_resolution(&mut self, resolution: &str, reuse_element: bool) -> Result<()> {
        let streams = self
            .streams
            .as_ref()
            .ok_or_else(|| PipelineError::invalid("no streams loaded"))?;
        let url = streams
            .get(resolution)
            .ok_or_else(|| PipelineError::invalid(format!("unknown resolution {}", resolution)))?
            .to_string();

        info!(session = self.id, resolution, "switching resolution");
        self.player.attach(resolution, &url, reuse_element);
        if self.state != PlaybackState::Playing {
            self.state = PlaybackState::StreamReady;
        }
        Ok(())
    }

    /// Start playback of the attached stream
    pub fn play(&mut self) -> Result<()> {
        if self.player.stream().is_none() {
            return Err(PipelineError::invalid("no stream attached"));
        }
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Record the position reported by the video sink
    pub fn update_position(&mut self, position: Duration) {
        self.player.position = position;
    }

    /// Clear the season and everything that depends on it
    fn clear_season(&mut self) {
        self.season = None;
        self.episodes.clear();
        self.clear_episode();
    }

    fn clear_episode(&mut self) {
        self.episode = None;
        self.streams = None;
        self.notice = None;
        self.player.reset();
        self.state = PlaybackState::Idle;
    }

    fn apply_lookup(&mut self, lookup: StreamLookup) {
        self.notice = lookup.warning;
        let default = lookup.streams.default_resolution().map(str::to_string);
        self.streams = Some(lookup.streams);
        match default {
            Some(resolution) => {
                // default_resolution always names an existing entry
                if let Err(e) = self.select_resolution(&resolution, false) {
                    self.fail(e.to_string());
                }
            }
            None => self.fail(STREAM_FAILED.to_string()),
        }
    }

    fn fail(&mut self, message: String) {
        self.notice = Some(message.clone());
        self.state = PlaybackState::Error(message);
    }
}

// =============================================================================
// Session Cache
// =============================================================================

/// Process-wide lookup cache
///
/// Seasons, episodes and streams are filled by the engine; credits by
/// hydration when a resolver shares the engine's handle.
#[derive(Debug, Default)]
pub struct SessionCache {
    seasons: RwLock<HashMap<u64, Vec<SeasonSummary>>>,
    episodes: RwLock<HashMap<(u64, u16), Vec<Episode>>>,
    streams: RwLock<HashMap<(u64, u16, u16), StreamLookup>>,
    credits: RwLock<HashMap<(u64, MediaCategory), Vec<String>>>,
}

impl SessionCache {
    pub async fn seasons(&self, id: u64) -> Option<Vec<SeasonSummary>> {
        self.seasons.read().await.get(&id).cloned()
    }

    pub async fn episodes(&self, id: u64, season: u16) -> Option<Vec<Episode>> {
        self.episodes.read().await.get(&(id, season)).cloned()
    }

    pub async fn credits(&self, id: u64, category: MediaCategory) -> Option<Vec<String>> {
        self.credits.read().await.get(&(id, category)).cloned()
    }

    pub(crate) async fn store_credits(&self, id: u64, category: MediaCategory, names: Vec<String>) {
        self.credits.write().await.insert((id, category), names);
    }

    async fn stream(&self, id: u64, ep: EpisodeRef) -> Option<StreamLookup> {
        self.streams
            .read()
            .await
            .get(&(id, ep.season, ep.episode))
            .cloned()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Orchestrates trailer, season, episode and stream lookups
#[derive(Clone)]
pub struct StreamEngine {
    tmdb: TmdbClient,
    streams: StreamClient,
    trailers: TrailerLocator,
    cache: Arc<SessionCache>,
    active: Arc<AtomicU64>,
}

impl StreamEngine {
    pub fn new(tmdb: TmdbClient, streams: StreamClient, trailers: TrailerLocator) -> Self {
        Self {
            tmdb,
            streams,
            trailers,
            cache: Arc::new(SessionCache::default()),
            active: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Handle for resolvers that should share this engine's cache
    pub fn shared_cache(&self) -> Arc<SessionCache> {
        Arc::clone(&self.cache)
    }

    /// Whether `session` is still the active one
    pub fn is_current(&self, session: &PlaybackSession) -> bool {
        self.active.load(Ordering::SeqCst) == session.id
    }

    /// Open a session for a record; any previous session is invalidated
    pub async fn open(&self, record: MediaRecord) -> Result<PlaybackSession> {
        match record.category {
            MediaCategory::Movie => self.open_movie(record).await,
            MediaCategory::Series => self.open_series(record).await,
        }
    }

    fn begin(&self, record: MediaRecord) -> PlaybackSession {
        let id = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        info!(session = id, id = record.external_id, category = %record.category, "opening session");
        PlaybackSession::new(id, record)
    }

    fn ensure_current(&self, session: &PlaybackSession) -> Result<()> {
        if self.is_current(session) {
            Ok(())
        } else {
            debug!(session = session.id, "dropping result for superseded session");
            Err(PipelineError::Superseded)
        }
    }

    async fn open_movie(&self, record: MediaRecord) -> Result<PlaybackSession> {
        let mut session = self.begin(record);
        session.state = PlaybackState::LocatingTrailer;

        let query = session.record.stream_query();
        let record = &session.record;
        let (trailer, lookup) = tokio::join!(
            self.trailers.locate(
                record.external_id,
                &record.title_local,
                record.year,
                record.category
            ),
            async {
                debug!(%query, "locating stream");
                self.streams.fetch_stream(&query, None).await
            },
        );

        self.ensure_current(&session)?;
        session.trailer = trailer;
        session.state = PlaybackState::LocatingStream;
        match lookup {
            Ok(lookup) => session.apply_lookup(lookup),
            Err(e) => session.fail(stream_failure_message(&e)),
        }
        Ok(session)
    }

    async fn open_series(&self, record: MediaRecord) -> Result<PlaybackSession> {
        let mut session = self.begin(record);
        session.state = PlaybackState::LocatingTrailer;

        let record = &session.record;
        let (trailer, seasons) = tokio::join!(
            self.trailers.locate(
                record.external_id,
                &record.title_local,
                record.year,
                record.category
            ),
            self.seasons(record.external_id),
        );

        self.ensure_current(&session)?;
        session.trailer = trailer;
        session.state = PlaybackState::Idle;
        match seasons {
            Ok(seasons) => session.seasons = seasons,
            Err(e) => session.fail(e.user_message()),
        }
        Ok(session)
    }

    /// Change the selected season (`None` clears it)
    ///
    /// Episode selection and any shown streams are cleared before the new
    /// episode list is requested.
    pub async fn select_season(&self, session: &mut PlaybackSession, season: Option<u16>) -> Result<()> {
        self.ensure_current(session)?;
        session.clear_season();

        let Some(season) = season else {
            return Ok(());
        };
        session.season = Some(season);

        let episodes = self.episodes(session.record.external_id, season).await;

        self.ensure_current(session)?;
        if session.season != Some(season) {
            return Err(PipelineError::Superseded);
        }
        match episodes {
            Ok(episodes) => {
                session.episodes = episodes;
                Ok(())
            }
            Err(e) => {
                session.notice = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Select an episode of the current season and locate its streams
    pub async fn select_episode(&self, session: &mut PlaybackSession, episode: u16) -> Result<()> {
        self.ensure_current(session)?;
        let season = session
            .season
            .ok_or_else(|| PipelineError::invalid("select a season first"))?;
        if !session.episodes.iter().any(|e| e.episode == episode) {
            return Err(PipelineError::invalid(format!(
                "season {} has no episode {}",
                season, episode
            )));
        }

        session.clear_episode();
        session.episode = Some(episode);
        session.state = PlaybackState::LocatingStream;

        let ep = EpisodeRef { season, episode };
        let lookup = self.episode_streams(&session.record, ep).await;

        self.ensure_current(session)?;
        if session.season != Some(season) || session.episode != Some(episode) {
            return Err(PipelineError::Superseded);
        }
        match lookup {
            Ok(lookup) => session.apply_lookup(lookup),
            Err(e) => session.fail(stream_failure_message(&e)),
        }
        Ok(())
    }

    /// Re-run the stream lookup after an error
    pub async fn retry(&self, session: &mut PlaybackSession) -> Result<()> {
        self.ensure_current(session)?;
        match (session.record.category, session.season, session.episode) {
            (MediaCategory::Series, Some(_), Some(episode)) => {
                self.select_episode(session, episode).await
            }
            (MediaCategory::Series, _, _) => Err(PipelineError::invalid("select an episode first")),
            (MediaCategory::Movie, _, _) => {
                session.player.reset();
                session.streams = None;
                session.notice = None;
                session.state = PlaybackState::LocatingStream;
                let lookup = self
                    .streams
                    .fetch_stream(&session.record.stream_query(), None)
                    .await;
                self.ensure_current(session)?;
                match lookup {
                    Ok(lookup) => session.apply_lookup(lookup),
                    Err(e) => session.fail(stream_failure_message(&e)),
                }
                Ok(())
            }
        }
    }

    /// End a session and release its adaptive stream
    pub fn close(&self, session: &mut PlaybackSession) {
        session.player.reset();
        session.state = PlaybackState::Idle;
        // Invalidate in-flight work for this session
        let _ = self
            .active
            .compare_exchange(session.id, session.id + 1, Ordering::SeqCst, Ordering::SeqCst);
    }

    // -------------------------------------------------------------------------
    // Cached lookups
    // -------------------------------------------------------------------------

    /// Season list of a series (specials excluded)
    pub async fn seasons(&self, id: u64) -> Result<Vec<SeasonSummary>> {
        if let Some(hit) = self.cache.seasons(id).await {
            return Ok(hit);
        }
        let detail = self
            .tmdb
            .detail(MediaCategory::Series, id, Locale::Hebrew)
            .await
            .map_err(|e| PipelineError::upstream("tmdb", e))?;
        self.cache
            .seasons
            .write()
            .await
            .insert(id, detail.seasons.clone());
        Ok(detail.seasons)
    }

    /// Episodes of one season
    pub async fn episodes(&self, id: u64, season: u16) -> Result<Vec<Episode>> {
        if season < 1 {
            return Err(PipelineError::invalid("season numbers start at 1"));
        }
        if let Some(hit) = self.cache.episodes(id, season).await {
            return Ok(hit);
        }
        let episodes = self
            .tmdb
            .season(id, season, Locale::Hebrew)
            .await
            .map_err(|e| PipelineError::upstream("tmdb", e))?;
        self.cache
            .episodes
            .write()
            .await
            .insert((id, season), episodes.clone());
        Ok(episodes)
    }

    async fn episode_streams(
        &self,
        record: &MediaRecord,
        ep: EpisodeRef,
    ) -> anyhow::Result<StreamLookup> {
        if let Some(hit) = self.cache.stream(record.external_id, ep).await {
            return Ok(hit);
        }
        let query = record.stream_query();
        debug!(%query, season = ep.season, episode = ep.episode, "locating episode stream");
        let lookup = self.streams.fetch_stream(&query, Some(ep)).await?;
        self.cache
            .streams
            .write()
            .await
            .insert((record.external_id, ep.season, ep.episode), lookup.clone());
        Ok(lookup)
    }
}

/// Provider message when there is one, generic text otherwise
fn stream_failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<StreamLocatorError>() {
        Some(StreamLocatorError::Provider(msg)) => msg.clone(),
        _ => {
            warn!(error = %err, "stream lookup failed");
            STREAM_FAILED.to_string()
        }
    }
}
