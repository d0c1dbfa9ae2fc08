//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the resolution pipeline.
//! Each handler takes CLI args, the shared context and Output, returns ExitCode.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::api::{InferenceClient, StreamClient, TmdbClient, YoutubeClient};
use crate::cli::{
    validate_imdb_id, EpisodesCmd, ExitCode, InfoCmd, LibraryAction, LibraryCmd, Output,
    PlayCmd, PlayResponse, RateCmd, SearchCmd, SeasonsCmd, SmartSearchCmd, StatusCmd,
    StreamEntry, SubtitleCmd, SubtitleResponse, SubtitlesCmd, TitleCmd,
};
use crate::config::Config;
use crate::error::PipelineError;
use crate::library::{FileStore, Identity, LibraryService, StoreError};
use crate::models::{display_year, Locale, MediaCategory, MediaRecord, SubtitleCandidate};
use crate::resolve::{CatalogResolver, TitleResolver};
use crate::stream::{PlaybackSession, StreamEngine, SubtitleClient, SubtitleTrack, TrailerLocator};

// =============================================================================
// Context
// =============================================================================

/// Configuration and identity shared by every handler
pub struct Context {
    pub config: Config,
    pub identity: Identity,
}

impl Context {
    pub fn new(config: Config, user_flag: Option<&str>) -> Self {
        let identity = config
            .user_id(user_flag)
            .map(Identity::signed_in)
            .unwrap_or_else(Identity::anonymous);
        Self { config, identity }
    }

    fn tmdb(&self) -> anyhow::Result<TmdbClient> {
        let key = self.config.tmdb_api_key()?;
        Ok(match &self.config.tmdb_base_url {
            Some(base) => TmdbClient::with_base_url(key, base.clone()),
            None => TmdbClient::new(key),
        })
    }

    fn catalog(&self) -> anyhow::Result<CatalogResolver> {
        Ok(CatalogResolver::new(self.tmdb()?))
    }

    fn inference(&self) -> anyhow::Result<InferenceClient> {
        let key = self.config.openai_api_key()?;
        let mut client = match &self.config.inference_base_url {
            Some(base) => InferenceClient::with_base_url(key, base.clone()),
            None => InferenceClient::new(key),
        };
        if let Some(model) = &self.config.inference_model {
            client = client.with_model(model.clone());
        }
        Ok(client)
    }

    fn trailers(&self) -> anyhow::Result<TrailerLocator> {
        let youtube = YoutubeClient::new(self.config.youtube_api_key().unwrap_or_default());
        Ok(TrailerLocator::new(self.tmdb()?, youtube))
    }

    fn engine(&self) -> anyhow::Result<StreamEngine> {
        Ok(StreamEngine::new(
            self.tmdb()?,
            StreamClient::new(self.config.stream_base_url()),
            self.trailers()?,
        ))
    }

    fn subtitles(&self) -> SubtitleClient {
        SubtitleClient::new(
            self.config.subtitle_base_url(),
            self.config.cache_dir().join("subtitles"),
        )
    }

    fn library(&self) -> LibraryService {
        let store = Arc::new(FileStore::new(self.config.data_dir()));
        LibraryService::new(store, self.identity.clone())
    }
}

/// Map a pipeline error to its exit code
pub fn exit_code_for(err: &PipelineError) -> ExitCode {
    match err {
        PipelineError::InvalidInput(_) => ExitCode::InvalidArgs,
        PipelineError::UpstreamUnavailable { .. } => ExitCode::NetworkError,
        PipelineError::StreamUnavailable(_) => ExitCode::NoStreams,
        PipelineError::Store(StoreError::NotSignedIn) => ExitCode::NotSignedIn,
        PipelineError::Superseded | PipelineError::Store(_) => ExitCode::Error,
    }
}

fn fail(output: &Output, err: PipelineError) -> ExitCode {
    let code = exit_code_for(&err);
    warn!(error = %err, "command failed");
    let message = match &err {
        PipelineError::InvalidInput(detail) => detail.clone(),
        _ => err.user_message(),
    };
    output.error(message, code)
}

fn setup_error(output: &Output, err: anyhow::Error) -> ExitCode {
    output.error(err.to_string(), ExitCode::Error)
}

fn emit<T: Serialize>(output: &Output, data: T, human: impl FnOnce(&T) -> String) -> ExitCode {
    match output.print(data, human) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

fn lines<T: std::fmt::Display>(items: &[T], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{:>2}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Search Commands
// =============================================================================

pub async fn smart_search_cmd(cmd: SmartSearchCmd, ctx: &Context, output: &Output) -> ExitCode {
    // Gate before any network call
    if let Err(e) = ctx.identity.require() {
        return fail(output, e.into());
    }
    let (inference, catalog) = match (ctx.inference(), ctx.catalog()) {
        (Ok(i), Ok(c)) => (i, c),
        (Err(e), _) | (_, Err(e)) => return setup_error(output, e),
    };

    output.info(format!("Smart search: {}", cmd.query));

    let resolver = TitleResolver::new(inference, catalog);
    let records = match resolver
        .resolve_from_free_text(&cmd.query, cmd.media_type.into())
        .await
    {
        Ok(records) => records,
        Err(e) => return fail(output, e),
    };

    if let Err(e) = ctx.library().replace_smart_search(&records) {
        return fail(output, e);
    }

    emit(output, records, |r| lines(r, "לא נמצאו תוצאות"))
}

pub async fn search_cmd(cmd: SearchCmd, ctx: &Context, output: &Output) -> ExitCode {
    let catalog = match ctx.catalog() {
        Ok(c) => c,
        Err(e) => return setup_error(output, e),
    };

    output.info(format!("Searching for: {}", cmd.query));

    match catalog.search(&cmd.query, cmd.media_type.into()).await {
        Ok(results) => emit(output, results, |r| lines(r, "לא נמצאו תוצאות")),
        Err(e) => fail(output, e),
    }
}

pub async fn info_cmd(cmd: InfoCmd, ctx: &Context, output: &Output) -> ExitCode {
    let catalog = match ctx.catalog() {
        Ok(c) => c,
        Err(e) => return setup_error(output, e),
    };

    match catalog.hydrate(cmd.id, cmd.media_type.into()).await {
        Ok(record) => emit(output, record, describe_record),
        Err(e) => fail(output, e),
    }
}

fn describe_record(record: &MediaRecord) -> String {
    format!(
        "{}\n{}\nז'אנרים: {}\nשחקנים: {}\nIMDB: {}\n{}",
        record,
        record.poster_url,
        record.genres.join(", "),
        record.cast_display(),
        record.imdb_id.as_deref().unwrap_or(crate::models::UNKNOWN),
        record.overview
    )
}

// =============================================================================
// Trailer and Series Navigation
// =============================================================================

pub async fn trailer_cmd(cmd: TitleCmd, ctx: &Context, output: &Output) -> ExitCode {
    let (tmdb, trailers) = match (ctx.tmdb(), ctx.trailers()) {
        (Ok(t), Ok(l)) => (t, l),
        (Err(e), _) | (_, Err(e)) => return setup_error(output, e),
    };
    let category: MediaCategory = cmd.media_type.into();

    let detail = match tmdb.detail(category, cmd.id, Locale::Hebrew).await {
        Ok(d) => d,
        Err(e) => return fail(output, PipelineError::upstream("tmdb", e)),
    };
    let title = detail.title.clone().unwrap_or_default();
    let year = detail.year();

    let trailer = trailers.locate(cmd.id, &title, year, category).await;
    emit(output, json!({ "trailer": trailer.clone() }), |_| {
        trailer
            .clone()
            .unwrap_or_else(|| "לא נמצא טריילר".to_string())
    })
}

pub async fn seasons_cmd(cmd: SeasonsCmd, ctx: &Context, output: &Output) -> ExitCode {
    let engine = match ctx.engine() {
        Ok(e) => e,
        Err(e) => return setup_error(output, e),
    };
    match engine.seasons(cmd.id).await {
        Ok(seasons) => emit(output, seasons, |s| lines(s, "אין עונות")),
        Err(e) => fail(output, e),
    }
}

pub async fn episodes_cmd(cmd: EpisodesCmd, ctx: &Context, output: &Output) -> ExitCode {
    let engine = match ctx.engine() {
        Ok(e) => e,
        Err(e) => return setup_error(output, e),
    };
    match engine.episodes(cmd.id, cmd.season).await {
        Ok(episodes) => emit(output, episodes, |e| lines(e, "אין פרקים")),
        Err(e) => fail(output, e),
    }
}

// =============================================================================
// Play Command
// =============================================================================

pub async fn play_cmd(cmd: PlayCmd, ctx: &Context, output: &Output) -> ExitCode {
    let (tmdb, engine) = match (ctx.tmdb(), ctx.engine()) {
        (Ok(t), Ok(e)) => (t, e),
        (Err(e), _) | (_, Err(e)) => return setup_error(output, e),
    };
    let catalog = CatalogResolver::with_cache(tmdb, engine.shared_cache());
    let category: MediaCategory = cmd.media_type.into();

    if category == MediaCategory::Series && (cmd.season.is_none() || cmd.episode.is_none()) {
        return fail(
            output,
            PipelineError::invalid("series playback needs --season and --episode"),
        );
    }

    let record = match catalog.hydrate(cmd.id, category).await {
        Ok(r) => r,
        Err(e) => return fail(output, e),
    };
    output.info(format!("Locating streams for: {}", record.stream_query()));

    let mut session = match engine.open(record).await {
        Ok(s) => s,
        Err(e) => return fail(output, e),
    };

    if let (Some(season), Some(episode)) = (cmd.season, cmd.episode) {
        if let Err(e) = engine.select_season(&mut session, Some(season)).await {
            return fail(output, e);
        }
        if let Err(e) = engine.select_episode(&mut session, episode).await {
            return fail(output, e);
        }
    }

    if let Some(quality) = &cmd.quality {
        if session.streams().is_some() {
            if let Err(e) = session.select_resolution(quality, false) {
                return fail(output, e);
            }
        }
    }

    let playable = matches!(
        session.streams(),
        Some(streams) if !streams.is_empty() && !session.state().is_error()
    );
    let response = play_response(&session);
    engine.close(&mut session);

    if !playable {
        let message = response
            .notice
            .clone()
            .unwrap_or_else(|| "No streams found".to_string());
        return fail(output, PipelineError::StreamUnavailable(message));
    }

    emit(output, response, describe_play)
}

fn play_response(session: &PlaybackSession) -> PlayResponse {
    let record = session.record();
    let title = match (session.selected_season(), session.selected_episode()) {
        (Some(s), Some(e)) => format!("{} S{:02}E{:02}", record.title_local, s, e),
        _ => format!("{} ({})", record.title_local, display_year(record.year)),
    };

    PlayResponse {
        title,
        state: session.state().to_string(),
        trailer: session.trailer().map(str::to_string),
        streams: session
            .streams()
            .map(|streams| {
                streams
                    .iter()
                    .map(|(resolution, url)| StreamEntry {
                        resolution: resolution.to_string(),
                        url: url.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        resolution: session.selected_resolution().map(str::to_string),
        stream_url: session.player().stream().map(|s| s.url.clone()),
        notice: session.notice().map(str::to_string),
    }
}

fn describe_play(response: &PlayResponse) -> String {
    let mut out = vec![response.title.clone()];
    if let Some(trailer) = &response.trailer {
        out.push(format!("טריילר: {}", trailer));
    }
    for entry in &response.streams {
        let marker = if Some(&entry.resolution) == response.resolution.as_ref() {
            "▶"
        } else {
            " "
        };
        out.push(format!("{} {:>6}  {}", marker, entry.resolution, entry.url));
    }
    if let Some(notice) = &response.notice {
        out.push(format!("⚠ {}", notice));
    }
    out.join("\n")
}

// =============================================================================
// Subtitle Commands
// =============================================================================

pub async fn subtitles_cmd(cmd: SubtitlesCmd, ctx: &Context, output: &Output) -> ExitCode {
    if let Err(e) = validate_imdb_id(&cmd.imdb_id) {
        return output.error(e, ExitCode::InvalidArgs);
    }

    let candidates = ctx
        .subtitles()
        .list_candidates(&cmd.imdb_id, cmd.season, cmd.episode)
        .await;

    if let [only] = candidates.as_slice() {
        if only.is_error() {
            return output.error(only.label.clone(), ExitCode::NetworkError);
        }
    }

    emit(output, candidates, |c: &Vec<SubtitleCandidate>| {
        if c.is_empty() {
            return "לא נמצאו כתוביות".to_string();
        }
        c.iter()
            .map(|s| format!("{:>10}  {}", s.id, s.label))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

pub async fn subtitle_cmd(cmd: SubtitleCmd, ctx: &Context, output: &Output) -> ExitCode {
    let text = match ctx.subtitles().load(&cmd.release_id).await {
        Ok(t) => t,
        Err(e) => {
            warn!(release = %cmd.release_id, error = %e, "subtitle load failed");
            return output.error("שגיאה בטעינת כתוביות", ExitCode::NetworkError);
        }
    };

    let track = SubtitleTrack::new(text, cmd.settings(&ctx.config.subtitles));
    let rendered = track.rendered();
    let webvtt = rendered.export();

    if let Some(path) = &cmd.output {
        if let Err(e) = std::fs::write(path, &webvtt) {
            return output.error(format!("Failed to write {}: {}", path.display(), e), ExitCode::Error);
        }
        output.info(format!("Wrote {}", path.display()));
    }

    let response = SubtitleResponse {
        handle: rendered.handle.to_string(),
        style: rendered.style.css(),
        webvtt,
    };
    let written = cmd.output.is_some();
    emit(output, response, |r| {
        if written {
            r.handle.clone()
        } else {
            r.webvtt.clone()
        }
    })
}

// =============================================================================
// Library Commands
// =============================================================================

pub async fn library_cmd(cmd: LibraryCmd, ctx: &Context, output: &Output) -> ExitCode {
    let library = ctx.library();
    if let Err(e) = library.identity().require() {
        return fail(output, e.into());
    }

    match cmd.action {
        LibraryAction::List { name: None } => match library.libraries() {
            Ok(names) => emit(output, names, |n| lines(n, "אין ספריות")),
            Err(e) => fail(output, e),
        },
        LibraryAction::List { name: Some(name) } => match library.list(&name) {
            Ok(records) => emit(output, records, |r| lines(r, "הספרייה ריקה")),
            Err(e) => fail(output, e),
        },
        LibraryAction::Add {
            name,
            id,
            media_type,
        } => {
            let catalog = match ctx.catalog() {
                Ok(c) => c,
                Err(e) => return setup_error(output, e),
            };
            let record = match catalog.hydrate(id, media_type.into()).await {
                Ok(r) => r,
                Err(e) => return fail(output, e),
            };
            match library.add(&name, record) {
                Ok(added) => emit(output, json!({ "added": added }), |_| {
                    if added { "נוסף לספרייה" } else { "כבר קיים בספרייה" }.to_string()
                }),
                Err(e) => fail(output, e),
            }
        }
        LibraryAction::Remove {
            name,
            id,
            media_type,
        } => match library.remove(&name, (id, media_type.into())) {
            Ok(removed) => emit(output, json!({ "removed": removed }), |_| {
                if removed { "הוסר מהספרייה" } else { "לא נמצא בספרייה" }.to_string()
            }),
            Err(e) => fail(output, e),
        },
    }
}

pub async fn status_cmd(cmd: StatusCmd, ctx: &Context, output: &Output) -> ExitCode {
    let library = ctx.library();
    let result = if cmd.show {
        library.status_of(cmd.id)
    } else {
        library.toggle_status(cmd.id)
    };
    match result {
        Ok(status) => emit(output, json!({ "id": cmd.id, "status": status }), |_| {
            status.label().to_string()
        }),
        Err(e) => fail(output, e),
    }
}

pub async fn rate_cmd(cmd: RateCmd, ctx: &Context, output: &Output) -> ExitCode {
    let library = ctx.library();
    let result = match cmd.rating {
        Some(rating) => library.set_rating(cmd.id, rating).map(|()| rating),
        None => library.rating_of(cmd.id),
    };
    match result {
        Ok(rating) => emit(output, json!({ "id": cmd.id, "rating": rating }), |_| {
            format!("{}{}", "★".repeat(rating as usize), "☆".repeat(5usize.saturating_sub(rating as usize)))
        }),
        Err(e) => fail(output, e),
    }
}
