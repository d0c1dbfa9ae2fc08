//! Catalog search and hydration
//!
//! `search` turns a direct query into at most ten summaries; `hydrate` turns
//! a catalog id into a full bilingual [`MediaRecord`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::api::TmdbClient;
use crate::error::{validate_query, PipelineError, Result};
use crate::models::{
    poster_url, round_rating, CategoryFilter, Locale, MediaCategory, MediaRecord, MediaSummary,
    NO_FOREIGN_TITLE, NO_LOCAL_TITLE, NO_OVERVIEW,
};
use crate::stream::engine::SessionCache;

/// Maximum number of summaries returned by a catalog search
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Maximum number of cast names kept on a record
pub const MAX_CAST: usize = 5;

/// Direct catalog search and hydration
#[derive(Clone)]
pub struct CatalogResolver {
    tmdb: TmdbClient,
    cache: Arc<SessionCache>,
}

impl CatalogResolver {
    pub fn new(tmdb: TmdbClient) -> Self {
        Self::with_cache(tmdb, Arc::new(SessionCache::default()))
    }

    /// Resolver whose credits lookups go through `cache`
    pub fn with_cache(tmdb: TmdbClient, cache: Arc<SessionCache>) -> Self {
        Self { tmdb, cache }
    }

    /// Search series and movies (or one of them), series first, capped at ten
    pub async fn search(&self, query: &str, filter: CategoryFilter) -> Result<Vec<MediaSummary>> {
        let query = validate_query(query)?;
        let locale = Locale::detect(query);

        debug!(query, ?filter, language = locale.code(), "catalog search");

        let lookups = filter
            .categories()
            .iter()
            .map(|&category| self.tmdb.search(category, query, locale));

        let mut combined = Vec::new();
        for result in join_all(lookups).await {
            let hits = result.map_err(|e| PipelineError::upstream("tmdb", e))?;
            combined.extend(hits);
        }

        combined.truncate(MAX_SEARCH_RESULTS);
        Ok(combined)
    }

    /// Top hit for a candidate name, movies preferred over series
    pub(crate) async fn top_hit(
        &self,
        name: &str,
        filter: CategoryFilter,
    ) -> Result<Option<MediaSummary>> {
        let locale = Locale::detect(name);
        let categories = match filter {
            CategoryFilter::Any => vec![MediaCategory::Movie, MediaCategory::Series],
            other => other.categories().to_vec(),
        };

        let lookups = categories
            .iter()
            .map(|&category| self.tmdb.search(category, name, locale));

        let mut first_error = None;
        for result in join_all(lookups).await {
            match result {
                Ok(hits) => {
                    if let Some(hit) = hits.into_iter().next() {
                        return Ok(Some(hit));
                    }
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(PipelineError::upstream("tmdb", e)),
            None => Ok(None),
        }
    }

    /// Fetch Hebrew and English details, external ids and credits
    ///
    /// The first three calls must succeed. Credits are optional and fall back
    /// to `None` without failing the record.
    pub async fn hydrate(&self, external_id: u64, category: MediaCategory) -> Result<MediaRecord> {
        debug!(external_id, %category, "hydrating");

        let (core, cast) = tokio::join!(
            async {
                tokio::try_join!(
                    self.tmdb.detail(category, external_id, Locale::Hebrew),
                    self.tmdb.detail(category, external_id, Locale::English),
                    self.tmdb.external_ids(category, external_id),
                )
            },
            self.cast(external_id, category),
        );

        let (hebrew, english, imdb_id) = core.map_err(|e| PipelineError::upstream("tmdb", e))?;

        Ok(MediaRecord {
            external_id,
            category,
            year: hebrew.year(),
            title_local: hebrew.title.unwrap_or_else(|| NO_LOCAL_TITLE.to_string()),
            title_foreign: english.title.unwrap_or_else(|| NO_FOREIGN_TITLE.to_string()),
            poster_url: poster_url(hebrew.poster_path.as_deref()),
            overview: hebrew.overview.unwrap_or_else(|| NO_OVERVIEW.to_string()),
            vote_average: hebrew.vote_average.map(round_rating),
            genres: hebrew.genres,
            imdb_id,
            cast,
        })
    }

    /// First cast names, served from the session cache when present
    async fn cast(&self, external_id: u64, category: MediaCategory) -> Option<Vec<String>> {
        if let Some(hit) = self.cache.credits(external_id, category).await {
            return Some(hit);
        }
        match self.tmdb.credits(category, external_id).await {
            Ok(names) => {
                let names: Vec<String> = names.into_iter().take(MAX_CAST).collect();
                self.cache
                    .store_credits(external_id, category, names.clone())
                    .await;
                Some(names)
            }
            Err(e) => {
                warn!(external_id, error = %e, "credits unavailable, continuing without cast");
                None
            }
        }
    }
}

// =============================================================================
// Live Search (debounce + last-query-wins)
// =============================================================================

/// Debounce window applied to searches triggered by typing
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Catalog search driven by live typing
///
/// Each `submit` waits out the debounce window and only runs if no newer
/// query arrived meanwhile; results that land after a newer submit are
/// discarded.
#[derive(Clone)]
pub struct LiveSearch {
    resolver: CatalogResolver,
    debounce: Duration,
    generation: Arc<AtomicU64>,
}

impl LiveSearch {
    pub fn new(resolver: CatalogResolver) -> Self {
        Self::with_debounce(resolver, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(resolver: CatalogResolver, debounce: Duration) -> Self {
        Self {
            resolver,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `Ok(None)` when a newer query superseded this one
    pub async fn submit(
        &self,
        query: &str,
        filter: CategoryFilter,
    ) -> Result<Option<Vec<MediaSummary>>> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Short queries clear results immediately without a request
        if validate_query(query).is_err() {
            return Ok(Some(Vec::new()));
        }

        tokio::time::sleep(self.debounce).await;
        if !self.is_current(ticket) {
            debug!(query, "search debounced away");
            return Ok(None);
        }

        let results = self.resolver.search(query, filter).await;
        if !self.is_current(ticket) {
            debug!(query, "discarding stale search results");
            return Ok(None);
        }
        results.map(Some)
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }
}
