//! Smart search: free text to hydrated records
//!
//! The inference gateway turns a description into candidate names; each
//! name is matched against the catalog and hydrated. One candidate failing
//! never affects the others.

use std::collections::HashSet;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::api::InferenceClient;
use crate::error::{validate_query, PipelineError, Result};
use crate::models::{CategoryFilter, MediaRecord};
use crate::resolve::CatalogResolver;

/// Free-text resolver backed by the inference gateway
#[derive(Clone)]
pub struct TitleResolver {
    inference: InferenceClient,
    catalog: CatalogResolver,
}

impl TitleResolver {
    pub fn new(inference: InferenceClient, catalog: CatalogResolver) -> Self {
        Self { inference, catalog }
    }

    /// Resolve a free-text query into records, in candidate order
    pub async fn resolve_from_free_text(
        &self,
        query: &str,
        filter: CategoryFilter,
    ) -> Result<Vec<MediaRecord>> {
        let query = validate_query(query)?;

        let candidates = self
            .inference
            .infer(query, filter)
            .await
            .map_err(|e| PipelineError::upstream("inference", e))?;

        info!(count = candidates.len(), "smart search candidates");

        let resolved = join_all(
            candidates
                .iter()
                .map(|name| self.resolve_candidate(name, filter)),
        )
        .await;

        let mut seen = HashSet::new();
        let records = resolved
            .into_iter()
            .flatten()
            .filter(|record| seen.insert(record.key()))
            .collect();

        Ok(records)
    }

    /// Match and hydrate one candidate; any failure drops it
    async fn resolve_candidate(&self, name: &str, filter: CategoryFilter) -> Option<MediaRecord> {
        let hit = match self.catalog.top_hit(name, filter).await {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                debug!(candidate = name, "no catalog match");
                return None;
            }
            Err(e) => {
                warn!(candidate = name, error = %e, "catalog search failed");
                return None;
            }
        };

        match self.catalog.hydrate(hit.external_id, hit.category).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(candidate = name, id = hit.external_id, error = %e, "hydration failed");
                None
            }
        }
    }
}
