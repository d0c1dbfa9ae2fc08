//! Trailer lookup
//!
//! Catalog videos first (Hebrew locale, type "Trailer" hosted on YouTube),
//! then a keyword search on the video platform. Every failure ends in
//! `None`; a missing trailer never blocks playback.

use tracing::{debug, info, warn};

use crate::api::youtube::embed_url;
use crate::api::{TmdbClient, YoutubeClient};
use crate::models::{display_year, Locale, MediaCategory};

const TRAILER_TYPE: &str = "Trailer";
const TRAILER_SITE: &str = "YouTube";

/// Trailer locator combining the catalog and the video platform
#[derive(Clone)]
pub struct TrailerLocator {
    tmdb: TmdbClient,
    youtube: YoutubeClient,
}

impl TrailerLocator {
    pub fn new(tmdb: TmdbClient, youtube: YoutubeClient) -> Self {
        Self { tmdb, youtube }
    }

    /// Embeddable trailer URL, or `None` when nothing was found
    pub async fn locate(
        &self,
        external_id: u64,
        title_local: &str,
        year: Option<u16>,
        category: MediaCategory,
    ) -> Option<String> {
        match self.tmdb.videos(category, external_id, Locale::Hebrew).await {
            Ok(videos) => {
                let trailer = videos
                    .into_iter()
                    .find(|v| v.kind == TRAILER_TYPE && v.site == TRAILER_SITE);
                if let Some(video) = trailer {
                    let url = embed_url(&video.key);
                    info!(external_id, %url, "trailer found in catalog");
                    return Some(url);
                }
                debug!(external_id, "no catalog trailer, searching video platform");
            }
            Err(e) => {
                warn!(external_id, error = %e, "catalog videos failed, searching video platform");
            }
        }

        let query = trailer_query(title_local, year);
        match self.youtube.search(&query).await {
            Ok(Some(video_id)) => Some(embed_url(&video_id)),
            Ok(None) => {
                debug!(%query, "no trailer on video platform");
                None
            }
            Err(e) => {
                warn!(%query, error = %e, "video platform search failed");
                None
            }
        }
    }
}

/// Keyword query: `title + " " + year + " trailer"`
pub fn trailer_query(title: &str, year: Option<u16>) -> String {
    format!("{} {} trailer", title, display_year(year))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailer_query() {
        assert_eq!(trailer_query("מטריקס", Some(1999)), "מטריקס 1999 trailer");
        assert_eq!(trailer_query("Dune", None), "Dune N/A trailer");
    }
}
