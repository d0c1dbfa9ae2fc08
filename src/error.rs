//! Error taxonomy for the resolution pipeline
//!
//! Gateway clients report rich `anyhow` errors; the core converts them into
//! one of these kinds at its boundary. Empty results are never errors.

use thiserror::Error;

/// Errors surfaced by the resolvers and engines
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Rejected before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Gateway network failure or non-success status
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    /// Stream locator answered with an explicit error message
    #[error("{0}")]
    StreamUnavailable(String),

    /// A newer session or query replaced the one this result belonged to
    #[error("Request superseded by a newer session")]
    Superseded,

    /// Library store failure
    #[error(transparent)]
    Store(#[from] crate::library::StoreError),
}

impl PipelineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PipelineError::InvalidInput(msg.into())
    }

    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        PipelineError::UpstreamUnavailable {
            service,
            message: err.to_string(),
        }
    }

    /// Localized message for the presentation layer
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidInput(_) => "יש להזין לפחות 3 תווים.".to_string(),
            PipelineError::UpstreamUnavailable { .. } => {
                "השירות אינו זמין כרגע, נסו שוב מאוחר יותר.".to_string()
            }
            PipelineError::StreamUnavailable(msg) => msg.clone(),
            PipelineError::Superseded => String::new(),
            PipelineError::Store(_) => "שגיאה בשמירת הנתונים.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Minimum trimmed query length accepted by both search modes
pub const MIN_QUERY_LEN: usize = 3;

/// Reject queries shorter than three characters after trimming
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_LEN {
        return Err(PipelineError::invalid(format!(
            "query must be at least {} characters",
            MIN_QUERY_LEN
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        assert!(validate_query("").is_err());
        assert!(validate_query("ab").is_err());
        assert!(validate_query("  ab  ").is_err());
        assert_eq!(validate_query(" abc ").unwrap(), "abc");
        assert!(validate_query("שלו").is_ok());
    }

    #[test]
    fn test_upstream_display() {
        let err = PipelineError::upstream("tmdb", "Server error: 503");
        assert_eq!(err.to_string(), "tmdb unavailable: Server error: 503");
    }
}
