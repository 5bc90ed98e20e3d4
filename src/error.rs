//! Failure taxonomy for stream resolution.
//!
//! Every error carries a machine-readable code (stable, snake_case) next to
//! its human-readable message so callers can distinguish "your request was
//! invalid" from "the upstream could not be resolved right now" from "this
//! server is misconfigured" without string matching.

use thiserror::Error;

/// Errors produced by the resolution core.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// The provider does not support this request kind (e.g. anime on a
    /// movie/TV-only embed host). Permanent; the caller must change the
    /// request.
    #[error("provider \"{provider}\" does not support {kind} requests")]
    UnsupportedCombination {
        provider: &'static str,
        kind: &'static str,
    },

    /// A required field for the request kind is missing or empty. Permanent.
    #[error("missing required field \"{field}\" for {kind} request")]
    MissingField {
        field: &'static str,
        kind: &'static str,
    },

    /// A field value failed validation (e.g. an unknown audio track name).
    #[error("invalid value for \"{field}\": {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// No Chrome/Chromium executable could be located. Environment problem,
    /// not retried automatically.
    #[error(
        "no Chrome executable found; set STREAMSCOUT_CHROME, CHROME_EXECUTABLE \
         or CHROME_PATH to a valid Chrome/Chromium binary ({0})"
    )]
    BrowserUnavailable(String),

    /// The browser failed to launch or a CDP command failed.
    #[error("browser error: {0}")]
    Browser(String),

    /// Navigation to an upstream page exceeded its timeout. Transient.
    #[error("timed out navigating to {url}")]
    NavigationTimeout { url: String },

    /// Navigation to an upstream page failed outright. Transient.
    #[error("navigation to {url} failed: {reason}")]
    NavigationError { url: String, reason: String },

    /// Every resolution stage was exhausted without finding a stream. This
    /// is a normal "no result" business outcome, not a bug.
    #[error("no playable stream detected via network interception or player state")]
    StreamNotFound,

    /// The requested provider id is not registered.
    #[error("unknown provider \"{0}\"")]
    UnknownProvider(String),
}

impl ScoutError {
    /// Stable machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ScoutError::UnsupportedCombination { .. } => "unsupported_combination",
            ScoutError::MissingField { .. } | ScoutError::InvalidField { .. } => {
                "validation_error"
            }
            ScoutError::BrowserUnavailable(_) => "browser_not_found",
            ScoutError::Browser(_) => "browser_error",
            ScoutError::NavigationTimeout { .. } => "upstream_timeout",
            ScoutError::NavigationError { .. } => "upstream_error",
            ScoutError::StreamNotFound => "stream_not_found",
            ScoutError::UnknownProvider(_) => "unknown_provider",
        }
    }

    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScoutError::NavigationTimeout { .. }
                | ScoutError::NavigationError { .. }
                | ScoutError::StreamNotFound
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ScoutError::UnsupportedCombination {
                provider: "filmex",
                kind: "anime"
            }
            .code(),
            "unsupported_combination"
        );
        assert_eq!(ScoutError::StreamNotFound.code(), "stream_not_found");
        assert_eq!(
            ScoutError::BrowserUnavailable("no candidates".into()).code(),
            "browser_not_found"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(ScoutError::NavigationTimeout {
            url: "https://vidlink.pro/movie/1".into()
        }
        .is_transient());
        assert!(!ScoutError::MissingField {
            field: "tmdbId",
            kind: "movie"
        }
        .is_transient());
    }
}
