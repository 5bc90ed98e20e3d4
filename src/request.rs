//! Logical media requests.
//!
//! A [`MediaRequest`] identifies what the caller wants to watch, independent
//! of any provider. Validation happens here, before any browser work starts,
//! so malformed requests fail fast without wasting a Chrome launch.

use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::error::{Result, ScoutError};

/// Audio track selection for anime requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTrack {
    Sub,
    Dub,
}

impl AudioTrack {
    /// Parse a caller-supplied value, case-insensitively.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sub" => Ok(AudioTrack::Sub),
            "dub" => Ok(AudioTrack::Dub),
            other => Err(ScoutError::InvalidField {
                field: "subOrDub",
                reason: format!("must be \"sub\" or \"dub\", got \"{other}\""),
            }),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioTrack::Sub => "sub",
            AudioTrack::Dub => "dub",
        }
    }
}

/// A normalized media or sports-event request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MediaRequest {
    Movie {
        tmdb_id: String,
    },
    Tv {
        tmdb_id: String,
        season: String,
        episode: String,
    },
    Anime {
        mal_id: String,
        episode: String,
        audio: AudioTrack,
    },
    SportsEvent {
        /// Opaque upstream event page URL.
        event_url: String,
    },
}

impl MediaRequest {
    /// Request kind name used in error messages and fingerprints.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            MediaRequest::Movie { .. } => "movie",
            MediaRequest::Tv { .. } => "tv",
            MediaRequest::Anime { .. } => "anime",
            MediaRequest::SportsEvent { .. } => "sports-event",
        }
    }

    /// Check that every field required for this kind is present and
    /// non-empty. Returns the first missing field.
    pub fn validate(&self) -> Result<()> {
        let missing = |field: &'static str| ScoutError::MissingField {
            field,
            kind: self.kind(),
        };

        match self {
            MediaRequest::Movie { tmdb_id } => {
                if tmdb_id.trim().is_empty() {
                    return Err(missing("tmdbId"));
                }
            }
            MediaRequest::Tv {
                tmdb_id,
                season,
                episode,
            } => {
                if tmdb_id.trim().is_empty() {
                    return Err(missing("tmdbId"));
                }
                if season.trim().is_empty() {
                    return Err(missing("season"));
                }
                if episode.trim().is_empty() {
                    return Err(missing("episode"));
                }
            }
            MediaRequest::Anime {
                mal_id, episode, ..
            } => {
                if mal_id.trim().is_empty() {
                    return Err(missing("malId"));
                }
                if episode.trim().is_empty() {
                    return Err(missing("number"));
                }
            }
            MediaRequest::SportsEvent { event_url } => {
                if event_url.trim().is_empty() {
                    return Err(missing("eventUrl"));
                }
            }
        }
        Ok(())
    }

    /// Deterministic cache fingerprint for this request under `provider`.
    ///
    /// Field values are percent-encoded before being joined with `:`, so a
    /// `:` inside a field cannot forge the separator and distinct inputs
    /// cannot collide.
    #[must_use]
    pub fn fingerprint(&self, provider: &str) -> String {
        let e = |field: &str| encode(field).into_owned();
        match self {
            MediaRequest::Movie { tmdb_id } => format!("{provider}:movie:{}", e(tmdb_id)),
            MediaRequest::Tv {
                tmdb_id,
                season,
                episode,
            } => format!(
                "{provider}:tv:{}:{}:{}",
                e(tmdb_id),
                e(season),
                e(episode)
            ),
            MediaRequest::Anime {
                mal_id,
                episode,
                audio,
            } => format!(
                "{provider}:anime:{}:{}:{}",
                e(mal_id),
                e(episode),
                audio.as_str()
            ),
            MediaRequest::SportsEvent { event_url } => {
                format!("{provider}:sports-event:{}", e(event_url))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_track_is_case_normalized() {
        assert_eq!(AudioTrack::parse("SUB").unwrap(), AudioTrack::Sub);
        assert_eq!(AudioTrack::parse("Dub").unwrap(), AudioTrack::Dub);
        assert!(AudioTrack::parse("raw").is_err());
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let req = MediaRequest::Tv {
            tmdb_id: "1399".into(),
            season: String::new(),
            episode: "1".into(),
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert!(err.to_string().contains("season"));

        let ok = MediaRequest::Movie {
            tmdb_id: "786892".into(),
        };
        ok.validate().unwrap();
    }

    #[test]
    fn fingerprints_do_not_collide_across_kinds() {
        let movie = MediaRequest::Movie {
            tmdb_id: "1:2".into(),
        };
        let tv = MediaRequest::Tv {
            tmdb_id: "1".into(),
            season: "2".into(),
            episode: "3".into(),
        };
        assert_ne!(movie.fingerprint("vidlink"), tv.fingerprint("vidlink"));
        assert_ne!(movie.fingerprint("vidlink"), movie.fingerprint("filmex"));
    }

    #[test]
    fn colon_in_a_field_cannot_forge_the_separator() {
        let a = MediaRequest::Tv {
            tmdb_id: "1:2".into(),
            season: "3".into(),
            episode: "4".into(),
        };
        let b = MediaRequest::Tv {
            tmdb_id: "1".into(),
            season: "2:3".into(),
            episode: "4".into(),
        };
        assert_ne!(a.fingerprint("vidlink"), b.fingerprint("vidlink"));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let req = MediaRequest::Anime {
            mal_id: "5114".into(),
            episode: "12".into(),
            audio: AudioTrack::Dub,
        };
        assert_eq!(req.fingerprint("vidlink"), "vidlink:anime:5114:12:dub");
    }
}
