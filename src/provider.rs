//! Upstream providers.
//!
//! A provider maps a [`MediaRequest`] to the concrete third-party page the
//! browser session must visit, plus the HTTP identity (referer/origin) that
//! page expects. Providers are immutable, registered once and looked up by
//! id. Unsupported (provider, kind) pairs are rejected here, before any
//! browser process is launched.
//!
//! Sports providers additionally carry a [`SportsProfile`]: the DOM selector
//! heuristics and redirect-host lists their listing pages need, kept as
//! plain data so each rule can be tested in isolation.

use urlencoding::encode;

use crate::error::{Result, ScoutError};
use crate::request::MediaRequest;

/// HTTP identity a browser session presents to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpContext {
    pub referer: String,
    pub origin: String,
}

impl HttpContext {
    /// Context for probing a candidate page discovered on `parent_url`:
    /// referer is the parent page, origin its scheme://host.
    #[must_use]
    pub fn for_probe(parent_url: &str) -> Self {
        let origin = url::Url::parse(parent_url)
            .ok()
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|| parent_url.to_string());
        HttpContext {
            referer: parent_url.to_string(),
            origin,
        }
    }
}

/// Selector heuristics for a sports listing site.
///
/// Ordered: earlier selectors are more specific; the final fallback (keyword
/// matching over all links) lives in the scrape module and applies when the
/// whole chain yields nothing.
#[derive(Debug)]
pub struct SportsProfile {
    /// Listing home page.
    pub home_url: &'static str,
    /// Host substring a harvested link must contain to count as on-site.
    pub host: &'static str,
    /// Selector chain for category links on the home page.
    pub category_selectors: &'static [&'static str],
    /// Keyword filter applied to category name/slug. Empty accepts all.
    pub category_keywords: &'static [&'static str],
    /// Selector chain for event/match entries on a category page.
    pub event_selectors: &'static [&'static str],
    /// Selector chain for per-event stream link buttons.
    pub event_link_selectors: &'static [&'static str],
    /// URL substrings marking an anchor as a redirect/player-page link.
    pub redirect_link_markers: &'static [&'static str],
    /// Extra URL substrings that make an iframe worth deep-probing on this
    /// provider (on top of the generic player heuristics).
    pub probe_url_markers: &'static [&'static str],
    /// Whether sessions against this site also drop uncategorized requests
    /// at the network layer.
    pub block_other_resources: bool,
}

impl SportsProfile {
    /// Resource-blocking policy for sessions against this site.
    #[must_use]
    pub fn block_policy(&self) -> crate::browser::BlockPolicy {
        if self.block_other_resources {
            crate::browser::BlockPolicy::Aggressive
        } else {
            crate::browser::BlockPolicy::Cosmetic
        }
    }
}

static CRICWATCH: SportsProfile = SportsProfile {
    home_url: "https://cricwatch.io",
    host: "cricwatch.io",
    category_selectors: &[
        "a[href*=\"world-cup-streams\"]",
        "a[href*=\"the-ashes-streams\"]",
        "a[href*=\"test-streams\"]",
        "a[href*=\"odi-streams\"]",
        "a[href*=\"t20-streams\"]",
    ],
    category_keywords: &[],
    event_selectors: &[
        ".match-item",
        ".game-item",
        ".video-item",
        "a[href*=\"/watch/\"]",
        "a[href*=\"/play/\"]",
        "a[href*=\"/live/\"]",
        "a[href*=\"/stream/\"]",
        "[class*=\"match\"] a",
        "[class*=\"game\"] a",
        "[class*=\"video\"] a",
        "a[href*=\"vs\"]",
        "a[href*=\"v-\"]",
    ],
    event_link_selectors: &[
        "a[href*=\"/link/\"]",
        "a[href*=\"/stream/\"]",
        ".link-btn",
        "[class*=\"link\"] a",
    ],
    redirect_link_markers: &[],
    probe_url_markers: &["partytown"],
    block_other_resources: true,
};

static TOTALSPORTEK: SportsProfile = SportsProfile {
    home_url: "https://totalsportek.es",
    host: "totalsportek.es",
    category_selectors: &[
        "nav a[href*=\"/\"]",
        ".menu a[href*=\"/\"]",
        ".navbar a[href*=\"/\"]",
        ".navigation a[href*=\"/\"]",
        "a[href*=\"football\"]",
        "a[href*=\"basketball\"]",
        "a[href*=\"nba\"]",
        "a[href*=\"cricket\"]",
        "a[href*=\"tennis\"]",
        "a[href*=\"boxing\"]",
        "a[href*=\"mma\"]",
        "a[href*=\"ufc\"]",
        ".sport-category a",
        ".category-item a",
        "[class*=\"sport\"] a",
        "[class*=\"category\"] a",
    ],
    category_keywords: &[
        "football",
        "basketball",
        "nba",
        "cricket",
        "tennis",
        "boxing",
        "mma",
        "ufc",
        "soccer",
        "baseball",
        "hockey",
        "golf",
        "racing",
        "motorsport",
    ],
    event_selectors: &[
        ".event-item",
        ".match-item",
        ".game-item",
        ".video-item",
        "a[href*=\"/watch/\"]",
        "a[href*=\"/play/\"]",
        "a[href*=\"/live/\"]",
        "a[href*=\"/stream/\"]",
        "[class*=\"event\"] a",
        "[class*=\"match\"] a",
        "[class*=\"game\"] a",
        "[class*=\"video\"] a",
        "a[href*=\"vs\"]",
        "a[href*=\"v-\"]",
        ".stream-link",
        ".watch-link",
        ".live-link",
    ],
    event_link_selectors: &[
        "a[href*=\"/link/\"]",
        "a[href*=\"/stream/\"]",
        ".link-btn",
        "[class*=\"link\"] a",
        ".stream-option",
        ".watch-option",
    ],
    redirect_link_markers: &[
        "hitlinks.online",
        "yeahstreams.com",
        "totwatch.php",
        "totview.php",
    ],
    probe_url_markers: &["yeahstreams", "hitlinks.online", "wigistream", "stream-"],
    block_other_resources: false,
};

#[derive(Debug, Clone, Copy)]
enum Flavor {
    /// vidlink.pro embed pages (movie/tv/anime).
    VidLink,
    /// filmex embed pages (movie/tv only).
    Filmex,
    /// Sports listing site; the upstream URL is the caller-supplied event
    /// page.
    Sports(&'static SportsProfile),
}

/// An immutable upstream provider.
#[derive(Debug, Clone, Copy)]
pub struct Provider {
    pub id: &'static str,
    base: &'static str,
    flavor: Flavor,
}

impl Provider {
    /// HTTP identity for sessions opened against this provider's pages.
    #[must_use]
    pub fn http_context(&self) -> HttpContext {
        HttpContext {
            referer: format!("{}/", self.base),
            origin: self.base.to_string(),
        }
    }

    /// Sports selector profile, if this is a sports provider.
    #[must_use]
    pub fn sports_profile(&self) -> Option<&'static SportsProfile> {
        match self.flavor {
            Flavor::Sports(profile) => Some(profile),
            _ => None,
        }
    }

    /// Build the upstream page URL for `request`.
    ///
    /// Pure and deterministic. Fails with `UnsupportedCombination` when this
    /// provider cannot serve the request kind, and with `MissingField` when
    /// the request is incomplete — both before any network or browser work.
    pub fn build_upstream_url(&self, request: &MediaRequest) -> Result<String> {
        request.validate()?;

        let unsupported = || ScoutError::UnsupportedCombination {
            provider: self.id,
            kind: request.kind(),
        };

        match (self.flavor, request) {
            (Flavor::VidLink, MediaRequest::Movie { tmdb_id }) => {
                Ok(format!("{}/movie/{}?player=jw", self.base, encode(tmdb_id)))
            }
            (
                Flavor::VidLink,
                MediaRequest::Tv {
                    tmdb_id,
                    season,
                    episode,
                },
            ) => Ok(format!(
                "{}/tv/{}/{}/{}?player=jw",
                self.base,
                encode(tmdb_id),
                encode(season),
                encode(episode)
            )),
            (
                Flavor::VidLink,
                MediaRequest::Anime {
                    mal_id,
                    episode,
                    audio,
                },
            ) => Ok(format!(
                "{}/anime/{}/{}/{}?player=jw",
                self.base,
                encode(mal_id),
                encode(episode),
                audio.as_str()
            )),
            (Flavor::Filmex, MediaRequest::Movie { tmdb_id }) => {
                Ok(format!("{}/embed/movie/{}", self.base, encode(tmdb_id)))
            }
            (
                Flavor::Filmex,
                MediaRequest::Tv {
                    tmdb_id,
                    season,
                    episode,
                },
            ) => Ok(format!(
                "{}/embed/tv/{}/{}/{}",
                self.base,
                encode(tmdb_id),
                encode(season),
                encode(episode)
            )),
            (Flavor::Sports(_), MediaRequest::SportsEvent { event_url }) => {
                Ok(event_url.clone())
            }
            _ => Err(unsupported()),
        }
    }
}

/// Registered providers, looked up by case-insensitive id.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    /// Registry with the built-in providers.
    #[must_use]
    pub fn builtin() -> Self {
        ProviderRegistry {
            providers: vec![
                Provider {
                    id: "vidlink",
                    base: "https://vidlink.pro",
                    flavor: Flavor::VidLink,
                },
                Provider {
                    id: "filmex",
                    base: "https://filmex.to",
                    flavor: Flavor::Filmex,
                },
                Provider {
                    id: "cricwatch",
                    base: "https://cricwatch.io",
                    flavor: Flavor::Sports(&CRICWATCH),
                },
                Provider {
                    id: "totalsportek",
                    base: "https://totalsportek.es",
                    flavor: Flavor::Sports(&TOTALSPORTEK),
                },
            ],
        }
    }

    pub fn get(&self, id: &str) -> Result<&Provider> {
        self.providers
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| ScoutError::UnknownProvider(id.to_string()))
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::AudioTrack;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::builtin()
    }

    #[test]
    fn vidlink_movie_url() {
        let provider = registry().get("vidlink").copied().unwrap();
        let url = provider
            .build_upstream_url(&MediaRequest::Movie {
                tmdb_id: "786892".into(),
            })
            .unwrap();
        assert_eq!(url, "https://vidlink.pro/movie/786892?player=jw");
    }

    #[test]
    fn vidlink_tv_and_anime_urls() {
        let provider = registry().get("vidlink").copied().unwrap();
        let tv = provider
            .build_upstream_url(&MediaRequest::Tv {
                tmdb_id: "1399".into(),
                season: "1".into(),
                episode: "2".into(),
            })
            .unwrap();
        assert_eq!(tv, "https://vidlink.pro/tv/1399/1/2?player=jw");

        let anime = provider
            .build_upstream_url(&MediaRequest::Anime {
                mal_id: "5114".into(),
                episode: "3".into(),
                audio: AudioTrack::Sub,
            })
            .unwrap();
        assert_eq!(anime, "https://vidlink.pro/anime/5114/3/sub?player=jw");
    }

    #[test]
    fn fields_are_percent_encoded_exactly_once() {
        let provider = registry().get("vidlink").copied().unwrap();
        let url = provider
            .build_upstream_url(&MediaRequest::Movie {
                tmdb_id: "a b/c".into(),
            })
            .unwrap();
        assert_eq!(url, "https://vidlink.pro/movie/a%20b%2Fc?player=jw");
        assert!(!url.contains(' '));
    }

    #[test]
    fn filmex_rejects_anime_before_any_browser_work() {
        let provider = registry().get("filmex").copied().unwrap();
        let err = provider
            .build_upstream_url(&MediaRequest::Anime {
                mal_id: "5114".into(),
                episode: "1".into(),
                audio: AudioTrack::Dub,
            })
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_combination");
        assert!(err.to_string().contains("filmex"));
        assert!(err.to_string().contains("anime"));
    }

    #[test]
    fn embed_providers_reject_sports_events() {
        for id in ["vidlink", "filmex"] {
            let reg = registry();
            let provider = reg.get(id).unwrap();
            let err = provider
                .build_upstream_url(&MediaRequest::SportsEvent {
                    event_url: "https://totalsportek.es/event".into(),
                })
                .unwrap_err();
            assert_eq!(err.code(), "unsupported_combination");
        }
    }

    #[test]
    fn sports_provider_passes_event_url_through() {
        let reg = registry();
        let provider = reg.get("totalsportek").unwrap();
        let url = provider
            .build_upstream_url(&MediaRequest::SportsEvent {
                event_url: "https://totalsportek.es/football/a-vs-b".into(),
            })
            .unwrap();
        assert_eq!(url, "https://totalsportek.es/football/a-vs-b");
        assert!(provider.sports_profile().is_some());
    }

    #[test]
    fn missing_field_beats_unsupported_combination() {
        let reg = registry();
        let provider = reg.get("filmex").unwrap();
        let err = provider
            .build_upstream_url(&MediaRequest::Movie {
                tmdb_id: "  ".into(),
            })
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn lookup_is_case_insensitive_and_unknown_fails() {
        let reg = registry();
        assert_eq!(reg.get("VidLink").unwrap().id, "vidlink");
        assert_eq!(
            reg.get("nosuch").unwrap_err().code(),
            "unknown_provider"
        );
    }

    #[test]
    fn probe_context_derives_origin_from_parent() {
        let ctx = HttpContext::for_probe("https://totalsportek.es/football/a-vs-b");
        assert_eq!(ctx.referer, "https://totalsportek.es/football/a-vs-b");
        assert_eq!(ctx.origin, "https://totalsportek.es");
    }
}
