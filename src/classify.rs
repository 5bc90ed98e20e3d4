//! Stream classification.
//!
//! A pure predicate + extractor: given a network response observation (or a
//! raw URL string pulled out of page content), decide whether it looks like
//! a playable stream resource. The rules are a declarative, priority-ordered
//! chain; first match wins. The heuristics are inherently approximate — a
//! match means "looks like a stream", not "is a valid stream".

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Detected (or inferred) container format of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    Hls,
    Mp4,
    Iframe,
    Redirect,
    Unknown,
}

impl StreamFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamFormat::Hls => "hls",
            StreamFormat::Mp4 => "mp4",
            StreamFormat::Iframe => "iframe",
            StreamFormat::Redirect => "redirect",
            StreamFormat::Unknown => "unknown",
        }
    }
}

/// Which resolution stage produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Passive network interception.
    Network,
    /// In-page player state (JWPlayer playlist).
    PlayerState,
    /// Brute-force regex over the full page HTML.
    ContentRegex,
    /// `source:` / `file:` assignments inside script text.
    ScriptSource,
    /// Decoded `atob("...")` constant.
    AtobDecoded,
    /// iframe element matched by player heuristics.
    PlayerIframe,
    /// iframe kept only because it was not on the denylist.
    PotentialIframe,
    /// `<video src>` / `<video><source src>` element.
    VideoElement,
    /// `data-src` / `data-url` / `data-stream` style attribute.
    DataAttribute,
    /// Anchor pointing at a known redirect/player host.
    RedirectLink,
    /// `src=` query parameter extracted from a redirect link.
    ExtractedSrc,
}

/// A URL believed to point at playable video content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub url: String,
    pub format: StreamFormat,
    /// Free-form quality label; usually "unknown".
    pub quality: String,
    pub origin: CandidateOrigin,
    /// Probe depth the candidate was discovered at (0 = the event page).
    pub level: u8,
    /// Display name carried over from the link that led here, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StreamCandidate {
    #[must_use]
    pub fn new(url: impl Into<String>, format: StreamFormat, origin: CandidateOrigin) -> Self {
        StreamCandidate {
            url: url.into(),
            format,
            quality: "unknown".to_string(),
            origin,
            level: 0,
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn at_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Whether this candidate is a page to navigate into rather than a
    /// directly playable resource.
    #[must_use]
    pub fn is_probe_target(&self) -> bool {
        matches!(self.format, StreamFormat::Iframe | StreamFormat::Redirect)
    }
}

/// A network response as seen by the session's interception hook.
#[derive(Debug, Clone)]
pub struct ResponseObservation {
    pub url: String,
    pub status: u16,
    /// Lowercased `Content-Type`, when present.
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Whether the classifier is hunting one true stream or collecting weak
/// candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Movie/TV/anime resolution: exactly one stream is expected, so tiny
    /// manifests are rejected as placeholders.
    SingleStream,
    /// Sports scraping: collect everything, let the caller rank trust.
    MultiCandidate,
}

/// Responses whose declared body is smaller than this are placeholder
/// manifests, not real playlists.
const MIN_MANIFEST_BYTES: u64 = 1024;

struct Rule {
    name: &'static str,
    format: StreamFormat,
    matches: fn(&ResponseObservation) -> bool,
}

fn content_type_contains(obs: &ResponseObservation, needle: &str) -> bool {
    obs.content_type
        .as_deref()
        .is_some_and(|ct| ct.contains(needle))
}

/// Priority-ordered classification rules; first match wins.
const RULES: &[Rule] = &[
    Rule {
        name: "m3u8-url",
        format: StreamFormat::Hls,
        matches: |obs| obs.url.contains(".m3u8"),
    },
    Rule {
        name: "mpegurl-content-type",
        format: StreamFormat::Hls,
        matches: |obs| content_type_contains(obs, "application/x-mpegurl"),
    },
    Rule {
        name: "hls-master-path",
        format: StreamFormat::Hls,
        matches: |obs| obs.url.contains("/hls/") && obs.url.to_lowercase().contains("master"),
    },
    Rule {
        name: "mp4",
        format: StreamFormat::Mp4,
        matches: |obs| obs.url.contains(".mp4") || content_type_contains(obs, "video/mp4"),
    },
    Rule {
        name: "live-or-stream-path",
        format: StreamFormat::Unknown,
        matches: |obs| obs.url.contains("/live/") || obs.url.contains("/stream/"),
    },
];

/// Classify a network response. Returns `None` when nothing matched or the
/// response is ineligible (non-200, or a placeholder-sized manifest in
/// single-stream mode).
#[must_use]
pub fn classify_response(
    obs: &ResponseObservation,
    strictness: Strictness,
) -> Option<StreamCandidate> {
    if obs.status != 200 {
        return None;
    }

    let rule = RULES.iter().find(|rule| (rule.matches)(obs))?;
    trace!(rule = rule.name, url = %obs.url, "response classified");

    if strictness == Strictness::SingleStream {
        if let Some(len) = obs.content_length {
            if len < MIN_MANIFEST_BYTES {
                return None;
            }
        }
    }

    Some(StreamCandidate::new(
        obs.url.clone(),
        rule.format,
        CandidateOrigin::Network,
    ))
}

/// Infer a format for a raw URL string extracted from page content. Uses
/// the same substring rules as the network classifier, minus anything that
/// needs headers.
#[must_use]
pub fn infer_format(url: &str) -> StreamFormat {
    if url.contains(".m3u8") {
        StreamFormat::Hls
    } else if url.contains(".mp4") {
        StreamFormat::Mp4
    } else {
        StreamFormat::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(url: &str) -> ResponseObservation {
        ResponseObservation {
            url: url.to_string(),
            status: 200,
            content_type: None,
            content_length: None,
        }
    }

    #[test]
    fn m3u8_url_classifies_as_hls() {
        let candidate =
            classify_response(&obs("https://x.example/path/master.m3u8"), Strictness::SingleStream)
                .unwrap();
        assert_eq!(candidate.format, StreamFormat::Hls);
        assert_eq!(candidate.origin, CandidateOrigin::Network);
    }

    #[test]
    fn content_type_alone_is_enough() {
        let mut o = obs("https://x.example/playlist");
        o.content_type = Some("application/x-mpegurl".into());
        let candidate = classify_response(&o, Strictness::SingleStream).unwrap();
        assert_eq!(candidate.format, StreamFormat::Hls);
    }

    #[test]
    fn hls_master_path_is_case_insensitive_on_master() {
        let candidate =
            classify_response(&obs("https://x.example/hls/MASTER/index"), Strictness::SingleStream)
                .unwrap();
        assert_eq!(candidate.format, StreamFormat::Hls);
    }

    #[test]
    fn mp4_by_url_or_content_type() {
        assert_eq!(
            classify_response(&obs("https://x.example/v/movie.mp4"), Strictness::SingleStream)
                .unwrap()
                .format,
            StreamFormat::Mp4
        );
        let mut o = obs("https://x.example/v/movie");
        o.content_type = Some("video/mp4".into());
        assert_eq!(
            classify_response(&o, Strictness::SingleStream).unwrap().format,
            StreamFormat::Mp4
        );
    }

    #[test]
    fn live_and_stream_paths_are_weak_candidates() {
        let candidate =
            classify_response(&obs("https://x.example/live/feed"), Strictness::MultiCandidate)
                .unwrap();
        assert_eq!(candidate.format, StreamFormat::Unknown);
    }

    #[test]
    fn non_200_is_never_eligible() {
        let mut o = obs("https://x.example/master.m3u8");
        o.status = 302;
        assert!(classify_response(&o, Strictness::SingleStream).is_none());
        assert!(classify_response(&o, Strictness::MultiCandidate).is_none());
    }

    #[test]
    fn placeholder_guard_applies_only_to_single_stream_mode() {
        let mut o = obs("https://x.example/path/master.m3u8");
        o.content_length = Some(100);
        assert!(classify_response(&o, Strictness::SingleStream).is_none());
        assert!(classify_response(&o, Strictness::MultiCandidate).is_some());

        o.content_length = Some(5000);
        assert!(classify_response(&o, Strictness::SingleStream).is_some());

        // Unknown length passes the guard.
        o.content_length = None;
        assert!(classify_response(&o, Strictness::SingleStream).is_some());
    }

    #[test]
    fn rule_priority_prefers_hls_over_mp4() {
        // URL matches both .m3u8 and /stream/; the earlier rule wins.
        let candidate = classify_response(
            &obs("https://x.example/stream/master.m3u8"),
            Strictness::MultiCandidate,
        )
        .unwrap();
        assert_eq!(candidate.format, StreamFormat::Hls);
    }

    #[test]
    fn raw_format_inference() {
        assert_eq!(infer_format("https://x/v.m3u8?t=1"), StreamFormat::Hls);
        assert_eq!(infer_format("https://x/v.mp4"), StreamFormat::Mp4);
        assert_eq!(infer_format("https://x/player"), StreamFormat::Unknown);
    }
}
