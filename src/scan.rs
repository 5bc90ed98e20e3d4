//! Page-content scanners.
//!
//! Pure functions over a navigated page's HTML that pull out stream
//! candidates the network layer never saw: URLs buried in script text,
//! base64-encoded constants, player iframes, video elements and data
//! attributes. Each scanner tags its candidates with an origin so callers
//! can rank trust.

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::classify::{infer_format, CandidateOrigin, StreamCandidate, StreamFormat};
use crate::provider::SportsProfile;

/// Absolute m3u8 URLs, tolerating JSON-escaped slashes (`https:\/\/...`).
static M3U8_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?:\\?/\\?/[^\s"'<>]+\.m3u8[^\s"'<>]*"#).expect("m3u8 regex")
});

static MP4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?:\\?/\\?/[^\s"'<>]+\.mp4[^\s"'<>]*"#).expect("mp4 regex")
});

/// `source: "..."` / `file: "..."` assignments in player setup scripts.
static SOURCE_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:source|file)\s*:\s*["']([^"']+)["']"#).expect("source/file regex")
});

/// `atob("...")` constants that often hide stream URLs.
static ATOB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"atob\s*\(\s*["']([^"']+)["']\s*\)"#).expect("atob regex"));

static SCRIPT_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("script").expect("selector"));
static IFRAME_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src]").expect("selector"));
static VIDEO_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("video[src]").expect("selector"));
static VIDEO_SOURCE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("video source[src]").expect("selector"));
static DATA_ATTR_SEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-src], [data-url], [data-stream], [data-video], [data-stream-url]")
        .expect("selector")
});
static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("selector"));

/// iframe hosts that are never players.
const IFRAME_DENYLIST: &[&str] = &["google", "facebook", "twitter", "ads", "analytics"];

/// Generic URL substrings marking an iframe as a player.
const IFRAME_PLAYER_MARKERS: &[&str] = &["stream", "player", "m3u8", "getlink", "live"];

const DATA_ATTRS: &[&str] = &[
    "data-stream-url",
    "data-url",
    "data-src",
    "data-stream",
    "data-video",
];

fn unescape(url: &str) -> String {
    url.replace("\\/", "/")
}

fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(page_url).ok()?.join(href).ok().map(Into::into)
}

fn push_unique(out: &mut Vec<StreamCandidate>, candidate: StreamCandidate) {
    if !out.iter().any(|c| c.url == candidate.url) {
        out.push(candidate);
    }
}

/// Brute-force regex over the full HTML for absolute m3u8/mp4 URLs.
#[must_use]
pub fn scan_raw_urls(html: &str) -> Vec<StreamCandidate> {
    let mut out = Vec::new();
    for m in M3U8_RE.find_iter(html).chain(MP4_RE.find_iter(html)) {
        let url = unescape(m.as_str());
        push_unique(
            &mut out,
            StreamCandidate::new(url.clone(), infer_format(&url), CandidateOrigin::ContentRegex),
        );
    }
    out
}

/// Scan script text for player `source:`/`file:` assignments and decodable
/// `atob("...")` constants.
#[must_use]
pub fn scan_scripts(html: &str) -> Vec<StreamCandidate> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for script in document.select(&SCRIPT_SEL) {
        let text: String = script.text().collect();
        if text.is_empty() {
            continue;
        }

        for cap in SOURCE_FILE_RE.captures_iter(&text) {
            let url = unescape(&cap[1]);
            if url.starts_with("http") || url.contains(".m3u8") || url.contains(".mp4") {
                push_unique(
                    &mut out,
                    StreamCandidate::new(
                        url.clone(),
                        infer_format(&url),
                        CandidateOrigin::ScriptSource,
                    ),
                );
            }
        }

        for cap in ATOB_RE.captures_iter(&text) {
            let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(&cap[1]) else {
                continue;
            };
            let Ok(decoded) = String::from_utf8(decoded) else {
                continue;
            };
            if decoded.starts_with("http") || decoded.contains(".m3u8") {
                push_unique(
                    &mut out,
                    StreamCandidate::new(
                        decoded.clone(),
                        infer_format(&decoded),
                        CandidateOrigin::AtobDecoded,
                    ),
                );
            }
        }
    }
    out
}

/// Inspect iframes for player candidates.
///
/// An iframe qualifies when its `allow` attribute requests player
/// permissions (autoplay/fullscreen/encrypted-media) or its URL carries a
/// player marker; anything else survives as a low-trust candidate unless
/// its host is on the denylist.
#[must_use]
pub fn scan_iframes(
    html: &str,
    page_url: &str,
    profile: Option<&SportsProfile>,
) -> Vec<StreamCandidate> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for iframe in document.select(&IFRAME_SEL) {
        let Some(raw_src) = iframe.value().attr("src") else {
            continue;
        };
        let Some(src) = resolve_href(page_url, raw_src) else {
            continue;
        };

        let allow = iframe.value().attr("allow").unwrap_or("");
        let allow_player = allow.contains("autoplay")
            || allow.contains("fullscreen")
            || allow.contains("encrypted-media");

        let marker_player = IFRAME_PLAYER_MARKERS.iter().any(|m| src.contains(m))
            || profile.is_some_and(|p| {
                p.probe_url_markers.iter().any(|m| src.contains(m))
                    || p.redirect_link_markers.iter().any(|m| src.contains(m))
            });

        if allow_player || marker_player {
            push_unique(
                &mut out,
                StreamCandidate::new(src, StreamFormat::Iframe, CandidateOrigin::PlayerIframe),
            );
        } else if !IFRAME_DENYLIST.iter().any(|d| src.contains(d)) {
            push_unique(
                &mut out,
                StreamCandidate::new(src, StreamFormat::Iframe, CandidateOrigin::PotentialIframe),
            );
        }
    }
    out
}

/// `<video src>` / `<video><source src>` elements plus `data-*` stream
/// attributes.
#[must_use]
pub fn scan_media_elements(html: &str, page_url: &str) -> Vec<StreamCandidate> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for element in document
        .select(&VIDEO_SEL)
        .chain(document.select(&VIDEO_SOURCE_SEL))
    {
        let Some(src) = element
            .value()
            .attr("src")
            .and_then(|s| resolve_href(page_url, s))
        else {
            continue;
        };
        if src.contains(".m3u8") || src.contains(".mp4") {
            push_unique(
                &mut out,
                StreamCandidate::new(
                    src.clone(),
                    infer_format(&src),
                    CandidateOrigin::VideoElement,
                ),
            );
        }
    }

    for element in document.select(&DATA_ATTR_SEL) {
        let Some(value) = DATA_ATTRS
            .iter()
            .find_map(|attr| element.value().attr(attr))
        else {
            continue;
        };
        if value.starts_with("http") {
            push_unique(
                &mut out,
                StreamCandidate::new(
                    value.to_string(),
                    infer_format(value),
                    CandidateOrigin::DataAttribute,
                ),
            );
        }
    }
    out
}

/// Harvest anchors pointing at known redirect/player hosts, and lift any
/// `src=` query parameter they carry as a direct candidate.
#[must_use]
pub fn scan_redirect_links(
    html: &str,
    page_url: &str,
    profile: &SportsProfile,
) -> Vec<StreamCandidate> {
    if profile.redirect_link_markers.is_empty() {
        return Vec::new();
    }

    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for anchor in document.select(&ANCHOR_SEL) {
        let Some(href) = anchor
            .value()
            .attr("href")
            .and_then(|h| resolve_href(page_url, h))
        else {
            continue;
        };
        if !profile.redirect_link_markers.iter().any(|m| href.contains(m)) {
            continue;
        }

        let text = anchor.text().collect::<String>().trim().to_string();
        let name = if text.is_empty() { "Watch".to_string() } else { text };

        push_unique(
            &mut out,
            StreamCandidate::new(href.clone(), StreamFormat::Redirect, CandidateOrigin::RedirectLink)
                .with_name(name.clone()),
        );

        if let Ok(parsed) = Url::parse(&href) {
            if let Some((_, src)) = parsed.query_pairs().find(|(k, _)| k == "src") {
                if src.starts_with("http") {
                    let format = match infer_format(&src) {
                        StreamFormat::Unknown => StreamFormat::Redirect,
                        other => other,
                    };
                    push_unique(
                        &mut out,
                        StreamCandidate::new(
                            src.to_string(),
                            format,
                            CandidateOrigin::ExtractedSrc,
                        )
                        .with_name(format!("{name} (Direct)")),
                    );
                }
            }
        }
    }
    out
}

/// Run every scanner that applies at this probe level and merge the results,
/// deduplicated by URL.
#[must_use]
pub fn scan_page(
    html: &str,
    page_url: &str,
    profile: Option<&SportsProfile>,
    level: u8,
) -> Vec<StreamCandidate> {
    let mut out: Vec<StreamCandidate> = Vec::new();

    let mut merge = |candidates: Vec<StreamCandidate>| {
        for candidate in candidates {
            push_unique(&mut out, candidate.at_level(level));
        }
    };

    merge(scan_raw_urls(html));
    merge(scan_scripts(html));
    merge(scan_iframes(html, page_url, profile));
    merge(scan_media_elements(html, page_url));
    if let Some(profile) = profile {
        merge(scan_redirect_links(html, page_url, profile));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderRegistry;

    fn totalsportek() -> &'static SportsProfile {
        // Leaked registry keeps the profile reference simple in tests.
        let registry = Box::leak(Box::new(ProviderRegistry::builtin()));
        registry.get("totalsportek").unwrap().sports_profile().unwrap()
    }

    #[test]
    fn raw_urls_unescape_json_slashes() {
        let html = r#"<script>var a = "https:\/\/cdn.example\/hls\/master.m3u8";</script>"#;
        let found = scan_raw_urls(html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://cdn.example/hls/master.m3u8");
        assert_eq!(found[0].format, StreamFormat::Hls);
    }

    #[test]
    fn script_source_and_file_assignments() {
        let html = r#"
            <script>
              player.setup({ file: "https://cdn.example/v/index.m3u8" });
              var c = { source: 'https://cdn.example/v/clip.mp4' };
              var skip = { file: "relative/path.js" };
            </script>"#;
        let found = scan_scripts(html);
        let urls: Vec<_> = found.iter().map(|c| c.url.as_str()).collect();
        assert!(urls.contains(&"https://cdn.example/v/index.m3u8"));
        assert!(urls.contains(&"https://cdn.example/v/clip.mp4"));
        assert!(!urls.iter().any(|u| u.contains("relative")));
    }

    #[test]
    fn atob_constants_are_decoded() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode("https://hidden.example/live/master.m3u8");
        let html = format!(r#"<script>var u = atob("{encoded}");</script>"#);
        let found = scan_scripts(&html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://hidden.example/live/master.m3u8");
        assert_eq!(found[0].origin, CandidateOrigin::AtobDecoded);
    }

    #[test]
    fn undecodable_atob_is_skipped() {
        let html = r#"<script>var u = atob("not base64 at all!!!");</script>"#;
        assert!(scan_scripts(html).is_empty());
    }

    #[test]
    fn iframe_allow_attribute_marks_player() {
        let html = r#"
            <iframe src="https://embed.example/x" allow="autoplay; fullscreen"></iframe>
            <iframe src="https://widgets.example/misc"></iframe>
            <iframe src="https://googleads.example/frame"></iframe>"#;
        let found = scan_iframes(html, "https://site.example/page", None);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].origin, CandidateOrigin::PlayerIframe);
        assert_eq!(found[1].origin, CandidateOrigin::PotentialIframe);
        assert!(!found.iter().any(|c| c.url.contains("googleads")));
    }

    #[test]
    fn profile_probe_markers_extend_iframe_heuristics() {
        let html = r#"<iframe src="https://yeahstreams.com/embed/9"></iframe>"#;
        let found = scan_iframes(html, "https://totalsportek.es/e", Some(totalsportek()));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].origin, CandidateOrigin::PlayerIframe);
    }

    #[test]
    fn relative_iframe_src_is_resolved_against_page() {
        let html = r#"<iframe src="/partytown/sandbox.html" allow="autoplay"></iframe>"#;
        let found = scan_iframes(html, "https://cricwatch.io/watch/a-vs-b", None);
        assert_eq!(found[0].url, "https://cricwatch.io/partytown/sandbox.html");
    }

    #[test]
    fn video_and_data_attributes() {
        let html = r#"
            <video src="https://cdn.example/v.mp4"></video>
            <video><source src="https://cdn.example/v.m3u8"></video>
            <div data-stream-url="https://cdn.example/hidden/master.m3u8"></div>
            <div data-src="not-a-url"></div>"#;
        let found = scan_media_elements(html, "https://site.example/");
        let urls: Vec<_> = found.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls.len(), 3);
        assert!(urls.contains(&"https://cdn.example/hidden/master.m3u8"));
    }

    #[test]
    fn redirect_links_lift_src_parameter() {
        let html = r#"
            <a href="https://hitlinks.online/go?src=https%3A%2F%2Fcdn.example%2Fmaster.m3u8">Link 1</a>
            <a href="https://site.example/other">other</a>"#;
        let found = scan_redirect_links(html, "https://totalsportek.es/e", totalsportek());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].format, StreamFormat::Redirect);
        assert_eq!(found[0].name.as_deref(), Some("Link 1"));
        assert_eq!(found[1].url, "https://cdn.example/master.m3u8");
        assert_eq!(found[1].format, StreamFormat::Hls);
        assert_eq!(found[1].origin, CandidateOrigin::ExtractedSrc);
    }

    #[test]
    fn scan_page_dedupes_across_scanners_and_tags_level() {
        // Same URL visible to both the raw regex and a video element.
        let html = r#"
            <video src="https://cdn.example/v.m3u8"></video>
            <script>var u = "https://cdn.example/v.m3u8";</script>"#;
        let found = scan_page(html, "https://site.example/", None, 2);
        let matching: Vec<_> = found
            .iter()
            .filter(|c| c.url == "https://cdn.example/v.m3u8")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].level, 2);
    }
}
