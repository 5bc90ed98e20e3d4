//! Category and event extraction for sports listing sites.
//!
//! Listing pages carry no stable markup, so extraction walks an ordered
//! chain of selector heuristics (provider data, see
//! [`SportsProfile`](crate::provider::SportsProfile)), keeps the first match
//! per link, dedupes by URL, and falls back to keyword-matching every link
//! on the page when the whole chain comes up empty.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::provider::SportsProfile;

/// A sports category (e.g. "Football", "T20 Streams").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub slug: String,
    pub url: String,
}

/// A named link attached to an event (e.g. "Link 1", "Link 2").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub name: String,
    pub url: String,
}

/// A listed event/match with its candidate stream links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub url: String,
    pub candidate_links: Vec<CandidateLink>,
}

static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("selector"));
static TITLE_SEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".title, .event-title, .match-title, h3, h4, .name").expect("selector")
});

/// Link texts that are navigation chrome, never categories or events.
const CHROME_TEXT: &[&str] = &["Home", "Menu", "Login", "Register", "Contact", "⇊"];

/// Fallback keywords marking a link as event-like.
const EVENT_KEYWORDS: &[&str] = &["vs", "v ", "live", "watch", "stream"];

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_chrome(text: &str) -> bool {
    CHROME_TEXT.iter().any(|c| text.contains(c))
}

fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(page_url).ok()?.join(href).ok().map(Into::into)
}

/// Last non-empty path segment, or "general".
fn slug_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back().map(String::from))
        })
        .unwrap_or_else(|| "general".to_string())
}

/// Anchor href of the element itself, or of its first descendant anchor.
fn element_href(element: ElementRef<'_>, page_url: &str) -> Option<String> {
    if element.value().name() == "a" {
        return element
            .value()
            .attr("href")
            .and_then(|h| resolve_href(page_url, h));
    }
    element
        .select(&ANCHOR_SEL)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|h| resolve_href(page_url, h))
}

fn matches_keywords(haystack: &str, keywords: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Extract categories from a provider home page.
#[must_use]
pub fn extract_categories(html: &str, page_url: &str, profile: &SportsProfile) -> Vec<Category> {
    let document = Html::parse_document(html);
    let mut categories: Vec<Category> = Vec::new();

    for selector_src in profile.category_selectors {
        let Ok(selector) = Selector::parse(selector_src) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = normalize_text(&element.text().collect::<String>());
            let Some(href) = element_href(element, page_url) else {
                continue;
            };

            if text.len() <= 1 || text.len() >= 50 || is_chrome(&text) {
                continue;
            }
            if !href.contains(profile.host) {
                continue;
            }

            let slug = slug_of(&href);
            if !profile.category_keywords.is_empty()
                && !matches_keywords(&text, profile.category_keywords)
                && !matches_keywords(&slug, profile.category_keywords)
            {
                continue;
            }

            if !categories.iter().any(|c| c.url == href) {
                categories.push(Category {
                    name: text,
                    slug,
                    url: href,
                });
            }
        }
    }

    // Fallback: keyword-match every link on the page.
    if categories.is_empty() {
        for anchor in document.select(&ANCHOR_SEL) {
            let text = normalize_text(&anchor.text().collect::<String>());
            let Some(href) = element_href(anchor, page_url) else {
                continue;
            };
            if text.len() <= 2 || text.len() >= 50 || is_chrome(&text) {
                continue;
            }
            if !href.contains(profile.host) {
                continue;
            }
            let keyword_hit = if profile.category_keywords.is_empty() {
                href.contains("stream")
            } else {
                matches_keywords(&text, profile.category_keywords)
            };
            if !keyword_hit {
                continue;
            }
            if !categories.iter().any(|c| c.url == href) {
                categories.push(Category {
                    slug: slug_of(&href),
                    name: text,
                    url: href,
                });
            }
        }
    }

    categories
}

/// Extract events from a category page.
#[must_use]
pub fn extract_events(html: &str, page_url: &str, profile: &SportsProfile) -> Vec<Event> {
    let document = Html::parse_document(html);
    let mut events: Vec<Event> = Vec::new();
    // Every URL already claimed by an event or one of its link buttons;
    // keeps broad selectors from re-surfacing "Link 1" anchors as events.
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for selector_src in profile.event_selectors {
        let Ok(selector) = Selector::parse(selector_src) else {
            continue;
        };
        for element in document.select(&selector) {
            let title = element
                .select(&TITLE_SEL)
                .next()
                .map(|t| normalize_text(&t.text().collect::<String>()))
                .filter(|t| !t.is_empty())
                .or_else(|| {
                    let own = normalize_text(&element.text().collect::<String>());
                    (!own.is_empty()).then_some(own)
                })
                .or_else(|| element.value().attr("title").map(normalize_text));

            let Some(title) = title else { continue };
            let Some(href) = element_href(element, page_url) else {
                continue;
            };

            if title.len() <= 5 || title.len() >= 200 || is_chrome(&title) {
                continue;
            }
            if !href.contains(profile.host) {
                continue;
            }

            if seen.contains(&href) {
                continue;
            }

            let candidate_links = extract_candidate_links(element, page_url, profile);
            seen.insert(href.clone());
            seen.extend(candidate_links.iter().map(|l| l.url.clone()));
            events.push(Event {
                candidate_links,
                title,
                url: href,
            });
        }
    }

    // Fallback: any link whose text reads like a match listing.
    if events.is_empty() {
        for anchor in document.select(&ANCHOR_SEL) {
            let text = normalize_text(&anchor.text().collect::<String>());
            let Some(href) = element_href(anchor, page_url) else {
                continue;
            };
            if text.len() <= 10 || text.len() >= 100 {
                continue;
            }
            if !href.contains(profile.host) || !matches_keywords(&text, EVENT_KEYWORDS) {
                continue;
            }
            if seen.insert(href.clone()) {
                events.push(Event {
                    title: text,
                    url: href,
                    candidate_links: Vec::new(),
                });
            }
        }
    }

    events
}

/// Per-event stream link buttons ("Link 1", "Link 2", ...).
fn extract_candidate_links(
    event: ElementRef<'_>,
    page_url: &str,
    profile: &SportsProfile,
) -> Vec<CandidateLink> {
    let mut links: Vec<CandidateLink> = Vec::new();

    for selector_src in profile.event_link_selectors {
        let Ok(selector) = Selector::parse(selector_src) else {
            continue;
        };
        for (index, element) in event.select(&selector).enumerate() {
            let url = element
                .value()
                .attr("href")
                .or_else(|| element.value().attr("data-url"))
                .and_then(|h| resolve_href(page_url, h));
            let Some(url) = url else { continue };
            if !url.contains(profile.host) {
                continue;
            }

            let text = normalize_text(&element.text().collect::<String>());
            let name = if text.is_empty() {
                format!("Link {}", index + 1)
            } else {
                text
            };

            if !links.iter().any(|l| l.url == url) {
                links.push(CandidateLink { name, url });
            }
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderRegistry;

    fn profile(id: &str) -> &'static SportsProfile {
        let registry = Box::leak(Box::new(ProviderRegistry::builtin()));
        registry.get(id).unwrap().sports_profile().unwrap()
    }

    #[test]
    fn cricwatch_categories_from_selector_chain() {
        let html = r#"
            <nav>
              <a href="https://cricwatch.io/t20-streams">T20 Streams</a>
              <a href="https://cricwatch.io/odi-streams">ODI Streams</a>
              <a href="https://cricwatch.io/">Home</a>
              <a href="https://othersite.example/t20-streams">T20 elsewhere</a>
            </nav>"#;
        let cats = extract_categories(html, "https://cricwatch.io", profile("cricwatch"));
        assert_eq!(cats.len(), 2);
        // Selector-chain order, not document order: odi precedes t20.
        assert_eq!(cats[0].name, "ODI Streams");
        assert_eq!(cats[0].slug, "odi-streams");
        assert_eq!(cats[1].name, "T20 Streams");
        assert_eq!(cats[1].slug, "t20-streams");
        assert!(cats.iter().all(|c| c.url.contains("cricwatch.io")));
    }

    #[test]
    fn totalsportek_categories_require_sports_keywords() {
        let html = r#"
            <nav>
              <a href="https://totalsportek.es/football">Football</a>
              <a href="https://totalsportek.es/about">About us page</a>
            </nav>"#;
        let cats = extract_categories(html, "https://totalsportek.es", profile("totalsportek"));
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].slug, "football");
    }

    #[test]
    fn category_dedup_across_selectors() {
        // Same link reachable via `nav a` and `a[href*="football"]`.
        let html = r#"<nav><a href="https://totalsportek.es/football">Football</a></nav>"#;
        let cats = extract_categories(html, "https://totalsportek.es", profile("totalsportek"));
        assert_eq!(cats.len(), 1);
    }

    #[test]
    fn category_fallback_when_selectors_fail() {
        // No nav/menu structure at all; keyword fallback catches the link.
        let html = r#"<div><a href="https://totalsportek.es/x/nba">NBA games today</a></div>"#;
        let cats = extract_categories(html, "https://totalsportek.es", profile("totalsportek"));
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].slug, "nba");
    }

    #[test]
    fn events_with_container_selectors_and_links() {
        let html = r#"
            <div class="match-item">
              <h3>India vs Australia — 3rd Test</h3>
              <a href="https://cricwatch.io/watch/ind-vs-aus">watch</a>
              <a class="link-btn" href="https://cricwatch.io/link/1">Link 1</a>
              <a class="link-btn" href="https://cricwatch.io/link/2">Link 2</a>
            </div>"#;
        let events = extract_events(html, "https://cricwatch.io/t20-streams", profile("cricwatch"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "India vs Australia — 3rd Test");
        assert_eq!(events[0].url, "https://cricwatch.io/watch/ind-vs-aus");
        assert_eq!(events[0].candidate_links.len(), 2);
        assert_eq!(events[0].candidate_links[0].name, "Link 1");
    }

    #[test]
    fn events_dedupe_by_url() {
        let html = r#"
            <a href="https://cricwatch.io/watch/a-vs-b">Team A vs Team B live</a>
            <a href="https://cricwatch.io/watch/a-vs-b">Team A vs Team B live</a>"#;
        let events = extract_events(html, "https://cricwatch.io/c", profile("cricwatch"));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn event_fallback_keyword_scan() {
        let html = r#"
            <a href="https://totalsportek.es/e/123">Arsenal vs Chelsea stream</a>
            <a href="https://totalsportek.es/privacy">Privacy policy page</a>"#;
        let events = extract_events(html, "https://totalsportek.es/c", profile("totalsportek"));
        assert_eq!(events.len(), 1);
        assert!(events[0].title.contains("Arsenal"));
        assert!(events[0].candidate_links.is_empty());
    }

    #[test]
    fn off_site_and_short_titles_are_rejected() {
        let html = r#"
            <a href="https://evil.example/watch/a-vs-b">Team A vs Team B live match</a>
            <a href="https://cricwatch.io/watch/x">vs</a>"#;
        let events = extract_events(html, "https://cricwatch.io/c", profile("cricwatch"));
        assert!(events.is_empty());
    }

    #[test]
    fn slug_of_handles_trailing_slash_and_bare_host() {
        assert_eq!(slug_of("https://x.example/a/b/"), "b");
        assert_eq!(slug_of("https://x.example/"), "general");
    }
}
