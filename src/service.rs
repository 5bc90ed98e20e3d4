//! The `StreamScout` facade.
//!
//! One instance owns the provider registry, the per-kind result caches and
//! the engine launcher. Every operation checks its cache first, and on a
//! miss launches a fresh browser engine that is shut down on every exit
//! path before the result is cached and returned.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::browser::chrome::ChromeLauncher;
use crate::browser::EngineLauncher;
use crate::browser::locate::locate_chrome;
use crate::cache::TtlCache;
use crate::classify::StreamCandidate;
use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::pipeline::{self, ResolvedStream};
use crate::provider::{Provider, ProviderRegistry, SportsProfile};
use crate::request::MediaRequest;
use crate::scrape::{self, Category, Event};

/// An operation result annotated with its cache provenance.
#[derive(Debug, Clone, Serialize)]
pub struct Fetched<T> {
    pub value: T,
    pub from_cache: bool,
    /// When the value entered the cache. Set only on cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

impl<T> Fetched<T> {
    fn fresh(value: T) -> Self {
        Fetched {
            value,
            from_cache: false,
            cached_at: None,
        }
    }

    fn cached(value: T, cached_at: DateTime<Utc>) -> Self {
        Fetched {
            value,
            from_cache: true,
            cached_at: Some(cached_at),
        }
    }
}

/// One event from the full sports crawl, with its collected streams.
#[derive(Debug, Clone, Serialize)]
pub struct EventCrawl {
    #[serde(flatten)]
    pub event: Event,
    pub streams: Vec<StreamCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One category from the full sports crawl, with its events.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCrawl {
    #[serde(flatten)]
    pub category: Category,
    pub events: Vec<EventCrawl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Resolves media requests into playable streams and scrapes sports
/// listings, caching results per kind.
pub struct StreamScout {
    launcher: Box<dyn EngineLauncher>,
    registry: ProviderRegistry,
    config: ScoutConfig,
    streams: TtlCache<ResolvedStream>,
    categories: TtlCache<Vec<Category>>,
    events: TtlCache<Vec<Event>>,
    event_streams: TtlCache<Vec<StreamCandidate>>,
}

impl StreamScout {
    /// Build a scout backed by a locally discovered Chrome executable.
    ///
    /// Fails with `BrowserUnavailable` up front rather than on first use.
    pub fn new(config: ScoutConfig) -> Result<Self> {
        let executable = locate_chrome(config.chrome_executable.as_deref())?;
        let launcher = Box::new(ChromeLauncher::new(executable));
        Ok(Self::with_launcher(launcher, config))
    }

    /// Build a scout on an injected engine launcher.
    #[must_use]
    pub fn with_launcher(launcher: Box<dyn EngineLauncher>, config: ScoutConfig) -> Self {
        let capacity = config.cache_capacity;
        StreamScout {
            launcher,
            registry: ProviderRegistry::builtin(),
            config,
            streams: TtlCache::new(capacity),
            categories: TtlCache::new(capacity),
            events: TtlCache::new(capacity),
            event_streams: TtlCache::new(capacity),
        }
    }

    /// Registered provider ids.
    #[must_use]
    pub fn providers(&self) -> Vec<&'static str> {
        self.registry.ids()
    }

    /// Resolve a movie/TV/anime request into one playable stream.
    #[instrument(skip(self, request), fields(kind = request.kind()))]
    pub async fn resolve_stream(
        &self,
        provider_id: &str,
        request: &MediaRequest,
    ) -> Result<Fetched<ResolvedStream>> {
        let provider = self.registry.get(provider_id)?;
        let upstream_url = provider.build_upstream_url(request)?;

        let fingerprint = request.fingerprint(provider.id);
        if let Some(entry) = self.streams.get(&fingerprint) {
            // The upstream grant can lapse before its cache entry does.
            if entry.value.expires_at > Utc::now() {
                debug!(%fingerprint, "stream served from cache");
                return Ok(Fetched::cached(entry.value, entry.cached_at));
            }
        }

        let engine = self.launcher.launch().await?;
        let outcome =
            pipeline::resolve_single_stream(engine.as_ref(), provider, &upstream_url, &self.config)
                .await;
        engine.shutdown().await;

        let stream = outcome?;
        self.streams
            .put(&fingerprint, stream.clone(), self.config.stream_cache_ttl);
        Ok(Fetched::fresh(stream))
    }

    /// List a sports provider's categories from its home page.
    #[instrument(skip(self))]
    pub async fn list_categories(&self, provider_id: &str) -> Result<Fetched<Vec<Category>>> {
        let provider = self.registry.get(provider_id)?;
        let profile = require_sports(provider)?;

        let fingerprint = format!("{}:categories", provider.id);
        if let Some(entry) = self.categories.get(&fingerprint) {
            return Ok(Fetched::cached(entry.value, entry.cached_at));
        }

        let html = self
            .fetch_listing(provider, profile, profile.home_url)
            .await?;
        let categories = scrape::extract_categories(&html, profile.home_url, profile);
        debug!(count = categories.len(), "categories extracted");

        self.categories
            .put(&fingerprint, categories.clone(), self.config.category_cache_ttl);
        Ok(Fetched::fresh(categories))
    }

    /// List events on one category page. `category` is a slug relative to
    /// the provider's home page, or a full URL.
    #[instrument(skip(self))]
    pub async fn list_events(
        &self,
        provider_id: &str,
        category: &str,
    ) -> Result<Fetched<Vec<Event>>> {
        let provider = self.registry.get(provider_id)?;
        let profile = require_sports(provider)?;
        let category_url = category_url(profile, category);

        let fingerprint = format!("{}:events:{category_url}", provider.id);
        if let Some(entry) = self.events.get(&fingerprint) {
            return Ok(Fetched::cached(entry.value, entry.cached_at));
        }

        let html = self.fetch_listing(provider, profile, &category_url).await?;
        let events = scrape::extract_events(&html, &category_url, profile);
        debug!(count = events.len(), "events extracted");

        self.events
            .put(&fingerprint, events.clone(), self.config.event_cache_ttl);
        Ok(Fetched::fresh(events))
    }

    /// Collect every stream candidate reachable from one event page.
    #[instrument(skip(self))]
    pub async fn extract_event_streams(
        &self,
        provider_id: &str,
        event_url: &str,
    ) -> Result<Fetched<Vec<StreamCandidate>>> {
        let provider = self.registry.get(provider_id)?;
        let profile = require_sports(provider)?;

        let fingerprint = format!("{}:streams:{event_url}", provider.id);
        if let Some(entry) = self.event_streams.get(&fingerprint) {
            return Ok(Fetched::cached(entry.value, entry.cached_at));
        }

        let engine = self.launcher.launch().await?;
        let outcome =
            pipeline::collect_event_streams(engine.as_ref(), profile, event_url, &self.config)
                .await;
        engine.shutdown().await;

        let streams = outcome?;
        self.event_streams
            .put(&fingerprint, streams.clone(), self.config.event_cache_ttl);
        Ok(Fetched::fresh(streams))
    }

    /// Full crawl: categories, their events, and each event's streams.
    ///
    /// Per-category and per-event failures are recorded on the affected
    /// entry and the crawl keeps going; only the category listing itself
    /// is fatal.
    #[instrument(skip(self))]
    pub async fn list_all_sports_data(
        &self,
        provider_id: &str,
    ) -> Result<Fetched<Vec<CategoryCrawl>>> {
        let categories = self.list_categories(provider_id).await?;
        let mut results: Vec<CategoryCrawl> = Vec::new();

        for category in categories.value {
            let events = match self.list_events(provider_id, &category.url).await {
                Ok(events) => events.value,
                Err(error) => {
                    warn!(category = %category.url, %error, "category crawl failed");
                    results.push(CategoryCrawl {
                        category,
                        events: Vec::new(),
                        error: Some(error.to_string()),
                    });
                    continue;
                }
            };

            let mut crawled: Vec<EventCrawl> = Vec::new();
            for event in events {
                match self.extract_event_streams(provider_id, &event.url).await {
                    Ok(streams) => crawled.push(EventCrawl {
                        event,
                        streams: streams.value,
                        error: None,
                    }),
                    Err(error) => {
                        warn!(event = %event.url, %error, "event crawl failed");
                        crawled.push(EventCrawl {
                            event,
                            streams: Vec::new(),
                            error: Some(error.to_string()),
                        });
                    }
                }
            }

            results.push(CategoryCrawl {
                category,
                events: crawled,
                error: None,
            });
        }

        Ok(Fetched::fresh(results))
    }

    async fn fetch_listing(
        &self,
        provider: &Provider,
        profile: &'static SportsProfile,
        url: &str,
    ) -> Result<String> {
        let engine = self.launcher.launch().await?;
        let outcome = pipeline::fetch_page_html(
            engine.as_ref(),
            &provider.http_context(),
            profile.block_policy(),
            url,
            self.config.listing_timeout,
        )
        .await;
        engine.shutdown().await;
        outcome
    }
}

fn require_sports(provider: &Provider) -> Result<&'static SportsProfile> {
    provider
        .sports_profile()
        .ok_or(ScoutError::UnsupportedCombination {
            provider: provider.id,
            kind: "sports-event",
        })
}

fn category_url(profile: &SportsProfile, category: &str) -> String {
    if category.starts_with("http://") || category.starts_with("https://") {
        category.to_string()
    } else {
        format!(
            "{}/{}",
            profile.home_url.trim_end_matches('/'),
            category.trim_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PROFILE_HOME: &str = "https://totalsportek.es";

    #[test]
    fn category_url_accepts_slug_or_absolute() {
        let registry = ProviderRegistry::builtin();
        let provider = registry.get("totalsportek").unwrap();
        let profile = require_sports(provider).unwrap();

        assert_eq!(
            category_url(profile, "football"),
            format!("{PROFILE_HOME}/football")
        );
        assert_eq!(
            category_url(profile, "/football/"),
            format!("{PROFILE_HOME}/football")
        );
        assert_eq!(
            category_url(profile, "https://totalsportek.es/nba"),
            "https://totalsportek.es/nba"
        );
    }

    #[test]
    fn embed_provider_rejects_sports_operations() {
        let registry = ProviderRegistry::builtin();
        let provider = registry.get("vidlink").unwrap();
        let err = require_sports(provider).unwrap_err();
        assert_eq!(err.code(), "unsupported_combination");
    }
}
