//! Tunables for the resolution pipeline and caches.

use std::time::Duration;

use serde::Deserialize;

/// Crate-wide configuration. `Default` mirrors the behavior of the upstream
/// sites this was tuned against; every knob is overridable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Navigation timeout for the primary upstream page (single-stream).
    #[serde(with = "duration_secs")]
    pub navigation_timeout: Duration,
    /// Navigation timeout for sports listing pages.
    #[serde(with = "duration_secs")]
    pub listing_timeout: Duration,
    /// Navigation timeout for redirect/player probe pages.
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,
    /// Navigation timeout for probes nested below the first probe level.
    #[serde(with = "duration_secs")]
    pub deep_probe_timeout: Duration,
    /// How long passive interception waits for a stream response on the
    /// single-stream path.
    #[serde(with = "duration_secs")]
    pub intercept_wait: Duration,
    /// How long passive interception accumulates responses per sports page.
    #[serde(with = "duration_secs")]
    pub sports_intercept_wait: Duration,
    /// Poll granularity inside the interception wait windows.
    #[serde(with = "duration_millis")]
    pub intercept_poll: Duration,
    /// Extra probe levels allowed past the original event page.
    pub max_probe_depth: u8,
    /// Assumed validity of a freshly resolved stream.
    #[serde(with = "duration_secs")]
    pub stream_validity: Duration,
    /// TTL for cached resolved streams.
    #[serde(with = "duration_secs")]
    pub stream_cache_ttl: Duration,
    /// TTL for cached category listings.
    #[serde(with = "duration_secs")]
    pub category_cache_ttl: Duration,
    /// TTL for cached event listings and per-event candidate sets.
    #[serde(with = "duration_secs")]
    pub event_cache_ttl: Duration,
    /// Maximum entries per cache instance.
    pub cache_capacity: usize,
    /// Override for the Chrome executable path; `None` runs discovery.
    pub chrome_executable: Option<std::path::PathBuf>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        ScoutConfig {
            navigation_timeout: Duration::from_secs(12),
            listing_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(20),
            deep_probe_timeout: Duration::from_secs(10),
            intercept_wait: Duration::from_secs(10),
            sports_intercept_wait: Duration::from_secs(5),
            intercept_poll: Duration::from_millis(500),
            max_probe_depth: 2,
            stream_validity: Duration::from_secs(10 * 60),
            stream_cache_ttl: Duration::from_secs(7 * 60),
            category_cache_ttl: Duration::from_secs(30 * 60),
            event_cache_ttl: Duration::from_secs(5 * 60),
            cache_capacity: 500,
            chrome_executable: None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
