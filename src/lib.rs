//! `StreamScout` - headless-browser stream resolution
//!
//! Resolves a logical media request (movie/TV/anime identifier or a sports
//! event page) into directly playable HLS/MP4 stream URLs by driving
//! headless Chrome against third-party embed and listing pages, observing
//! their network traffic, and applying layered heuristics over page state
//! and content.
//!
//! # Features
//!
//! - **Passive interception**: classify every network response during page
//!   load and accept the first playable stream
//! - **Player introspection**: fall back to querying `JWPlayer` state in-page
//! - **Sports scraping**: category/event listing extraction plus bounded
//!   deep probing through redirect hosts and nested player iframes
//! - **Result caching**: LRU + TTL caches keyed by request fingerprint
//!
//! # Example
//!
//! ```rust,no_run
//! use streamscout::{MediaRequest, ScoutConfig, StreamScout};
//!
//! #[tokio::main]
//! async fn main() -> streamscout::Result<()> {
//!     let scout = StreamScout::new(ScoutConfig::default())?;
//!     let request = MediaRequest::Movie { tmdb_id: "786892".into() };
//!     let stream = scout.resolve_stream("vidlink", &request).await?;
//!     println!("{} ({})", stream.value.url, stream.value.format.as_str());
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod request;
pub mod scan;
pub mod scrape;
pub mod service;

pub use browser::{BlockPolicy, BrowserEngine, EngineLauncher, PageSession};
pub use classify::{CandidateOrigin, ResponseObservation, StreamCandidate, StreamFormat};
pub use config::ScoutConfig;
pub use error::{Result, ScoutError};
pub use pipeline::ResolvedStream;
pub use provider::{HttpContext, Provider, ProviderRegistry, SportsProfile};
pub use request::{AudioTrack, MediaRequest};
pub use scrape::{CandidateLink, Category, Event};
pub use service::{CategoryCrawl, EventCrawl, Fetched, StreamScout};

/// Version of streamscout
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
