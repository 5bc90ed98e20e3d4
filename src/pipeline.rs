//! Resolution pipelines.
//!
//! Two modes share the same session machinery but differ in intent. The
//! single-stream mode (movie/tv/anime embeds) hunts exactly one playable
//! URL through ordered fallback stages and stops at the first hit. The
//! multi-candidate mode (sports event pages) accumulates every plausible
//! candidate across passive interception, content scanning and bounded
//! deep probing, and returns them all for the caller to rank.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::browser::{BlockPolicy, BrowserEngine, PageSession};
use crate::classify::{
    classify_response, infer_format, CandidateOrigin, StreamCandidate, StreamFormat, Strictness,
};
use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::provider::{HttpContext, Provider, SportsProfile};
use crate::scan::scan_page;

/// A directly playable stream with its assumed validity horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub url: String,
    pub format: StreamFormat,
    pub expires_at: DateTime<Utc>,
}

/// In-page query against JWPlayer state: prefer a source whose file ends
/// with `.m3u8`, then one containing it, then the first source.
const JWPLAYER_QUERY: &str = r#"
(() => {
  try {
    if (!window.jwplayer) return null;
    const player = window.jwplayer();
    if (!player || !player.getPlaylist) return null;
    const playlist = player.getPlaylist();
    if (!playlist || !playlist.length) return null;
    const sources = playlist[0].sources || [];
    const src =
      sources.find((s) => s.file && s.file.endsWith('.m3u8')) ||
      sources.find((s) => s.file && s.file.includes('.m3u8')) ||
      sources[0];
    return src && src.file ? src.file : null;
  } catch (err) {
    return null;
  }
})()
"#;

/// Multi-instance JWPlayer harvest for probed pages: every playlist item
/// and source file across up to ten player instances, as a JSON array.
const JWPLAYER_INSTANCES_QUERY: &str = r#"
(() => {
  try {
    if (!window.jwplayer) return null;
    const files = [];
    for (let i = 0; i < 10; i++) {
      try {
        const player = window.jwplayer(i);
        if (!player || !player.getPlaylist) continue;
        (player.getPlaylist() || []).forEach((item) => {
          if (item.file) files.push(item.file);
          (item.sources || []).forEach((s) => {
            if (s.file) files.push(s.file);
          });
        });
      } catch (err) {}
    }
    return files.length ? JSON.stringify(files) : null;
  } catch (err) {
    return null;
  }
})()
"#;

/// Decode the player-state query result, keeping plausibly playable
/// entries.
fn parse_player_files(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default()
        .into_iter()
        .filter(|u| u.starts_with("http") || u.contains(".m3u8") || u.contains(".mp4"))
        .collect()
}

fn push_unique(found: &mut Vec<StreamCandidate>, candidate: StreamCandidate) {
    if !found.iter().any(|c| c.url == candidate.url) {
        found.push(candidate);
    }
}

/// Resolve one playable stream from an embed page.
///
/// Stage order: passive network interception for the wait window, then
/// JWPlayer introspection. The initial navigation failure is fatal; the
/// introspection stage yielding nothing falls through to `StreamNotFound`.
#[instrument(skip(engine, provider, config), fields(provider = provider.id))]
pub async fn resolve_single_stream(
    engine: &dyn BrowserEngine,
    provider: &Provider,
    upstream_url: &str,
    config: &ScoutConfig,
) -> Result<ResolvedStream> {
    let mut session = engine
        .open(&provider.http_context(), BlockPolicy::Aggressive)
        .await?;
    let outcome = run_single_stream(session.as_mut(), upstream_url, config).await;
    session.close().await;
    outcome
}

async fn run_single_stream(
    session: &mut dyn PageSession,
    upstream_url: &str,
    config: &ScoutConfig,
) -> Result<ResolvedStream> {
    session
        .navigate(upstream_url, config.navigation_timeout)
        .await?;

    if let Some(candidate) =
        await_intercepted_stream(session, config.intercept_wait, config.intercept_poll).await
    {
        debug!(url = %candidate.url, "stream found via interception");
        return Ok(resolved_from(candidate.url, candidate.format, config));
    }

    // A faulted introspection is a stage that yielded nothing, not a
    // failure of the operation.
    match session.evaluate_string(JWPLAYER_QUERY).await {
        Ok(Some(url)) => {
            debug!(%url, "stream found via player introspection");
            let format = infer_format(&url);
            return Ok(resolved_from(url, format, config));
        }
        Ok(None) => {}
        Err(error) => {
            warn!(%error, "player introspection failed");
        }
    }

    Err(ScoutError::StreamNotFound)
}

fn resolved_from(url: String, format: StreamFormat, config: &ScoutConfig) -> ResolvedStream {
    let validity = chrono::Duration::from_std(config.stream_validity)
        .unwrap_or_else(|_| chrono::Duration::minutes(10));
    ResolvedStream {
        url,
        format,
        expires_at: Utc::now() + validity,
    }
}

/// Wait up to `window` for the first intercepted response that classifies
/// as a playable hls/mp4 stream. Polled in `poll`-sized slices so an idle
/// channel cannot hold the pipeline past its window.
async fn await_intercepted_stream(
    session: &mut dyn PageSession,
    window: Duration,
    poll: Duration,
) -> Option<StreamCandidate> {
    let deadline = Instant::now() + window;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        let slice = poll.min(deadline - now);
        match tokio::time::timeout(slice, session.responses().recv()).await {
            Ok(Some(obs)) => {
                if let Some(candidate) = classify_response(&obs, Strictness::SingleStream) {
                    if matches!(candidate.format, StreamFormat::Hls | StreamFormat::Mp4) {
                        return Some(candidate);
                    }
                }
            }
            // Session torn down; nothing more will arrive.
            Ok(None) => return None,
            // Slice elapsed without traffic; re-check the deadline.
            Err(_) => {}
        }
    }
}

/// Collect every stream candidate reachable from a sports event page.
///
/// Accumulates across passive interception and the content scanners, then
/// serially deep-probes candidates that are themselves pages, up to
/// `max_probe_depth` levels past the event page. Per-candidate failures
/// are tolerated; only the initial event-page navigation is fatal.
#[instrument(skip(engine, profile, config), fields(site = profile.host))]
pub async fn collect_event_streams(
    engine: &dyn BrowserEngine,
    profile: &'static SportsProfile,
    event_url: &str,
    config: &ScoutConfig,
) -> Result<Vec<StreamCandidate>> {
    let mut found: Vec<StreamCandidate> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(event_url.to_string());

    let ctx = HttpContext::for_probe(event_url);
    let mut session = engine.open(&ctx, profile.block_policy()).await?;

    let scanned = async {
        session
            .navigate(event_url, config.listing_timeout)
            .await?;
        accumulate_intercepted(
            session.as_mut(),
            config.sports_intercept_wait,
            config.intercept_poll,
            &mut found,
            0,
            None,
        )
        .await;
        session.html().await
    }
    .await;
    session.close().await;
    let html = scanned?;

    let mut probe_targets: Vec<StreamCandidate> = Vec::new();
    for candidate in scan_page(&html, event_url, Some(profile), 0) {
        if candidate.is_probe_target() {
            probe_targets.push(candidate.clone());
        }
        push_unique(&mut found, candidate);
    }

    for target in probe_targets {
        probe_candidate(
            engine,
            profile,
            event_url,
            target,
            1,
            config,
            &mut visited,
            &mut found,
        )
        .await;
    }

    debug!(candidates = found.len(), "event stream collection complete");
    Ok(found)
}

/// Probe one candidate page for further streams, recursing into pages it
/// reveals. Bounded by the depth cap and the visited set; every session is
/// closed before its children are probed.
#[allow(clippy::too_many_arguments)]
fn probe_candidate<'a>(
    engine: &'a dyn BrowserEngine,
    profile: &'static SportsProfile,
    parent_url: &'a str,
    target: StreamCandidate,
    level: u8,
    config: &'a ScoutConfig,
    visited: &'a mut HashSet<String>,
    found: &'a mut Vec<StreamCandidate>,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        if level > config.max_probe_depth || !visited.insert(target.url.clone()) {
            return;
        }

        let timeout = if level > 1 {
            config.deep_probe_timeout
        } else {
            config.probe_timeout
        };

        let ctx = HttpContext::for_probe(parent_url);
        let mut session = match engine.open(&ctx, profile.block_policy()).await {
            Ok(session) => session,
            Err(error) => {
                warn!(url = %target.url, %error, "probe session open failed");
                return;
            }
        };

        let scanned = async {
            session.navigate(&target.url, timeout).await?;
            accumulate_intercepted(
                session.as_mut(),
                config.sports_intercept_wait,
                config.intercept_poll,
                found,
                level,
                target.name.as_deref(),
            )
            .await;
            let player_files = session
                .evaluate_string(JWPLAYER_INSTANCES_QUERY)
                .await
                .ok()
                .flatten();
            let html = session.html().await?;
            Ok::<_, ScoutError>((html, player_files))
        }
        .await;
        session.close().await;

        let (html, player_files) = match scanned {
            Ok(scanned) => scanned,
            Err(error) => {
                warn!(url = %target.url, %error, "probe failed");
                return;
            }
        };

        for url in parse_player_files(player_files) {
            let mut candidate =
                StreamCandidate::new(url.clone(), infer_format(&url), CandidateOrigin::PlayerState)
                    .at_level(level);
            if let Some(name) = &target.name {
                candidate = candidate.with_name(name.clone());
            }
            push_unique(found, candidate);
        }

        let mut nested: Vec<StreamCandidate> = Vec::new();
        for candidate in scan_page(&html, &target.url, Some(profile), level) {
            let candidate = match (&candidate.name, &target.name) {
                (None, Some(name)) => candidate.with_name(name.clone()),
                _ => candidate,
            };
            if candidate.is_probe_target() {
                nested.push(candidate.clone());
            }
            push_unique(found, candidate);
        }

        for child in nested {
            probe_candidate(
                engine,
                profile,
                &target.url,
                child,
                level + 1,
                config,
                visited,
                found,
            )
            .await;
        }
    })
}

/// Drain the session's response channel for the full window, keeping every
/// response the multi-candidate classifier accepts.
async fn accumulate_intercepted(
    session: &mut dyn PageSession,
    window: Duration,
    poll: Duration,
    found: &mut Vec<StreamCandidate>,
    level: u8,
    label: Option<&str>,
) {
    let deadline = Instant::now() + window;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let slice = poll.min(deadline - now);
        match tokio::time::timeout(slice, session.responses().recv()).await {
            Ok(Some(obs)) => {
                if let Some(candidate) = classify_response(&obs, Strictness::MultiCandidate) {
                    let mut candidate = candidate.at_level(level);
                    if let Some(label) = label {
                        candidate = candidate.with_name(label.to_string());
                    }
                    push_unique(found, candidate);
                }
            }
            Ok(None) => return,
            Err(_) => {}
        }
    }
}

/// Navigate a fresh session to a listing page and return its DOM, closing
/// the session on every path.
pub async fn fetch_page_html(
    engine: &dyn BrowserEngine,
    ctx: &HttpContext,
    policy: BlockPolicy,
    url: &str,
    timeout: Duration,
) -> Result<String> {
    let mut session = engine.open(ctx, policy).await?;
    let outcome = async {
        session.navigate(url, timeout).await?;
        session.html().await
    }
    .await;
    session.close().await;
    outcome
}
