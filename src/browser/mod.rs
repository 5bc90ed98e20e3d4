//! The injected browser capability.
//!
//! The pipeline never talks to an automation library directly; it drives a
//! narrow session interface (open / navigate / observe / evaluate / close)
//! that the chromiumoxide implementation in [`chrome`] satisfies, and that
//! tests satisfy with scripted stubs. One [`BrowserEngine`] owns one native
//! browser process; one [`PageSession`] owns one page inside it. Closing is
//! explicit and must run on every exit path — sessions are scoped
//! acquisitions, not ambient state.

pub mod chrome;
pub mod locate;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::classify::ResponseObservation;
use crate::error::Result;
use crate::provider::HttpContext;

/// One page within a running browser.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate, honoring `timeout`. Timeout maps to `NavigationTimeout`,
    /// any other failure to `NavigationError`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Channel of network responses observed on this page, in arrival
    /// order. Responses received before the first poll are buffered.
    fn responses(&mut self) -> &mut mpsc::UnboundedReceiver<ResponseObservation>;

    /// Evaluate a JavaScript expression, deserializing its completion value
    /// as an optional string. Evaluation faults surface as `None` — a page
    /// without the queried player is not an error.
    async fn evaluate_string(&self, expression: &str) -> Result<Option<String>>;

    /// Current serialized DOM of the page.
    async fn html(&self) -> Result<String>;

    /// Release the page. Infallible by design; failures are logged.
    async fn close(self: Box<Self>);
}

/// Which request classes a page refuses at the network layer.
///
/// Cosmetic resources never influence stream discovery, so both policies
/// drop them. The aggressive policy additionally drops uncategorized
/// traffic, which on embed hosts is dominated by ad beacons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPolicy {
    /// Block images, stylesheets and fonts.
    Cosmetic,
    /// Block images, stylesheets, fonts and uncategorized requests.
    Aggressive,
}

/// One running browser process.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a page presenting `ctx` (user agent, referer, origin) with the
    /// given resource-blocking policy applied.
    async fn open(&self, ctx: &HttpContext, policy: BlockPolicy)
        -> Result<Box<dyn PageSession>>;

    /// Tear the browser down, releasing the native process.
    async fn shutdown(self: Box<Self>);
}

/// Launches browser engines; the seam a test harness replaces.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>>;
}
