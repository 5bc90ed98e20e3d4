//! chromiumoxide-backed browser engine.
//!
//! Each launched engine owns one headless Chrome process plus the handler
//! task that pumps its CDP connection. Pages are opened with a fixed
//! desktop identity, per-context extra headers, and fetch-layer request
//! interception that drops resources the block policy names.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, ErrorReason, EventResponseReceived, Headers, ResourceType, SetExtraHttpHeadersParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{BlockPolicy, BrowserEngine, EngineLauncher, PageSession};
use crate::classify::ResponseObservation;
use crate::error::{Result, ScoutError};
use crate::provider::HttpContext;

/// Desktop identity presented to every page.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Flags required for headless operation inside containers.
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

/// Launches headless Chrome processes from a discovered executable.
pub struct ChromeLauncher {
    executable: PathBuf,
}

impl ChromeLauncher {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl EngineLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>> {
        let mut builder = BrowserConfig::builder().chrome_executable(self.executable.clone());
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        let config = builder.build().map_err(ScoutError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScoutError::Browser(format!("chrome launch failed: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!(executable = %self.executable.display(), "chrome launched");
        Ok(Box::new(ChromeEngine {
            browser,
            handler_task,
        }))
    }
}

struct ChromeEngine {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn open(
        &self,
        ctx: &HttpContext,
        policy: BlockPolicy,
    ) -> Result<Box<dyn PageSession>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScoutError::Browser(format!("new page failed: {e}")))?;

        page.set_user_agent(SetUserAgentOverrideParams::new(USER_AGENT))
            .await
            .map_err(|e| ScoutError::Browser(e.to_string()))?;

        apply_extra_headers(&page, ctx).await?;
        let block_task = install_interception(&page, policy).await?;
        let (rx, forward_task) = install_response_forwarding(&page).await?;

        Ok(Box::new(ChromePage {
            page,
            rx,
            block_task,
            forward_task,
        }))
    }

    async fn shutdown(mut self: Box<Self>) {
        if let Err(error) = self.browser.close().await {
            debug!(%error, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

/// Attach the context's Referer/Origin headers to every request the page
/// makes.
async fn apply_extra_headers(page: &Page, ctx: &HttpContext) -> Result<()> {
    let mut headers = serde_json::Map::new();
    headers.insert(
        "Referer".into(),
        serde_json::Value::String(ctx.referer.clone()),
    );
    headers.insert(
        "Origin".into(),
        serde_json::Value::String(ctx.origin.clone()),
    );

    page.execute(network::EnableParams::default())
        .await
        .map_err(|e| ScoutError::Browser(e.to_string()))?;
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(
        serde_json::Value::Object(headers),
    )))
    .await
    .map_err(|e| ScoutError::Browser(e.to_string()))?;
    Ok(())
}

/// Enable fetch-layer interception and spawn the task that vets every
/// paused request against `policy`. The listener must be registered before
/// interception is enabled or early requests stall unanswered.
async fn install_interception(page: &Page, policy: BlockPolicy) -> Result<JoinHandle<()>> {
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| ScoutError::Browser(e.to_string()))?;

    page.execute(
        fetch::EnableParams::builder()
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Request)
                    .build(),
            )
            .build(),
    )
    .await
    .map_err(|e| ScoutError::Browser(e.to_string()))?;

    let vet_page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let blocked = match event.resource_type {
                ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font => true,
                ResourceType::Other => policy == BlockPolicy::Aggressive,
                _ => false,
            };
            let request_id = event.request_id.clone();
            let outcome = if blocked {
                trace!(url = %event.request.url, "blocked request");
                vet_page
                    .execute(FailRequestParams::new(request_id, ErrorReason::BlockedByClient))
                    .await
                    .map(|_| ())
            } else {
                vet_page
                    .execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ())
            };
            if outcome.is_err() {
                break;
            }
        }
    }))
}

/// Forward every observed network response into an unbounded channel the
/// pipeline drains on its own schedule.
async fn install_response_forwarding(
    page: &Page,
) -> Result<(mpsc::UnboundedReceiver<ResponseObservation>, JoinHandle<()>)> {
    let mut events = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| ScoutError::Browser(e.to_string()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if tx.send(observation_from(&event.response)).is_err() {
                break;
            }
        }
    });
    Ok((rx, task))
}

fn observation_from(response: &network::Response) -> ResponseObservation {
    let mut content_type = if response.mime_type.is_empty() {
        None
    } else {
        Some(response.mime_type.to_lowercase())
    };
    let mut content_length = None;

    if let Some(map) = response.headers.inner().as_object() {
        for (name, value) in map {
            match name.to_ascii_lowercase().as_str() {
                "content-type" => {
                    if let Some(s) = value.as_str() {
                        content_type = Some(s.to_lowercase());
                    }
                }
                "content-length" => {
                    content_length = value.as_str().and_then(|s| s.trim().parse().ok());
                }
                _ => {}
            }
        }
    }

    ResponseObservation {
        url: response.url.clone(),
        status: u16::try_from(response.status).unwrap_or(0),
        content_type,
        content_length,
    }
}

struct ChromePage {
    page: Page,
    rx: mpsc::UnboundedReceiver<ResponseObservation>,
    block_task: JoinHandle<()>,
    forward_task: JoinHandle<()>,
}

#[async_trait]
impl PageSession for ChromePage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScoutError::NavigationError {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ScoutError::NavigationTimeout {
                url: url.to_string(),
            }),
        }
    }

    fn responses(&mut self) -> &mut mpsc::UnboundedReceiver<ResponseObservation> {
        &mut self.rx
    }

    async fn evaluate_string(&self, expression: &str) -> Result<Option<String>> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| ScoutError::Browser(e.to_string()))?;
        Ok(result.into_value::<Option<String>>().unwrap_or(None))
    }

    async fn html(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScoutError::Browser(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        let this = *self;
        this.block_task.abort();
        this.forward_task.abort();
        if let Err(error) = this.page.close().await {
            debug!(%error, "page close failed");
        }
    }
}
