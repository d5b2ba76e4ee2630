//! Token harvester (`spec.md` §4.C). The only component aware that a
//! browser exists; `scraper`/`upstream` only ever see an opaque token
//! string. Driven by `chromiumoxide`, a tokio-native CDP client — the
//! closest fit to "a scripted browser automation runtime... exposing
//! network-response interception" (`DESIGN.md`; no crate in the corpus
//! itself performs browser automation).

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, cdp::browser_protocol::network::EventRequestWillBeSent};
use futures::{FutureExt, StreamExt, future::Shared};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Token(pub String);

/// A capability, not a hardcoded dependency: orchestrator code depends on
/// this trait (`spec.md` §9's "browser automation is a capability"
/// redesign note), not on `ChromiumTokenHarvester` directly.
#[async_trait]
pub trait TokenHarvester: Send + Sync {
    async fn acquire_token(&self, timeout: Duration) -> Result<Token>;
}

type PendingToken = Shared<futures::future::BoxFuture<'static, std::result::Result<Token, String>>>;

/// Drives a headless Chromium instance. A single in-flight acquisition is
/// shared by every caller that joins during its lifetime (`spec.md` §4.C);
/// the browser itself is scoped with an RAII guard so it's torn down on
/// every exit path, mirroring the teacher's single-pending-future idiom in
/// `util::sync` (`ArcRwLock`/shared-future guards over a mutex).
pub struct ChromiumTokenHarvester {
    widget_url: String,
    upstream_host_fragment: String,
    headless: bool,
    pending: Mutex<Option<PendingToken>>,
}

impl ChromiumTokenHarvester {
    pub fn new(widget_url: impl Into<String>, upstream_host_fragment: impl Into<String>, headless: bool) -> Self {
        Self { widget_url: widget_url.into(), upstream_host_fragment: upstream_host_fragment.into(), headless, pending: Mutex::new(None) }
    }

    async fn run_once(widget_url: String, upstream_host_fragment: String, headless: bool, timeout: Duration) -> std::result::Result<Token, String> {
        let config = BrowserConfig::builder()
            .request_timeout(timeout)
            .with_head_if(!headless)
            .build()
            .map_err(|e| e.to_string())?;
        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| e.to_string())?;
        // RAII-ish: this handle task is dropped (and the browser process
        // killed) on every return path out of this function, including the
        // `?`-style early returns below via `result` being matched instead.
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let result: std::result::Result<Token, String> = async {
            let page = browser.new_page("about:blank").await.map_err(|e| e.to_string())?;
            let mut requests = page
                .event_listener::<EventRequestWillBeSent>()
                .await
                .map_err(|e| e.to_string())?;
            page.goto(&widget_url).await.map_err(|e| e.to_string())?;

            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    return Err("timed out waiting for upstream network request".to_owned());
                }
                let event = match tokio::time::timeout(remaining, requests.next()).await {
                    Ok(Some(event)) => event,
                    Ok(None) => return Err("page closed before a token could be intercepted".to_owned()),
                    Err(_) => return Err("timed out waiting for upstream network request".to_owned()),
                };
                if !event.request.url.contains(&upstream_host_fragment) {
                    continue;
                }
                let auth = event
                    .request
                    .headers
                    .inner
                    .get("Authorization")
                    .or_else(|| event.request.headers.inner.get("authorization"));
                if let Some(auth) = auth.and_then(|v| v.as_str()) {
                    return Ok(Token(auth.to_owned()));
                }
            }
        }
        .await;

        handler_task.abort();
        let _ = browser.close().await;
        let _ = browser.wait().await;
        result
    }
}

#[async_trait]
impl TokenHarvester for ChromiumTokenHarvester {
    async fn acquire_token(&self, timeout: Duration) -> Result<Token> {
        let mut guard = self.pending.lock().await;
        let shared = if let Some(existing) = guard.as_ref() {
            existing.clone()
        } else {
            let widget_url = self.widget_url.clone();
            let host_fragment = self.upstream_host_fragment.clone();
            let headless = self.headless;
            let fut: futures::future::BoxFuture<'static, std::result::Result<Token, String>> =
                Self::run_once(widget_url, host_fragment, headless, timeout).boxed();
            let shared: PendingToken = fut.shared();
            *guard = Some(shared.clone());
            shared
        };
        drop(guard);
        let outcome = shared.await;
        // Clear the slot so the *next* caller starts a fresh acquisition
        // instead of replaying this (possibly stale) result forever.
        let mut guard = self.pending.lock().await;
        *guard = None;
        drop(guard);
        outcome.map_err(Error::TokenAcquisitionFailed)
    }
}

/// Cheaply-cloned handle so `scraper` can hold the harvester behind an
/// `Arc<dyn TokenHarvester>` without caring about the concrete driver.
pub type SharedHarvester = Arc<dyn TokenHarvester>;
