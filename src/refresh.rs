//! Refresh controller (`spec.md` §4.E): a process-wide singleton re-modeled
//! as an explicit struct per §9's redesign note, constructed once at
//! process start and shared via `Arc`/`rocket::State` rather than a
//! `static`. Its `{scraping, last_completed_at, last_error,
//! cooldown_deadline}` tuple lives behind one `tokio::sync::Mutex`; nothing
//! mutates it outside that lock.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, watch};

use crate::{
    error::Result,
    scraper::{ScrapeProgress, Scraper},
    store::Store,
};

#[derive(Debug, Clone, Default)]
struct RefreshState {
    scraping: bool,
    last_completed_at: Option<DateTime<Utc>>,
    last_started_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Started,
    InProgress,
    RateLimited { retry_after_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct RefreshStatus {
    pub is_scraping: bool,
    pub last_error: Option<String>,
    pub progress: Option<ScrapeProgress>,
}

#[derive(Debug, Clone)]
pub struct CacheInfo {
    pub exists: bool,
    pub stale: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
}

pub struct RefreshController {
    state: Mutex<RefreshState>,
    idle_notify: Notify,
    progress_tx: watch::Sender<ScrapeProgress>,
    progress_rx: watch::Receiver<ScrapeProgress>,
    cooldown: Duration,
    ttl: Duration,
    scraper: Scraper,
}

impl RefreshController {
    pub fn new(scraper: Scraper, cooldown: Duration, ttl: Duration) -> Arc<Self> {
        let (progress_tx, progress_rx) = watch::channel(ScrapeProgress::default());
        Arc::new(Self {
            state: Mutex::new(RefreshState::default()),
            idle_notify: Notify::new(),
            progress_tx,
            progress_rx,
            cooldown,
            ttl,
            scraper,
        })
    }

    pub async fn is_scraping(&self) -> bool {
        self.state.lock().await.scraping
    }

    pub async fn last_completed_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_completed_at
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    pub async fn is_stale(&self) -> bool {
        match self.last_completed_at().await {
            Some(at) => Utc::now().signed_duration_since(at).to_std().map(|d| d > self.ttl).unwrap_or(true),
            None => true,
        }
    }

    pub async fn status(&self) -> RefreshStatus {
        let state = self.state.lock().await;
        RefreshStatus {
            is_scraping: state.scraping,
            last_error: state.last_error.clone(),
            progress: state.scraping.then(|| self.progress_rx.borrow().clone()),
        }
    }

    pub async fn cache_info(&self, store: &dyn Store) -> Result<CacheInfo> {
        let last_updated = self.last_completed_at().await;
        let exists = last_updated.is_some() || !store.list_seasons().await?.is_empty();
        Ok(CacheInfo { exists, stale: self.is_stale().await, last_updated, size_bytes: store.database_size_bytes().await? })
    }

    /// `requestRefresh()` (`spec.md` §4.E). Honors the single-writer
    /// invariant and the cooldown on user-initiated requests; callers that
    /// need to bypass the cooldown (e.g. an empty store at boot) should use
    /// [`Self::start_unconditionally`] instead.
    pub async fn request_refresh(self: &Arc<Self>, store: Arc<dyn Store>) -> RefreshOutcome {
        {
            let mut state = self.state.lock().await;
            if state.scraping {
                return RefreshOutcome::InProgress;
            }
            if let Some(started) = state.last_started_at {
                let elapsed = Utc::now().signed_duration_since(started).to_std().unwrap_or_default();
                if elapsed < self.cooldown {
                    let remaining = self.cooldown - elapsed;
                    return RefreshOutcome::RateLimited { retry_after_secs: remaining.as_secs() };
                }
            }
            state.scraping = true;
            state.last_started_at = Some(Utc::now());
        }
        self.spawn_scrape(store);
        RefreshOutcome::Started
    }

    /// Bypasses the cooldown but not the single-writer invariant
    /// (`spec.md` §4.E: "a scrape started automatically... bypasses the
    /// cooldown but still honors the single-writer invariant").
    pub async fn start_unconditionally(self: &Arc<Self>, store: Arc<dyn Store>) -> RefreshOutcome {
        {
            let mut state = self.state.lock().await;
            if state.scraping {
                return RefreshOutcome::InProgress;
            }
            state.scraping = true;
            state.last_started_at = Some(Utc::now());
        }
        self.spawn_scrape(store);
        RefreshOutcome::Started
    }

    fn spawn_scrape(self: &Arc<Self>, store: Arc<dyn Store>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            log::info!("scrape starting");
            let result = controller.scraper.run(store.as_ref(), controller.progress_tx.clone()).await;
            let mut state = controller.state.lock().await;
            state.scraping = false;
            match result {
                Ok(()) => {
                    state.last_completed_at = Some(Utc::now());
                    state.last_error = None;
                    log::info!("scrape completed");
                }
                Err(e) => {
                    state.last_error = Some(e.to_string());
                    log::error!("scrape failed: {e}");
                }
            }
            drop(state);
            controller.idle_notify.notify_waiters();
        });
    }

    /// For tests: blocks until the controller returns to `Idle`. Registers
    /// interest in the next notification *before* checking the flag so a
    /// `notify_waiters` landing between the check and the await isn't lost.
    pub async fn await_idle(&self) {
        loop {
            let notified = self.idle_notify.notified();
            if !self.is_scraping().await {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_outcome_carries_retry_after() {
        let outcome = RefreshOutcome::RateLimited { retry_after_secs: 42 };
        assert_eq!(outcome, RefreshOutcome::RateLimited { retry_after_secs: 42 });
    }
}
