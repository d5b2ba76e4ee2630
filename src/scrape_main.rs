//! One-shot ingest entry point: runs a single scrape pass to completion and
//! exits, for callers that want to seed/refresh the store from a cron job
//! or a deploy hook rather than the long-running `courtsync` HTTP process.
//! Mirrors the teacher's split between a long-running server binary and a
//! standalone ingest binary (`beiju-mmoldb`'s `main`/`ingest_main` pair).

// See `main.rs`: the shared dependency table means most crates are only
// used transitively through `courtsync::*`, not directly in this binary.
#![allow(unused_crate_dependencies)]

use std::sync::Arc;

use clap::Parser;
use courtsync::{
    config::Config, harvester::ChromiumTokenHarvester, scraper::{ScrapeProgress, Scraper}, store, upstream::UpstreamClient,
};

#[derive(clap::Parser)]
struct Args {
    /// Overrides `SCRAPE_GROUP_CONCURRENCY` for this run only.
    #[clap(long)]
    group_concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::load();
    log::info!("running one-shot scrape with db_type={:?}", config.db_type);

    let store = store::open_store(&config).await?;

    let upstream = UpstreamClient::with_origin(config.upstream_api_url.clone(), &config.widget_url)?;
    let harvester: Arc<dyn courtsync::harvester::TokenHarvester> = Arc::new(ChromiumTokenHarvester::new(
        config.widget_url.clone(),
        config.upstream_host_fragment.clone(),
        config.scraper_headless,
    ));
    let concurrency = args.group_concurrency.unwrap_or(config.group_concurrency);
    let scraper = Scraper::new(upstream, harvester).with_group_concurrency(concurrency);

    let (progress_tx, mut progress_rx) = tokio::sync::watch::channel(ScrapeProgress::default());
    let watcher = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let p = progress_rx.borrow().clone();
            if p.groups_total > 0 {
                log::info!("progress: {}/{} groups ({:?})", p.groups_done, p.groups_total, p.current_season);
            }
        }
    });

    let result = scraper.run(store.as_ref(), progress_tx).await;
    watcher.abort();

    match result {
        Ok(()) => {
            log::info!("scrape completed successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("scrape failed: {e}");
            Err(e.into())
        }
    }
}
