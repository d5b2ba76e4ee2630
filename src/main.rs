//! HTTP process entry point (`spec.md` §6's operation table over Rocket).
//! Builds the store and refresh controller once at startup and hands them
//! to Rocket as managed state, per the "singletons → explicit instances"
//! redesign note (`spec.md` §9) — nothing here is a `static`.

// The crate-level dependency table is shared by the library and both
// binaries; this entry point only uses a handful of them directly and
// reaches the rest through `courtsync::*`, which the lint can't see.
#![allow(unused_crate_dependencies)]

use std::sync::Arc;

use clap::Parser;
use courtsync::{
    config::Config,
    harvester::ChromiumTokenHarvester,
    http::{self, AppState},
    refresh::RefreshController,
    scraper::Scraper,
    store,
    upstream::UpstreamClient,
};

/// Process-level overrides layered on top of `Config::load`'s environment
/// variables (`spec.md` §6). Neither flag is part of the spec's
/// configuration table; both are escape hatches for local runs, so an
/// unset flag always falls back to the env/default value untouched.
#[derive(clap::Parser)]
struct Args {
    /// Overrides `ROCKET_PORT` for this run only.
    #[clap(long)]
    port: Option<u16>,
    /// Skip the empty-store auto-scrape on boot (useful when iterating on
    /// the HTTP surface against a store seeded by `courtsync-scrape`).
    #[clap(long)]
    no_auto_scrape: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::load();
    log::info!("starting courtsync with db_type={:?}", config.db_type);

    let store = store::open_store(&config).await?;

    let upstream = UpstreamClient::with_origin(config.upstream_api_url.clone(), &config.widget_url)?;
    let harvester: Arc<dyn courtsync::harvester::TokenHarvester> = Arc::new(ChromiumTokenHarvester::new(
        config.widget_url.clone(),
        config.upstream_host_fragment.clone(),
        config.scraper_headless,
    ));
    let scraper = Scraper::new(upstream, harvester).with_group_concurrency(config.group_concurrency);
    let refresh = RefreshController::new(scraper, config.refresh_cooldown, config.cache_ttl);

    // An empty store on boot gets a scrape started immediately, bypassing
    // the manual-refresh cooldown but not the single-writer invariant
    // (`spec.md` §4.E).
    if !args.no_auto_scrape && store.list_seasons().await?.is_empty() {
        log::info!("store is empty at boot, starting an initial scrape");
        refresh.start_unconditionally(Arc::clone(&store)).await;
    }

    let state = AppState { store, refresh, config };

    let mut rocket_config = rocket::Config::default();
    if let Some(port) = args.port {
        rocket_config.port = port;
    }

    let _rocket = rocket::custom(rocket_config)
        .manage(state)
        .mount("/", http::routes())
        .launch()
        .await?;

    Ok(())
}
