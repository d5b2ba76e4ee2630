//! Ingest-and-cache subsystem and filtered iCalendar generator for Israeli
//! basketball fixtures (`spec.md` §1). This crate is the core the spec
//! describes; the HTTP router's process wiring lives in `main`/`scrape_main`
//! so it can be exercised from integration tests without booting Rocket.

// `clap`, `anyhow`, and `env_logger` are process-entry-point concerns used
// only by the `courtsync`/`courtsync-scrape` binaries (`src/main.rs`,
// `src/scrape_main.rs`), not by this library target.
#![allow(unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod harvester;
pub mod http;
pub mod ics_gen;
pub mod model;
pub mod query;
pub mod refresh;
pub mod scraper;
pub mod store;
pub mod upstream;
