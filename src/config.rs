//! Process configuration (`SPEC_FULL.md` §10.3 / `spec.md` §6). Loaded from
//! environment variables, optionally seeded from a `.env` file via
//! `dotenvy` — the same crate `danialbka-worldcup-moneyball-analysis-tool`
//! uses for this in the retrieval pack. Unknown keys are ignored; every key
//! here has a default, so `Config::load` cannot fail on a merely-incomplete
//! environment.

use std::{env, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    File,
    EdgeSql,
    RowStore,
}

impl DbType {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Some(Self::File),
            "edgesql" => Some(Self::EdgeSql),
            "rowstore" => Some(Self::RowStore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_type: DbType,
    pub data_dir: PathBuf,
    pub cache_ttl: Duration,
    pub refresh_cooldown: Duration,
    pub widget_url: String,
    pub scraper_headless: bool,
    pub host_identifier: String,
    pub edgesql_url: Option<String>,
    pub edgesql_auth_token: Option<String>,
    pub rowstore_url: Option<String>,
    pub upstream_api_url: String,
    pub upstream_host_fragment: String,
    pub group_concurrency: usize,
}

const DEFAULT_WIDGET_URL: &str = "https://widgets.basketball-upstream.example/embed";
const DEFAULT_UPSTREAM_API_URL: &str = "https://api.basketball-upstream.example";
const DEFAULT_UPSTREAM_HOST_FRAGMENT: &str = "basketball-upstream.example";

impl Default for Config {
    fn default() -> Self {
        Self {
            db_type: DbType::File,
            data_dir: PathBuf::from("./data"),
            cache_ttl: Duration::from_secs(10_080 * 60),
            refresh_cooldown: Duration::from_secs(300),
            widget_url: DEFAULT_WIDGET_URL.to_owned(),
            scraper_headless: true,
            host_identifier: "courtsync.example".to_owned(),
            edgesql_url: None,
            edgesql_auth_token: None,
            rowstore_url: None,
            upstream_api_url: DEFAULT_UPSTREAM_API_URL.to_owned(),
            upstream_host_fragment: DEFAULT_UPSTREAM_HOST_FRAGMENT.to_owned(),
            group_concurrency: crate::scraper::DEFAULT_GROUP_CONCURRENCY,
        }
    }
}

impl Config {
    /// Loads a `.env` file if present (ignored if missing — dotenvy's usual
    /// contract) then reads the recognized environment variables, falling
    /// back to defaults for anything unset.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Ok(v) = env::var("DB_TYPE") {
            if let Some(db_type) = DbType::parse(&v) {
                config.db_type = db_type;
            } else {
                log::warn!("ignoring unrecognized DB_TYPE={v:?}, keeping default");
            }
        }
        if let Ok(v) = env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("CACHE_TTL_MINUTES") {
            match v.parse::<u64>() {
                Ok(minutes) => config.cache_ttl = Duration::from_secs(minutes * 60),
                Err(_) => log::warn!("ignoring unparseable CACHE_TTL_MINUTES={v:?}"),
            }
        }
        if let Ok(v) = env::var("REFRESH_COOLDOWN_SECONDS") {
            match v.parse::<u64>() {
                Ok(secs) => config.refresh_cooldown = Duration::from_secs(secs),
                Err(_) => log::warn!("ignoring unparseable REFRESH_COOLDOWN_SECONDS={v:?}"),
            }
        }
        if let Ok(v) = env::var("WIDGET_URL") {
            config.widget_url = v;
        }
        if let Ok(v) = env::var("SCRAPER_HEADLESS") {
            config.scraper_headless = !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "no");
        }
        if let Ok(v) = env::var("COURTSYNC_HOST_IDENTIFIER") {
            config.host_identifier = v;
        }
        config.edgesql_url = env::var("EDGESQL_URL").ok();
        config.edgesql_auth_token = env::var("EDGESQL_AUTH_TOKEN").ok();
        config.rowstore_url = env::var("ROWSTORE_URL").ok();
        if let Ok(v) = env::var("UPSTREAM_API_URL") {
            config.upstream_api_url = v;
        }
        if let Ok(v) = env::var("UPSTREAM_HOST_FRAGMENT") {
            config.upstream_host_fragment = v;
        }
        if let Ok(v) = env::var("SCRAPE_GROUP_CONCURRENCY") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => config.group_concurrency = n,
                _ => log::warn!("ignoring unparseable SCRAPE_GROUP_CONCURRENCY={v:?}"),
            }
        }
        config
    }

    /// `{DATA_DIR}/basketball.db` — the persisted-state layout from
    /// `spec.md` §6.
    pub fn file_db_path(&self) -> PathBuf {
        self.data_dir.join("basketball.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_type_parse_is_case_insensitive() {
        assert_eq!(DbType::parse("FILE"), Some(DbType::File));
        assert_eq!(DbType::parse("EdgeSql"), Some(DbType::EdgeSql));
        assert_eq!(DbType::parse("rowstore"), Some(DbType::RowStore));
        assert_eq!(DbType::parse("bogus"), None);
    }

    #[test]
    fn default_cache_ttl_is_one_week() {
        let config = Config::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(7 * 24 * 60 * 60));
    }
}
