//! Typed client for the upstream basketball JSON API (`spec.md` §4.B).
//! Every call carries the harvested bearer token and the widget page's
//! `Origin` header; without the latter the upstream rejects the request
//! outright, which is the entire reason `harvester` exists.
//!
//! Every list-shaped endpoint is parsed twice: once into a typed DTO (for
//! the denormalized columns the store indexes) and once kept as the raw
//! `serde_json::Value` it came from, so `scraper` can populate each
//! entity's `raw` column (`spec.md` §3, `SPEC_FULL.md` §3/§10.4) instead of
//! discarding the upstream payload after extracting the fields this crate
//! happens to care about.

use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value as Json;

use crate::error::{Error, Result};

const UPSTREAM_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompetitionDto {
    pub id: String,
    #[serde(rename = "seasonId")]
    pub season_id: String,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<GroupDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchDto {
    pub id: String,
    #[serde(rename = "homeTeamId")]
    pub home_team_id: Option<String>,
    #[serde(rename = "homeTeamName")]
    pub home_team_name: Option<String>,
    #[serde(rename = "awayTeamId")]
    pub away_team_id: Option<String>,
    #[serde(rename = "awayTeamName")]
    pub away_team_name: Option<String>,
    pub date: String,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    pub status: String,
    #[serde(rename = "homeScore")]
    pub home_score: Option<u32>,
    #[serde(rename = "awayScore")]
    pub away_score: Option<u32>,
    pub venue: Option<String>,
    #[serde(rename = "venueAddress")]
    pub venue_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RoundDto {
    #[serde(default)]
    matches: Vec<Json>,
}

#[derive(Debug, Clone, Deserialize)]
struct CalendarDto {
    #[serde(default)]
    rounds: Vec<RoundDto>,
}

/// Standings are fetched and stored but ignored by the query layer, per
/// `spec.md` §4.B — the shape isn't narrowed further than "opaque JSON".
pub type StandingsDto = Json;

pub struct UpstreamClient {
    http: Client,
    base_url: String,
}

impl UpstreamClient {
    /// Pins the `Origin` header the upstream requires on every call
    /// (`spec.md` §4.B). A constructor parameter, not a global — consistent
    /// with the "singletons → explicit instances" redesign note.
    pub fn with_origin(base_url: impl Into<String>, origin: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ORIGIN, header::HeaderValue::from_str(origin).map_err(|_| Error::InvalidFilter("invalid origin".into()))?);
        let http = Client::builder()
            .timeout(UPSTREAM_CALL_TIMEOUT)
            .default_headers(headers)
            .build()?;
        Ok(Self { http, base_url: base_url.into() })
    }

    /// Fetches `path` and returns the raw JSON body, unparsed. Every typed
    /// accessor below builds on this so the original payload is always
    /// available to pair with the typed DTO it's parsed into.
    async fn get_json_value(&self, path: &str, token: &str) -> Result<Json> {
        let url = format!("{}{path}", self.base_url);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .send()
                .await;
            let response = match response {
                Ok(r) => r,
                Err(e) if attempt < MAX_RETRIES => {
                    log::warn!("upstream call to {path} failed ({e}), retrying (attempt {attempt})");
                    tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt))).await;
                    continue;
                }
                Err(e) => return Err(Error::UpstreamUnreachable(e.to_string())),
            };
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                return Err(Error::AuthExpired);
            }
            if status.is_server_error() && attempt < MAX_RETRIES {
                log::warn!("upstream call to {path} returned {status}, retrying (attempt {attempt})");
                tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt))).await;
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::UpstreamRejected { status: status.as_u16(), body });
            }
            return response.json::<Json>().await.map_err(Error::Reqwest);
        }
    }

    /// Parses a JSON array into `(typed, raw)` pairs, keeping each element's
    /// original `Value` alongside its typed DTO. A malformed element
    /// surfaces as `UpstreamRejected` rather than silently dropping rows,
    /// matching `get_json`'s old whole-response behavior.
    fn parse_array<T: DeserializeOwned>(path: &str, value: Json) -> Result<Vec<(T, Json)>> {
        let Json::Array(items) = value else {
            return Err(Error::UpstreamRejected { status: 0, body: format!("{path}: expected a JSON array") });
        };
        items
            .into_iter()
            .map(|item| {
                let typed: T = serde_json::from_value(item.clone())
                    .map_err(|e| Error::UpstreamRejected { status: 0, body: format!("{path}: {e}") })?;
                Ok((typed, item))
            })
            .collect()
    }

    pub async fn seasons(&self, token: &str) -> Result<Vec<(SeasonDto, Json)>> {
        let value = self.get_json_value("/seasons", token).await?;
        Self::parse_array("/seasons", value)
    }

    pub async fn competitions(&self, token: &str, season_id: &str) -> Result<Vec<(CompetitionDto, Json)>> {
        let value = self.get_json_value(&format!("/competitions?seasonId={season_id}"), token).await?;
        Self::parse_array("/competitions", value)
    }

    /// Flattens `{rounds: [{matches: [...]}]}` into one `(MatchDto, Json)`
    /// pair per match, denormalizing the round structure away — rounds
    /// carry no information `spec.md`'s `Match` shape keeps (`SPEC_FULL.md`
    /// §4.D step 5).
    pub async fn calendar(&self, token: &str, group_id: &str) -> Result<Vec<(MatchDto, Json)>> {
        let value = self.get_json_value(&format!("/calendar?groupId={group_id}"), token).await?;
        let calendar: CalendarDto = serde_json::from_value(value)
            .map_err(|e| Error::UpstreamRejected { status: 0, body: format!("/calendar: {e}") })?;
        calendar
            .rounds
            .into_iter()
            .flat_map(|round| round.matches)
            .map(|item| {
                let typed: MatchDto = serde_json::from_value(item.clone())
                    .map_err(|e| Error::UpstreamRejected { status: 0, body: format!("/calendar: {e}") })?;
                Ok((typed, item))
            })
            .collect()
    }

    pub async fn standings(&self, token: &str, group_id: &str) -> Result<StandingsDto> {
        self.get_json_value(&format!("/standings?groupId={group_id}"), token).await
    }
}
