//! Thin `rocket` binding of the query/ICS/refresh layers to the operation
//! table in `spec.md` §6. Intentionally minimal — JSON responses via
//! `rocket::serde::json::Json`, no HTML rendering, no session/auth — since
//! the full HTTP router and static UI are out of scope per `spec.md` §1;
//! this exists to demonstrate and integration-test the external contract.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rocket::{State, get, serde::json::Json};
use serde::Serialize;

use crate::{
    config::Config,
    error::{Error, Result},
    ics_gen::{self, CalendarMode, IcsOptions},
    model::{Group, GroupId, Season, SeasonId, Team},
    query::{self, MatchQuery},
    refresh::{RefreshController, RefreshOutcome},
    store::Store,
};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub refresh: Arc<RefreshController>,
    pub config: Config,
}

#[get("/seasons")]
pub async fn list_seasons(state: &State<AppState>) -> Result<Json<Vec<Season>>> {
    Ok(Json(state.store.list_seasons().await?))
}

#[derive(Serialize)]
pub struct CompetitionWithGroups {
    pub competition: crate::model::Competition,
    pub groups: Vec<Group>,
}

#[get("/competitions?<season_id>")]
pub async fn list_competitions(season_id: &str, state: &State<AppState>) -> Result<Json<Vec<CompetitionWithGroups>>> {
    let season_id = SeasonId::new(season_id);
    let rows = state.store.list_competitions(&season_id).await?;
    Ok(Json(rows.into_iter().map(|(competition, groups)| CompetitionWithGroups { competition, groups }).collect()))
}

#[get("/groups/<group_id>/teams")]
pub async fn list_teams_for_group(group_id: &str, state: &State<AppState>) -> Result<Json<Vec<Team>>> {
    let teams = query::list_teams_for_group(state.store.as_ref(), &GroupId::new(group_id)).await?;
    Ok(Json(teams))
}

#[derive(Debug, Default, rocket::FromForm)]
pub struct MatchQueryParams {
    pub season: Option<String>,
    pub competition: Option<String>,
    pub group_id: Option<String>,
    pub team: Option<String>,
    pub team_id: Option<String>,
    pub status: Option<String>,
}

impl From<MatchQueryParams> for MatchQuery {
    fn from(p: MatchQueryParams) -> Self {
        MatchQuery {
            season: p.season,
            competition: p.competition,
            group_id: p.group_id,
            team: p.team,
            team_id: p.team_id,
            status: p.status,
            date_from: None,
            date_to: None,
        }
    }
}

#[get("/matches?<params..>")]
pub async fn find_matches(params: MatchQueryParams, state: &State<AppState>) -> Result<Json<Vec<crate::model::Match>>> {
    let filter = MatchQuery::from(params).to_filter(state.store.as_ref()).await?;
    let mut matches = state.store.find_matches(&filter).await?;
    crate::store::sort_matches(&mut matches);
    Ok(Json(matches))
}

#[derive(Debug, Default, rocket::FromForm)]
pub struct CalendarParams {
    pub season: Option<String>,
    pub competition: Option<String>,
    pub group_id: Option<String>,
    pub team: Option<String>,
    pub team_id: Option<String>,
    pub status: Option<String>,
    pub mode: Option<String>,
    pub prep: Option<u32>,
    pub tz: Option<String>,
}

#[get("/calendar.ics?<params..>")]
pub async fn calendar_ics(params: CalendarParams, state: &State<AppState>) -> Result<(rocket::http::ContentType, String)> {
    let query = MatchQuery {
        season: params.season.clone(),
        competition: params.competition.clone(),
        group_id: params.group_id.clone(),
        team: params.team.clone(),
        team_id: params.team_id.clone(),
        status: params.status.clone(),
        date_from: None,
        date_to: None,
    };
    let filter = query.to_filter(state.store.as_ref()).await?;
    let mut matches = state.store.find_matches(&filter).await?;
    crate::store::sort_matches(&mut matches);

    if matches.is_empty() && state.store.list_seasons().await?.is_empty() {
        // Cold start (Scenario S1): an empty store triggers an automatic
        // scrape but still answers immediately with a valid empty document.
        state.refresh.start_unconditionally(Arc::clone(&state.store)).await;
    }

    let mode = match params.mode.as_deref() {
        Some("player") => CalendarMode::Player,
        _ => CalendarMode::Fan,
    };
    let prep = params.prep.unwrap_or(0).min(240);
    let tz = params.tz.as_deref().and_then(|s| s.parse::<Tz>().ok());
    if params.tz.is_some() && tz.is_none() {
        return Err(Error::InvalidFilter(format!("unrecognized time zone {:?}", params.tz)));
    }

    let opts = IcsOptions {
        mode,
        prep_minutes: prep,
        tz,
        competition_label: params.competition.clone(),
        team_label: params.team.clone(),
    };
    let body = ics_gen::generate(&matches, &opts, &state.config.host_identifier);
    Ok((rocket::http::ContentType::new("text", "calendar"), body))
}

#[derive(Serialize)]
pub struct CacheInfoBody {
    pub exists: bool,
    pub stale: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
}

#[get("/cache-info")]
pub async fn cache_info(state: &State<AppState>) -> Result<Json<CacheInfoBody>> {
    let info = state.refresh.cache_info(state.store.as_ref()).await?;
    Ok(Json(CacheInfoBody { exists: info.exists, stale: info.stale, last_updated: info.last_updated, size_bytes: info.size_bytes }))
}

#[derive(Serialize)]
#[serde(tag = "result")]
pub enum RefreshRequestBody {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "rate_limited")]
    RateLimited { retry_after: u64 },
}

#[get("/refresh")]
pub async fn request_refresh(state: &State<AppState>) -> Json<RefreshRequestBody> {
    let outcome = state.refresh.request_refresh(Arc::clone(&state.store)).await;
    Json(match outcome {
        RefreshOutcome::Started => RefreshRequestBody::Started,
        RefreshOutcome::InProgress => RefreshRequestBody::InProgress,
        RefreshOutcome::RateLimited { retry_after_secs } => RefreshRequestBody::RateLimited { retry_after: retry_after_secs },
    })
}

#[derive(Serialize)]
pub struct RefreshStatusBody {
    pub is_scraping: bool,
    pub last_error: Option<String>,
    pub groups_done: Option<usize>,
    pub groups_total: Option<usize>,
    pub current_season: Option<String>,
}

#[get("/refresh-status")]
pub async fn refresh_status(state: &State<AppState>) -> Json<RefreshStatusBody> {
    let status = state.refresh.status().await;
    Json(RefreshStatusBody {
        is_scraping: status.is_scraping,
        last_error: status.last_error,
        groups_done: status.progress.as_ref().map(|p| p.groups_done),
        groups_total: status.progress.as_ref().map(|p| p.groups_total),
        current_season: status.progress.and_then(|p| p.current_season),
    })
}

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![
        list_seasons,
        list_competitions,
        list_teams_for_group,
        find_matches,
        calendar_ics,
        cache_info,
        request_refresh,
        refresh_status,
    ]
}
