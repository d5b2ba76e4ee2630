//! Scrape orchestrator (`spec.md` §4.D): walks
//! seasons → competitions → groups → matches, flattens the graph into a
//! `Snapshot`, and hands it to the store in one `bulkReplace`. Group-level
//! fetches run with bounded concurrency via
//! `futures::stream::StreamExt::buffer_unordered`, the same combinator
//! style the teacher uses for its own ingest fan-out.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tokio::sync::watch;

use crate::{
    error::{Error, Result},
    harvester::{DEFAULT_ACQUIRE_TIMEOUT, SharedHarvester},
    model::{
        Competition, CompetitionId, Group, GroupId, GroupType, Match, MatchId, MatchStatus, Season, SeasonId,
        Snapshot, Standings, Team, TeamId,
    },
    store::Store,
    upstream::UpstreamClient,
};

pub const DEFAULT_GROUP_CONCURRENCY: usize = 6;
const TOKEN_ACQUIRE_TIMEOUT: Duration = DEFAULT_ACQUIRE_TIMEOUT;
const SCRAPE_TOTAL_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// `{groupsDone, groupsTotal, currentSeason}` (`spec.md` §4.D), broadcast
/// over a `tokio::sync::watch` channel so the refresh controller can
/// observe progress without the orchestrator holding a shared mutable
/// collection (`spec.md` §9: "tasks + channels").
#[derive(Debug, Clone, Default)]
pub struct ScrapeProgress {
    pub groups_done: usize,
    pub groups_total: usize,
    pub current_season: Option<String>,
}

pub struct Scraper {
    upstream: UpstreamClient,
    harvester: SharedHarvester,
    group_concurrency: usize,
}

struct GroupWork {
    season: Season,
    competition: Competition,
    group: Group,
}

impl Scraper {
    pub fn new(upstream: UpstreamClient, harvester: SharedHarvester) -> Self {
        Self { upstream, harvester, group_concurrency: DEFAULT_GROUP_CONCURRENCY }
    }

    pub fn with_group_concurrency(mut self, n: usize) -> Self {
        self.group_concurrency = n.max(1);
        self
    }

    /// Runs one full pass and writes it to `store`. `progress` is updated as
    /// groups complete; the caller (the refresh controller) owns the
    /// receiving end.
    pub async fn run(&self, store: &dyn Store, progress: watch::Sender<ScrapeProgress>) -> Result<()> {
        tokio::time::timeout(SCRAPE_TOTAL_TIMEOUT, self.run_inner(store, progress))
            .await
            .map_err(|_| Error::UpstreamUnreachable("scrape exceeded the 15 minute total timeout".to_owned()))?
    }

    async fn run_inner(&self, store: &dyn Store, progress: watch::Sender<ScrapeProgress>) -> Result<()> {
        let mut token = self.harvester.acquire_token(TOKEN_ACQUIRE_TIMEOUT).await?;

        let season_pairs = match self.upstream.seasons(&token.0).await {
            Ok(v) => v,
            Err(Error::AuthExpired) => {
                token = self.harvester.acquire_token(TOKEN_ACQUIRE_TIMEOUT).await?;
                self.upstream.seasons(&token.0).await?
            }
            Err(e) => return Err(e),
        };

        let mut seasons = Vec::with_capacity(season_pairs.len());
        let mut work: Vec<GroupWork> = Vec::new();

        for (dto, raw) in season_pairs {
            let season = Season {
                id: SeasonId::new(dto.id.clone()),
                name: dto.name,
                start_date: parse_timestamp(&dto.start_date)?,
                end_date: parse_timestamp(&dto.end_date)?,
                raw,
            };

            let competition_pairs = match self.upstream.competitions(&token.0, season.id.as_str()).await {
                Ok(v) => v,
                Err(Error::AuthExpired) => {
                    token = self.harvester.acquire_token(TOKEN_ACQUIRE_TIMEOUT).await?;
                    self.upstream.competitions(&token.0, season.id.as_str()).await?
                }
                Err(e) => return Err(e),
            };

            for (c, competition_raw) in competition_pairs {
                let competition = Competition {
                    id: CompetitionId::new(c.id.clone()),
                    season_id: season.id.clone(),
                    name: c.name,
                    raw: competition_raw,
                };
                // The competition's raw blob already carries its nested
                // `groups` array; each group's own `raw` is the matching
                // element of that array rather than a re-fetch, since the
                // upstream never exposes a standalone `/groups/{id}` call.
                let group_raws = competition.raw.get("groups").and_then(|g| g.as_array()).cloned().unwrap_or_default();
                for (idx, g) in c.groups.into_iter().enumerate() {
                    let group = Group {
                        id: GroupId::new(g.id),
                        competition_id: competition.id.clone(),
                        season_id: season.id.clone(),
                        name: g.name,
                        group_type: GroupType::parse(&g.group_type),
                        raw: group_raws.get(idx).cloned().unwrap_or(serde_json::Value::Null),
                    };
                    work.push(GroupWork { season: season.clone(), competition: competition.clone(), group });
                }
            }
            seasons.push(season);
        }

        let groups_total = work.len();
        progress.send_replace(ScrapeProgress { groups_done: 0, groups_total, current_season: None });

        let token = Arc::new(tokio::sync::Mutex::new(token));
        let results = stream::iter(work.into_iter().map(|w| {
            let token = Arc::clone(&token);
            async move {
                let current_token = token.lock().await.0.clone();
                let result = self.upstream.calendar(&current_token, w.group.id.as_str()).await;
                let result = match result {
                    Ok(v) => Ok(v),
                    Err(Error::AuthExpired) => {
                        let mut guard = token.lock().await;
                        let fresh = self.harvester.acquire_token(TOKEN_ACQUIRE_TIMEOUT).await?;
                        *guard = fresh.clone();
                        drop(guard);
                        self.upstream.calendar(&fresh.0, w.group.id.as_str()).await
                    }
                    Err(e) => Err(e),
                }?;
                // `/standings` is explicitly optional (`spec.md` §4.D step
                // 4); a failure here doesn't fail the group's scrape, since
                // standings are stored but never read back by the query
                // layer.
                let current_token = token.lock().await.0.clone();
                let standings = match self.upstream.standings(&current_token, w.group.id.as_str()).await {
                    Ok(raw) => Some(raw),
                    Err(e) => {
                        log::warn!("standings fetch for group {} failed, skipping: {e}", w.group.id.as_str());
                        None
                    }
                };
                Result::Ok((w, result, standings))
            }
        }))
        .buffer_unordered(self.group_concurrency)
        .collect::<Vec<_>>()
        .await;

        let mut competitions_by_id = std::collections::HashMap::new();
        let mut groups_by_id = std::collections::HashMap::new();
        let mut matches = Vec::new();
        let mut standings = Vec::new();
        let mut teams_by_id: std::collections::HashMap<String, Team> = std::collections::HashMap::new();
        let mut groups_done = 0usize;

        for result in results {
            let (work, match_pairs, group_standings) = result?;
            competitions_by_id.insert(work.competition.id.clone(), work.competition.clone());
            groups_by_id.insert(work.group.id.clone(), work.group.clone());

            if let Some(raw) = group_standings {
                standings.push(Standings { group_id: work.group.id.clone(), raw });
            }

            for (m, raw) in match_pairs {
                if let Some(id) = &m.home_team_id {
                    teams_by_id.entry(id.clone()).or_insert_with(|| Team {
                        id: Some(TeamId::new(id.clone())),
                        name: m.home_team_name.clone().unwrap_or_default(),
                        logo_url: None,
                    });
                }
                if let Some(id) = &m.away_team_id {
                    teams_by_id.entry(id.clone()).or_insert_with(|| Team {
                        id: Some(TeamId::new(id.clone())),
                        name: m.away_team_name.clone().unwrap_or_default(),
                        logo_url: None,
                    });
                }
                let status = MatchStatus::parse(&m.status)
                    .ok_or_else(|| Error::UpstreamRejected { status: 0, body: format!("unrecognized match status {:?}", m.status) })?;
                matches.push(Match {
                    id: MatchId::new(m.id),
                    season_id: work.season.id.clone(),
                    competition_id: work.competition.id.clone(),
                    competition_name: work.competition.name.clone(),
                    group_id: work.group.id.clone(),
                    group_name: work.group.name.clone(),
                    home_team_id: m.home_team_id.map(TeamId::new),
                    home_team_name: m.home_team_name,
                    away_team_id: m.away_team_id.map(TeamId::new),
                    away_team_name: m.away_team_name,
                    date: parse_timestamp(&m.date)?,
                    end_date: m.end_date.as_deref().map(parse_timestamp).transpose()?,
                    status,
                    home_score: m.home_score,
                    away_score: m.away_score,
                    venue: m.venue,
                    venue_address: m.venue_address,
                    raw,
                });
            }

            groups_done += 1;
            progress.send_replace(ScrapeProgress {
                groups_done,
                groups_total,
                current_season: Some(work.season.name.clone()),
            });
        }

        // `HashMap` iteration order is unspecified; sorting here keeps a
        // snapshot's row order deterministic across runs even though
        // `bulk_replace` only cares about the set of rows, not their order.
        let snapshot = Snapshot {
            seasons,
            competitions: competitions_by_id.into_values().sorted_by(|a, b| a.id.cmp(&b.id)).collect(),
            groups: groups_by_id.into_values().sorted_by(|a, b| a.id.cmp(&b.id)).collect(),
            teams: teams_by_id.into_values().sorted_by(|a, b| a.id.cmp(&b.id)).collect(),
            matches,
            standings: standings.into_iter().sorted_by(|a, b| a.group_id.cmp(&b.group_id)).collect(),
        };
        store.bulk_replace(snapshot).await
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::UpstreamRejected { status: 0, body: format!("unparseable timestamp {s:?}: {e}") })
}
