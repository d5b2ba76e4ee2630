//! The store interface (`spec.md` §4.A) — the only abstraction the rest of
//! the core depends on. Three backends implement it (`file`, `edgesql`,
//! `rowstore`); none of their backend-specific query syntax is visible
//! through this trait, per the "Backend polymorphism" design note in
//! `spec.md` §9.

pub mod edgesql;
pub mod file;
pub mod rowstore;
mod rows;
mod sql;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::{Config, DbType},
    error::{Error, Result},
    model::{CompetitionId, Group, GroupId, MatchStatus, SeasonId, Snapshot, Team, TeamId},
};

/// `findMatches(filter)` configuration record (`spec.md` §4.A/§4.F). Both
/// the ID-based and name-based dimensions can be set simultaneously; when
/// both are present for the same dimension the ID wins — each backend
/// applies that precedence identically via [`MatchFilter::effective_group`]
/// and [`MatchFilter::effective_team`].
#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub season_id: Option<SeasonId>,
    pub group_id: Option<GroupId>,
    pub competition_name: Option<String>,
    pub team_id: Option<TeamId>,
    pub team_name: Option<String>,
    pub status: Option<MatchStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Which of `{group_id, competition_name}` actually governs the query once
/// ID-wins precedence is applied.
pub enum GroupDimension<'a> {
    None,
    GroupId(&'a GroupId),
    CompetitionName(&'a str),
}

/// Which of `{team_id, team_name}` actually governs the query.
pub enum TeamDimension<'a> {
    None,
    TeamId(&'a TeamId),
    TeamName(&'a str),
}

impl MatchFilter {
    pub fn effective_group(&self) -> GroupDimension<'_> {
        if let Some(id) = &self.group_id {
            GroupDimension::GroupId(id)
        } else if let Some(name) = &self.competition_name {
            GroupDimension::CompetitionName(name)
        } else {
            GroupDimension::None
        }
    }

    pub fn effective_team(&self) -> TeamDimension<'_> {
        if let Some(id) = &self.team_id {
            TeamDimension::TeamId(id)
        } else if let Some(name) = &self.team_name {
            TeamDimension::TeamName(name)
        } else {
            TeamDimension::None
        }
    }
}

/// Metadata keys every backend must recognize (`spec.md` §3).
pub use crate::model::{METADATA_LAST_SCRAPE_COMPLETED_AT, METADATA_SCHEMA_VERSION};

pub const SCHEMA_VERSION: &str = "1";

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_seasons(&self) -> Result<Vec<crate::model::Season>>;

    /// Joined with their `groups`, per `spec.md` §4.A.
    async fn list_competitions(&self, season_id: &SeasonId) -> Result<Vec<(crate::model::Competition, Vec<Group>)>>;

    async fn list_groups(&self, competition_id: &CompetitionId) -> Result<Vec<Group>>;

    /// Locale-aware-sorted per `spec.md` §4.A; see `DESIGN.md` for the
    /// ordering resolution (plain Unicode codepoint order — total, stable,
    /// reproducible).
    async fn list_teams(&self, group_id: &GroupId) -> Result<Vec<Team>>;

    async fn find_matches(&self, filter: &MatchFilter) -> Result<Vec<crate::model::Match>>;

    /// Atomic ingest entry point (`spec.md` §4.A's bulk-replace contract):
    /// upserts everything in `snapshot` and advances
    /// `last_scrape_completed_at` only on successful commit; leaves the
    /// store untouched on any error.
    async fn bulk_replace(&self, snapshot: Snapshot) -> Result<()>;

    async fn get_metadata(&self, key: &str) -> Result<Option<String>>;

    async fn set_metadata(&self, key: &str, value: &str) -> Result<()>;

    /// Best-effort; `None` for backends where the concept doesn't apply
    /// (remote backends, per `spec.md` §4.A).
    async fn database_size_bytes(&self) -> Result<Option<u64>>;
}

/// Opens whichever backend `config.db_type` selects (`spec.md` §6's
/// `DB_TYPE` configuration key). One backend is active per process; the
/// returned trait object is the only thing `main`/`scrape_main` hold onto
/// after this call (`spec.md` §9: "backend-specific features are not
/// visible to callers").
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.db_type {
        DbType::File => {
            let store = file::FileStore::open(&config.file_db_path()).await?;
            Ok(Arc::new(store))
        }
        DbType::EdgeSql => {
            let url = config
                .edgesql_url
                .as_deref()
                .ok_or_else(|| Error::StoreUnavailable("DB_TYPE=edgesql requires EDGESQL_URL".to_owned()))?;
            let store = edgesql::EdgeSqlStore::connect(url, config.edgesql_auth_token.as_deref()).await?;
            Ok(Arc::new(store))
        }
        DbType::RowStore => {
            let url = config
                .rowstore_url
                .as_deref()
                .ok_or_else(|| Error::StoreUnavailable("DB_TYPE=rowstore requires ROWSTORE_URL".to_owned()))?;
            let store = rowstore::RowStore::connect(url).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Case-insensitive substring match, used identically by every backend for
/// the name-based filter dimensions (`spec.md` §4.A/§4.F).
pub fn substring_match_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Locale-aware team-name sort (`spec.md` §4.A, Testable Property 10),
/// resolved as plain Unicode codepoint order (`DESIGN.md` open question 5):
/// total, stable, and reproducible across backends without pulling in an
/// ICU-tailoring dependency the corpus never reaches for.
pub fn sort_teams(teams: &mut [crate::model::Team]) {
    teams.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

/// Builds `listTeamsForGroup`'s result set directly from a group's matches
/// (`spec.md` §4.F) instead of joining a `teams` table: each row is one
/// `(team_id, team_name)` pair taken from a match's home or away side.
/// Deduped by id when present; rows with no id (unpaired playoff slots,
/// `spec.md` §3) fall back to name-based dedup so they still surface
/// (`SPEC_FULL.md` §4.F) instead of being silently dropped by a join that
/// requires a `teams` row to exist. `logo_url` is an optional enrichment
/// looked up separately by backends that have a `teams` table to join.
pub fn dedupe_team_refs(
    rows: impl IntoIterator<Item = (Option<String>, Option<String>, Option<String>)>,
) -> Vec<crate::model::Team> {
    use std::collections::HashMap;

    let mut by_id: HashMap<String, crate::model::Team> = HashMap::new();
    let mut by_name: HashMap<String, crate::model::Team> = HashMap::new();

    for (id, name, logo_url) in rows {
        let Some(name) = name else { continue };
        match id {
            Some(id) => {
                by_id.entry(id.clone()).or_insert_with(|| crate::model::Team {
                    id: Some(TeamId::new(id)),
                    name,
                    logo_url,
                });
            }
            None => {
                by_name.entry(name.clone()).or_insert_with(|| crate::model::Team { id: None, name, logo_url });
            }
        }
    }

    // A name that also appears id-qualified elsewhere is the same team;
    // keep only the id-qualified entry for it.
    by_name.retain(|name, _| !by_id.values().any(|t| &t.name == name));

    let mut teams: Vec<crate::model::Team> = by_id.into_values().chain(by_name.into_values()).collect();
    sort_teams(&mut teams);
    teams
}

/// Stable sort: by `date` ascending, then `id` ascending as a tiebreak
/// (`spec.md` §4.A). Backends with a native `ORDER BY date ASC, id ASC`
/// apply this in SQL; this helper exists so in-memory filtering (e.g. the
/// name-based substring dimensions each backend must evaluate after
/// fetching the SQL-indexable candidates) stays consistent.
pub fn sort_matches(matches: &mut [crate::model::Match]) {
    matches.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_match_is_case_insensitive() {
        assert!(substring_match_ci("Hapoel Jerusalem", "JERUSALEM"));
        assert!(!substring_match_ci("Hapoel Jerusalem", "tel aviv"));
    }

    #[test]
    fn effective_group_prefers_id() {
        let filter = MatchFilter {
            group_id: Some(GroupId::new("g1")),
            competition_name: Some("Premier League".to_owned()),
            ..Default::default()
        };
        assert!(matches!(filter.effective_group(), GroupDimension::GroupId(id) if id.as_str() == "g1"));
    }

    #[test]
    fn dedupe_team_refs_keeps_name_only_rows() {
        let rows = vec![
            (Some("t1".to_owned()), Some("Hapoel Jerusalem".to_owned()), None),
            (Some("t1".to_owned()), Some("Hapoel Jerusalem".to_owned()), None),
            (None, Some("TBD Playoff Slot".to_owned()), None),
        ];
        let teams = dedupe_team_refs(rows);
        assert_eq!(teams.len(), 2);
        assert!(teams.iter().any(|t| t.id.is_none() && t.name == "TBD Playoff Slot"));
        assert!(teams.iter().any(|t| t.id.as_ref().map(|id| id.as_str()) == Some("t1")));
    }

    #[test]
    fn dedupe_team_refs_prefers_id_qualified_over_name_only_duplicate() {
        let rows = vec![
            (None, Some("Maccabi".to_owned()), None),
            (Some("t9".to_owned()), Some("Maccabi".to_owned()), None),
        ];
        let teams = dedupe_team_refs(rows);
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].id.as_ref().map(|id| id.as_str()), Some("t9"));
    }

    #[test]
    fn effective_team_falls_back_to_name() {
        let filter = MatchFilter { team_name: Some("Maccabi".to_owned()), ..Default::default() };
        assert!(matches!(filter.effective_team(), TeamDimension::TeamName(name) if name == "Maccabi"));
    }
}
