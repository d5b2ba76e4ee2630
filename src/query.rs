//! Query layer (`spec.md` §4.F): thin translation from HTTP-style
//! parameters to `store::MatchFilter`. Both filter styles — ID-based
//! (preferred) and name-based (substring, locale-aware) — are accepted
//! simultaneously; `MatchFilter::effective_group`/`effective_team` apply
//! the "ID wins" precedence uniformly across every backend.

use chrono::{DateTime, Utc};
use lazy_regex::regex_is_match;

use crate::{
    error::{Error, Result},
    model::{GroupId, MatchStatus, SeasonId, Team, TeamId},
    store::{MatchFilter, Store},
};

/// Upstream IDs are opaque but always ASCII alphanumeric-plus-punctuation
/// tokens (`spec.md` §3); rejecting anything else here keeps a malformed
/// `group_id`/`team_id`/`season` query parameter an `InvalidFilter` instead
/// of a silently-empty `findMatches` result.
fn validate_id(field: &str, value: &str) -> Result<()> {
    if regex_is_match!(r"^[A-Za-z0-9_-]+$", value) {
        Ok(())
    } else {
        Err(Error::InvalidFilter(format!("{field} {value:?} is not a valid id")))
    }
}

/// The calendar URL parameters from `spec.md` §6 — the one externally
/// stable contract — minus the ICS-specific `mode`/`prep`/`tz` (those stay
/// in `ics_gen`'s request type; this layer only ever produces a
/// `store::MatchFilter`).
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub season: Option<String>,
    pub competition: Option<String>,
    pub group_id: Option<String>,
    pub team: Option<String>,
    pub team_id: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl MatchQuery {
    /// Builds a [`MatchFilter`], resolving `season` against `store` first:
    /// the `season` URL parameter is documented as "season id or name"
    /// (`spec.md` §6), but `findMatches`' `seasonId` dimension is an exact
    /// match against the opaque upstream id, not the human-readable name —
    /// so a caller-supplied name (e.g. `"2025/2026"`) needs translating to
    /// its id via [`Store::list_seasons`] before it can filter anything.
    pub async fn to_filter(&self, store: &dyn Store) -> Result<MatchFilter> {
        if let Some(id) = &self.group_id {
            validate_id("group_id", id)?;
        }
        if let Some(id) = &self.team_id {
            validate_id("team_id", id)?;
        }
        let status = self
            .status
            .as_deref()
            .map(|s| MatchStatus::parse(s).ok_or_else(|| Error::InvalidFilter(format!("unrecognized status {s:?}"))))
            .transpose()?;
        let season_id = match &self.season {
            Some(raw) => Some(resolve_season_id(store, raw).await?),
            None => None,
        };
        Ok(MatchFilter {
            season_id,
            group_id: self.group_id.clone().map(GroupId::new),
            competition_name: self.competition.clone(),
            team_id: self.team_id.clone().map(TeamId::new),
            team_name: self.team.clone(),
            status,
            date_from: self.date_from,
            date_to: self.date_to,
        })
    }
}

/// Resolves a `season` URL parameter to a [`SeasonId`]. Tries an exact id
/// match against `Store::list_seasons` first, then an exact
/// case-insensitive name match (`"2025/2026"`); if neither matches, the raw
/// value is passed through as a literal id so an unknown season still
/// produces an empty result rather than an error — consistent with
/// `spec.md` §7's guidance that a bad-but-well-formed filter value isn't
/// itself a fault.
async fn resolve_season_id(store: &dyn Store, raw: &str) -> Result<SeasonId> {
    let seasons = store.list_seasons().await?;
    if let Some(season) = seasons.iter().find(|s| s.id.as_str() == raw) {
        return Ok(season.id.clone());
    }
    if let Some(season) = seasons.iter().find(|s| s.name.eq_ignore_ascii_case(raw)) {
        return Ok(season.id.clone());
    }
    Ok(SeasonId::new(raw))
}

/// `listTeamsForGroup(groupId)` (`spec.md` §4.F): the deduplicated,
/// name-sorted set of home/away teams appearing in a group's matches.
/// Deduplication is by `TeamId` when present; the spec allows team IDs to
/// be absent for unpaired playoff slots, so rows missing one fall back to
/// name-based dedup (`SPEC_FULL.md` §4.F).
pub async fn list_teams_for_group(store: &dyn Store, group_id: &GroupId) -> Result<Vec<Team>> {
    store.list_teams(group_id).await
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::{
        model::{CompetitionId, Group, Match, Season, Snapshot},
        store::MatchFilter,
    };

    /// A fixed-seasons stand-in for `Store`, just enough for
    /// `resolve_season_id` to exercise id-match / name-match / passthrough
    /// without standing up a real backend.
    struct FixedSeasonsStore(Vec<Season>);

    #[async_trait]
    impl Store for FixedSeasonsStore {
        async fn list_seasons(&self) -> Result<Vec<Season>> {
            Ok(self.0.clone())
        }
        async fn list_competitions(&self, _: &SeasonId) -> Result<Vec<(crate::model::Competition, Vec<Group>)>> {
            unimplemented!()
        }
        async fn list_groups(&self, _: &CompetitionId) -> Result<Vec<Group>> {
            unimplemented!()
        }
        async fn list_teams(&self, _: &GroupId) -> Result<Vec<Team>> {
            unimplemented!()
        }
        async fn find_matches(&self, _: &MatchFilter) -> Result<Vec<Match>> {
            unimplemented!()
        }
        async fn bulk_replace(&self, _: Snapshot) -> Result<()> {
            unimplemented!()
        }
        async fn get_metadata(&self, _: &str) -> Result<Option<String>> {
            unimplemented!()
        }
        async fn set_metadata(&self, _: &str, _: &str) -> Result<()> {
            unimplemented!()
        }
        async fn database_size_bytes(&self) -> Result<Option<u64>> {
            unimplemented!()
        }
    }

    fn season(id: &str, name: &str) -> Season {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Season { id: SeasonId::new(id), name: name.to_owned(), start_date: at, end_date: at, raw: serde_json::Value::Null }
    }

    #[tokio::test]
    async fn unrecognized_status_is_invalid_filter() {
        let store = FixedSeasonsStore(vec![]);
        let query = MatchQuery { status: Some("WEIRD".to_owned()), ..Default::default() };
        assert!(matches!(query.to_filter(&store).await, Err(Error::InvalidFilter(_))));
    }

    #[tokio::test]
    async fn malformed_group_id_is_invalid_filter() {
        let store = FixedSeasonsStore(vec![]);
        let query = MatchQuery { group_id: Some("g1; DROP TABLE matches".to_owned()), ..Default::default() };
        assert!(matches!(query.to_filter(&store).await, Err(Error::InvalidFilter(_))));
    }

    #[tokio::test]
    async fn id_and_name_both_translate_and_id_wins_downstream() {
        let store = FixedSeasonsStore(vec![]);
        let query = MatchQuery { group_id: Some("g1".to_owned()), competition: Some("Premier League".to_owned()), ..Default::default() };
        let filter = query.to_filter(&store).await.unwrap();
        assert!(matches!(filter.effective_group(), crate::store::GroupDimension::GroupId(id) if id.as_str() == "g1"));
    }

    #[tokio::test]
    async fn season_param_resolves_by_exact_id() {
        let store = FixedSeasonsStore(vec![season("s1", "2025/2026")]);
        let query = MatchQuery { season: Some("s1".to_owned()), ..Default::default() };
        let filter = query.to_filter(&store).await.unwrap();
        assert_eq!(filter.season_id.unwrap().as_str(), "s1");
    }

    #[tokio::test]
    async fn season_param_resolves_by_name_case_insensitively() {
        let store = FixedSeasonsStore(vec![season("s1", "2025/2026")]);
        let query = MatchQuery { season: Some("2025/2026".to_owned()), ..Default::default() };
        let filter = query.to_filter(&store).await.unwrap();
        assert_eq!(filter.season_id.unwrap().as_str(), "s1");
    }

    #[tokio::test]
    async fn season_param_passes_through_when_unmatched() {
        let store = FixedSeasonsStore(vec![season("s1", "2025/2026")]);
        let query = MatchQuery { season: Some("nonexistent".to_owned()), ..Default::default() };
        let filter = query.to_filter(&store).await.unwrap();
        assert_eq!(filter.season_id.unwrap().as_str(), "nonexistent");
    }
}
