//! Entity types shared by every component (store, upstream client, scraper,
//! query layer, ICS assembler). IDs are opaque strings assigned upstream —
//! this crate never mints one (`spec.md` §3).

use std::{
    fmt,
    marker::PhantomData,
};

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Marker trait distinguishing which table an [`Id`] belongs to, so that an
/// `Id<Group>` and an `Id<Team>` can't be swapped at the call site even
/// though both are just strings underneath. Adapted from the teacher's
/// `Id<T: Table>` (`src/id.rs`), minus the Postgres-random-assignment
/// machinery this domain doesn't need.
pub trait Kind {
    const NAME: &'static str;
}

macro_rules! id_kind {
    ($kind:ident, $alias:ident, $name:literal) => {
        #[derive(Debug, Clone, Copy)]
        pub enum $kind {}
        impl Kind for $kind {
            const NAME: &'static str = $name;
        }
        pub type $alias = Id<$kind>;
    };
}

id_kind!(SeasonKind, SeasonId, "season");
id_kind!(CompetitionKind, CompetitionId, "competition");
id_kind!(GroupKind, GroupId, "group");
id_kind!(TeamKind, TeamId, "team");
id_kind!(MatchKind, MatchId, "match");

/// An opaque, upstream-assigned identifier. `T` is a zero-sized marker, not
/// stored at runtime; the wrapper is just a `String` on the wire and in the
/// database.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T> {
    inner: String,
    #[serde(skip)]
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), _kind: PhantomData }
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool { self.inner == other.inner }
}

impl<T> Eq for Id<T> {}

impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.inner.hash(state) }
}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.inner.cmp(&other.inner) }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:?})", self.inner)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl<T> Id<T> {
    pub fn new(inner: impl Into<String>) -> Self {
        Self { inner: inner.into(), _kind: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn into_string(self) -> String {
        self.inner
    }
}

impl<T> From<String> for Id<T> {
    fn from(inner: String) -> Self {
        Self::new(inner)
    }
}

impl<T> From<&str> for Id<T> {
    fn from(inner: &str) -> Self {
        Self::new(inner.to_owned())
    }
}

/// `type ∈ {LEAGUE, PLAYOFF, …}` per `spec.md` §3 — open vocabulary, so
/// unknown upstream values round-trip instead of failing to parse
/// (`SPEC_FULL.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize)]
#[serde(into = "String")]
pub enum GroupType {
    #[display("LEAGUE")]
    League,
    #[display("PLAYOFF")]
    Playoff,
    #[display("{_0}")]
    Other(String),
}

impl From<GroupType> for String {
    fn from(g: GroupType) -> String {
        g.as_str().to_owned()
    }
}

impl GroupType {
    pub fn parse(s: &str) -> Self {
        match s {
            "LEAGUE" => Self::League,
            "PLAYOFF" => Self::Playoff,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::League => "LEAGUE",
            Self::Playoff => "PLAYOFF",
            Self::Other(s) => s,
        }
    }
}

/// `status ∈ {NOT_STARTED, LIVE, CLOSED}` per `spec.md` §3, plus the
/// `CANCELLED` mapping the ICS assembler defines but the scraper has never
/// observed upstream (`spec.md` §9's open question). Unlike [`GroupType`]
/// this is a closed set: `parse` returns `None` for anything else, and
/// callers keep the match's `raw` JSON around so an unrecognized value isn't
/// lost, just not modeled as its own variant (`DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(into = "String")]
pub enum MatchStatus {
    #[display("NOT_STARTED")]
    NotStarted,
    #[display("LIVE")]
    Live,
    #[display("CLOSED")]
    Closed,
    #[display("CANCELLED")]
    Cancelled,
}

impl From<MatchStatus> for String {
    fn from(s: MatchStatus) -> String {
        s.as_str().to_owned()
    }
}

impl MatchStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NOT_STARTED" => Some(Self::NotStarted),
            "LIVE" => Some(Self::Live),
            "CLOSED" => Some(Self::Closed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Live => "LIVE",
            Self::Closed => "CLOSED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: SeasonId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: CompetitionId,
    pub season_id: SeasonId,
    pub name: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub competition_id: CompetitionId,
    pub season_id: SeasonId,
    pub name: String,
    pub group_type: GroupType,
    pub raw: serde_json::Value,
}

/// The known sentinel literal for a competition's sole/default group
/// (`spec.md` §3's display rule).
pub const REGULAR_GROUP_SENTINEL: &str = "<regular>";

impl Group {
    /// Display rule from `spec.md` §3: if the group is unnamed or shares the
    /// competition's name, render the competition's name alone; otherwise
    /// join them with an em dash.
    pub fn display_name(&self, competition_name: &str) -> String {
        if self.name == competition_name || self.name == REGULAR_GROUP_SENTINEL {
            competition_name.to_owned()
        } else {
            format!("{competition_name} — {}", self.name)
        }
    }
}

/// `{id, name, logoUrl?}` per `spec.md` §3. `id` is optional here even
/// though the spec's entity shape doesn't mark it so: a team surfaced by
/// `listTeamsForGroup` may come from a match's `homeTeamName`/`awayTeamName`
/// with no paired id (unpaired playoff slots, `spec.md` §3), and that row is
/// still a distinct team the query layer must return, just dedup'd by name
/// instead of id (`SPEC_FULL.md` §4.F, `DESIGN.md`).
#[derive(Debug, Clone, From, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Option<TeamId>,
    pub name: String,
    pub logo_url: Option<String>,
}

/// A group's standings payload (`spec.md` §4.B/§4.D step 4): fetched
/// optionally alongside the calendar and persisted verbatim. The core query
/// layer never reads it back — "ignored by the core query layer but
/// stored" — so no typed columns are derived from it, just the raw blob
/// keyed by the group it belongs to.
#[derive(Debug, Clone)]
pub struct Standings {
    pub group_id: GroupId,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub season_id: SeasonId,
    pub competition_id: CompetitionId,
    pub competition_name: String,
    pub group_id: GroupId,
    pub group_name: String,
    pub home_team_id: Option<TeamId>,
    pub home_team_name: Option<String>,
    pub away_team_id: Option<TeamId>,
    pub away_team_name: Option<String>,
    pub date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: MatchStatus,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub venue: Option<String>,
    pub venue_address: Option<String>,
    pub raw: serde_json::Value,
}

impl Match {
    /// `homeScore`/`awayScore` are present iff `status = CLOSED` (`spec.md`
    /// §3's invariant); boundary behavior 9 says a `CLOSED` match missing
    /// scores must still render as an upcoming event, not a malformed line,
    /// so callers check this rather than trusting `status` alone.
    pub fn has_final_score(&self) -> bool {
        self.status == MatchStatus::Closed && self.home_score.is_some() && self.away_score.is_some()
    }
}

/// `{key, value, updatedAt}` mapping (`spec.md` §3). `schema_version` and
/// `last_scrape_completed_at` are the two keys every backend must recognize.
pub const METADATA_SCHEMA_VERSION: &str = "schema_version";
pub const METADATA_LAST_SCRAPE_COMPLETED_AT: &str = "last_scrape_completed_at";

#[derive(Debug, Clone)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// The full output of one scrape pass, handed to `Store::bulk_replace` as a
/// single logical transaction (`spec.md` §4.A).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub seasons: Vec<Season>,
    pub competitions: Vec<Competition>,
    pub groups: Vec<Group>,
    pub teams: Vec<Team>,
    pub matches: Vec<Match>,
    pub standings: Vec<Standings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_display_name_uses_sentinel() {
        let group = Group {
            id: GroupId::new("g1"),
            competition_id: CompetitionId::new("c1"),
            season_id: SeasonId::new("s1"),
            name: REGULAR_GROUP_SENTINEL.to_owned(),
            group_type: GroupType::League,
            raw: serde_json::Value::Null,
        };
        assert_eq!(group.display_name("Premier League"), "Premier League");
    }

    #[test]
    fn group_display_name_joins_when_distinct() {
        let group = Group {
            id: GroupId::new("g1"),
            competition_id: CompetitionId::new("c1"),
            season_id: SeasonId::new("s1"),
            name: "Playoff".to_owned(),
            group_type: GroupType::Playoff,
            raw: serde_json::Value::Null,
        };
        assert_eq!(group.display_name("Premier League"), "Premier League — Playoff");
    }

    #[test]
    fn group_display_name_equal_to_competition() {
        let group = Group {
            id: GroupId::new("g1"),
            competition_id: CompetitionId::new("c1"),
            season_id: SeasonId::new("s1"),
            name: "Premier League".to_owned(),
            group_type: GroupType::League,
            raw: serde_json::Value::Null,
        };
        assert_eq!(group.display_name("Premier League"), "Premier League");
    }

    #[test]
    fn match_status_unknown_does_not_panic() {
        assert_eq!(MatchStatus::parse("WEIRD_FUTURE_STATUS"), None);
        assert_eq!(MatchStatus::parse("CANCELLED"), Some(MatchStatus::Cancelled));
    }

    #[test]
    fn id_ordering_is_string_ordering() {
        let a = MatchId::new("M1");
        let b = MatchId::new("M2");
        assert!(a < b);
    }
}
