//! Row structs shared by the two `sqlx`-backed stores. `chrono`'s `sqlx`
//! feature decodes `DateTime<Utc>` from both SQLite's TEXT storage and
//! Postgres's `TIMESTAMPTZ`, so one `#[derive(FromRow)]` set covers both
//! backends; only the `raw` column's on-the-wire type differs (TEXT vs
//! JSONB), handled per-backend at the call site rather than in these types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::model::{
    Competition, CompetitionId, Group, GroupId, GroupType, Match, MatchId, MatchStatus,
    MetadataEntry, Season, SeasonId, TeamId,
};

#[derive(FromRow)]
pub struct SeasonRow {
    pub id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub raw: serde_json::Value,
}

impl From<SeasonRow> for Season {
    fn from(row: SeasonRow) -> Self {
        Season {
            id: SeasonId::new(row.id),
            name: row.name,
            start_date: row.start_date,
            end_date: row.end_date,
            raw: row.raw,
        }
    }
}

#[derive(FromRow)]
pub struct CompetitionRow {
    pub id: String,
    pub season_id: String,
    pub name: String,
    pub raw: serde_json::Value,
}

impl From<CompetitionRow> for Competition {
    fn from(row: CompetitionRow) -> Self {
        Competition {
            id: CompetitionId::new(row.id),
            season_id: SeasonId::new(row.season_id),
            name: row.name,
            raw: row.raw,
        }
    }
}

#[derive(FromRow)]
pub struct GroupRow {
    pub id: String,
    pub competition_id: String,
    pub season_id: String,
    pub name: String,
    pub group_type: String,
    pub raw: serde_json::Value,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: GroupId::new(row.id),
            competition_id: CompetitionId::new(row.competition_id),
            season_id: SeasonId::new(row.season_id),
            name: row.name,
            group_type: GroupType::parse(&row.group_type),
            raw: row.raw,
        }
    }
}

#[derive(FromRow)]
pub struct MatchRow {
    pub id: String,
    pub season_id: String,
    pub competition_id: String,
    pub competition_name: String,
    pub group_id: String,
    pub group_name: String,
    pub home_team_id: Option<String>,
    pub home_team_name: Option<String>,
    pub away_team_id: Option<String>,
    pub away_team_name: Option<String>,
    pub date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub venue: Option<String>,
    pub venue_address: Option<String>,
    pub raw: serde_json::Value,
}

impl MatchRow {
    /// `status` is a closed, already-validated vocabulary at write time
    /// (`bulk_replace` only ever persists `MatchStatus::as_str()` values), so
    /// an unparseable row here means the store was written by something
    /// else; that's a data-integrity bug, not a request-time input error, so
    /// it's surfaced as a decode failure rather than silently substituted.
    pub fn try_into_match(self) -> Result<Match, String> {
        let status = MatchStatus::parse(&self.status)
            .ok_or_else(|| format!("unrecognized status {:?} in stored match {}", self.status, self.id))?;
        Ok(Match {
            id: MatchId::new(self.id),
            season_id: SeasonId::new(self.season_id),
            competition_id: CompetitionId::new(self.competition_id),
            competition_name: self.competition_name,
            group_id: GroupId::new(self.group_id),
            group_name: self.group_name,
            home_team_id: self.home_team_id.map(TeamId::new),
            home_team_name: self.home_team_name,
            away_team_id: self.away_team_id.map(TeamId::new),
            away_team_name: self.away_team_name,
            date: self.date,
            end_date: self.end_date,
            status,
            home_score: self.home_score.map(|v| v as u32),
            away_score: self.away_score.map(|v| v as u32),
            venue: self.venue,
            venue_address: self.venue_address,
            raw: self.raw,
        })
    }
}

#[derive(FromRow)]
pub struct MetadataRow {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl From<MetadataRow> for MetadataEntry {
    fn from(row: MetadataRow) -> Self {
        MetadataEntry { key: row.key, value: row.value, updated_at: row.updated_at }
    }
}
