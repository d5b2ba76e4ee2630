//! SQL shared between the two `sqlx`-backed stores (`file`, `rowstore`).
//! `sqlx::QueryBuilder` renders the right placeholder syntax (`?` for
//! SQLite, `$1…` for Postgres) for whichever `DB` it's instantiated with, so
//! the `WHERE`-clause construction for `find_matches` is written once here
//! instead of duplicated per backend with hand-rolled placeholders.

use chrono::{DateTime, Utc};
use sqlx::{Database, Encode, QueryBuilder, Type};

use crate::store::{GroupDimension, MatchFilter, TeamDimension};

pub const CREATE_TABLES_SQLITE: &str = r#"
CREATE TABLE IF NOT EXISTS seasons (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    raw TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS competitions (
    id TEXT PRIMARY KEY,
    season_id TEXT NOT NULL REFERENCES seasons(id),
    name TEXT NOT NULL,
    raw TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_competitions_season ON competitions(season_id);
CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    competition_id TEXT NOT NULL REFERENCES competitions(id),
    season_id TEXT NOT NULL REFERENCES seasons(id),
    name TEXT NOT NULL,
    group_type TEXT NOT NULL,
    raw TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_groups_competition ON groups(competition_id);
CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    logo_url TEXT
);
CREATE TABLE IF NOT EXISTS matches (
    id TEXT PRIMARY KEY,
    season_id TEXT NOT NULL,
    competition_id TEXT NOT NULL,
    competition_name TEXT NOT NULL,
    group_id TEXT NOT NULL,
    group_name TEXT NOT NULL,
    home_team_id TEXT,
    home_team_name TEXT,
    away_team_id TEXT,
    away_team_name TEXT,
    date TEXT NOT NULL,
    end_date TEXT,
    status TEXT NOT NULL,
    home_score INTEGER,
    away_score INTEGER,
    venue TEXT,
    venue_address TEXT,
    raw TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season_id);
CREATE INDEX IF NOT EXISTS idx_matches_group ON matches(group_id);
CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status);
CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);
CREATE INDEX IF NOT EXISTS idx_matches_home_team ON matches(home_team_id);
CREATE INDEX IF NOT EXISTS idx_matches_away_team ON matches(away_team_id);
CREATE INDEX IF NOT EXISTS idx_matches_competition_name_ci ON matches(competition_name COLLATE NOCASE);
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS standings (
    group_id TEXT PRIMARY KEY REFERENCES groups(id),
    raw TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub const CREATE_TABLES_POSTGRES: &str = r#"
CREATE TABLE IF NOT EXISTS seasons (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    start_date TIMESTAMPTZ NOT NULL,
    end_date TIMESTAMPTZ NOT NULL,
    raw JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS competitions (
    id TEXT PRIMARY KEY,
    season_id TEXT NOT NULL REFERENCES seasons(id),
    name TEXT NOT NULL,
    raw JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_competitions_season ON competitions(season_id);
CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    competition_id TEXT NOT NULL REFERENCES competitions(id),
    season_id TEXT NOT NULL REFERENCES seasons(id),
    name TEXT NOT NULL,
    group_type TEXT NOT NULL,
    raw JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_groups_competition ON groups(competition_id);
CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    logo_url TEXT
);
CREATE TABLE IF NOT EXISTS matches (
    id TEXT PRIMARY KEY,
    season_id TEXT NOT NULL,
    competition_id TEXT NOT NULL,
    competition_name TEXT NOT NULL,
    group_id TEXT NOT NULL,
    group_name TEXT NOT NULL,
    home_team_id TEXT,
    home_team_name TEXT,
    away_team_id TEXT,
    away_team_name TEXT,
    date TIMESTAMPTZ NOT NULL,
    end_date TIMESTAMPTZ,
    status TEXT NOT NULL,
    home_score INTEGER,
    away_score INTEGER,
    venue TEXT,
    venue_address TEXT,
    raw JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season_id);
CREATE INDEX IF NOT EXISTS idx_matches_group ON matches(group_id);
CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status);
CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);
CREATE INDEX IF NOT EXISTS idx_matches_home_team ON matches(home_team_id);
CREATE INDEX IF NOT EXISTS idx_matches_away_team ON matches(away_team_id);
CREATE INDEX IF NOT EXISTS idx_matches_competition_name_ci ON matches(lower(competition_name));
-- Row-level read policy modeling "remote row-store with ... row-level read
-- policies" (spec.md §4.A). This process connects as the owning role and is
-- not itself subject to the policy; it documents the intended posture for
-- any other role reading this table.
ALTER TABLE matches ENABLE ROW LEVEL SECURITY;
DO $$ BEGIN
    CREATE POLICY matches_read_all ON matches FOR SELECT USING (true);
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS standings (
    group_id TEXT PRIMARY KEY REFERENCES groups(id),
    raw JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
"#;

/// Appends the `WHERE` clause for `find_matches` to `qb`, applying the
/// same ID-wins-over-name precedence for every backend
/// (`MatchFilter::effective_group`/`effective_team`).
pub fn push_find_matches_where<'a, DB>(qb: &mut QueryBuilder<'a, DB>, filter: &'a MatchFilter)
where
    DB: Database,
    String: Type<DB> + Encode<'a, DB>,
    DateTime<Utc>: Type<DB> + Encode<'a, DB>,
{
    qb.push(" WHERE 1=1 ");
    if let Some(season_id) = &filter.season_id {
        qb.push(" AND season_id = ").push_bind(season_id.as_str().to_owned());
    }
    match filter.effective_group() {
        GroupDimension::GroupId(id) => {
            qb.push(" AND group_id = ").push_bind(id.as_str().to_owned());
        }
        GroupDimension::CompetitionName(name) => {
            qb.push(" AND LOWER(competition_name) LIKE ").push_bind(format!("%{}%", name.to_lowercase()));
        }
        GroupDimension::None => {}
    }
    match filter.effective_team() {
        TeamDimension::TeamId(id) => {
            let id = id.as_str().to_owned();
            qb.push(" AND (home_team_id = ").push_bind(id.clone()).push(" OR away_team_id = ").push_bind(id).push(")");
        }
        TeamDimension::TeamName(name) => {
            let pattern = format!("%{}%", name.to_lowercase());
            qb.push(" AND (LOWER(home_team_name) LIKE ").push_bind(pattern.clone())
                .push(" OR LOWER(away_team_name) LIKE ").push_bind(pattern).push(")");
        }
        TeamDimension::None => {}
    }
    if let Some(status) = &filter.status {
        qb.push(" AND status = ").push_bind(status.as_str().to_owned());
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND date <= ").push_bind(to);
    }
    qb.push(" ORDER BY date ASC, id ASC");
}
