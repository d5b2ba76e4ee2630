//! Embedded file-backed store (`spec.md` §4.A, `DB_TYPE=file`): a single
//! SQLite database under `DATA_DIR`, opened in WAL mode so the HTTP server's
//! readers don't block on the scraper's writer. Schema lives in
//! `store::sql::CREATE_TABLES_SQLITE`, shared row decoding in `store::rows`.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as Json;
use sqlx::{Sqlite, SqlitePool, QueryBuilder, sqlite::SqliteConnectOptions};

use crate::{
    error::{Error, Result},
    model::{Competition, CompetitionId, Group, GroupId, Match, Season, SeasonId, Snapshot, Team},
    store::{
        MatchFilter, Store,
        rows::{CompetitionRow, GroupRow, MatchRow, MetadataRow, SeasonRow},
        sql::{self, push_find_matches_where},
    },
};

pub struct FileStore {
    pool: SqlitePool,
}

impl FileStore {
    /// Opens (creating if absent) the SQLite file at `path`, enables WAL,
    /// and runs the idempotent `CREATE TABLE IF NOT EXISTS` schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::raw_sql(sql::CREATE_TABLES_SQLITE).execute(&pool).await?;
        let store = Self { pool };
        if store.get_metadata(crate::model::METADATA_SCHEMA_VERSION).await?.is_none() {
            store.set_metadata(crate::model::METADATA_SCHEMA_VERSION, super::SCHEMA_VERSION).await?;
        }
        Ok(store)
    }
}

#[async_trait]
impl Store for FileStore {
    async fn list_seasons(&self) -> Result<Vec<Season>> {
        let rows: Vec<SeasonRow> = sqlx::query_as("SELECT id, name, start_date, end_date, raw FROM seasons ORDER BY name DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Season::from).collect())
    }

    async fn list_competitions(&self, season_id: &SeasonId) -> Result<Vec<(Competition, Vec<Group>)>> {
        let competitions: Vec<CompetitionRow> = sqlx::query_as(
            "SELECT id, season_id, name, raw FROM competitions WHERE season_id = ? ORDER BY name ASC",
        )
        .bind(season_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(competitions.len());
        for row in competitions {
            let competition: Competition = row.into();
            let groups = self.list_groups(&competition.id).await?;
            out.push((competition, groups));
        }
        Ok(out)
    }

    async fn list_groups(&self, competition_id: &CompetitionId) -> Result<Vec<Group>> {
        let rows: Vec<GroupRow> = sqlx::query_as(
            "SELECT id, competition_id, season_id, name, group_type, raw FROM groups WHERE competition_id = ? ORDER BY name ASC",
        )
        .bind(competition_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn list_teams(&self, group_id: &GroupId) -> Result<Vec<Team>> {
        // Scans the group's matches directly instead of joining `teams`, so
        // a name-only team (no paired id, unpaired playoff slot) still
        // surfaces (`spec.md` §4.F). `teams.logo_url` is a best-effort
        // enrichment for rows that do carry an id.
        let rows: Vec<(Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT m.home_team_id, m.home_team_name, t.logo_url FROM matches m \
             LEFT JOIN teams t ON t.id = m.home_team_id WHERE m.group_id = ? \
             UNION ALL \
             SELECT m.away_team_id, m.away_team_name, t.logo_url FROM matches m \
             LEFT JOIN teams t ON t.id = m.away_team_id WHERE m.group_id = ?",
        )
        .bind(group_id.as_str())
        .bind(group_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(crate::store::dedupe_team_refs(rows))
    }

    async fn find_matches(&self, filter: &MatchFilter) -> Result<Vec<Match>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, season_id, competition_id, competition_name, group_id, group_name, \
             home_team_id, home_team_name, away_team_id, away_team_name, date, end_date, \
             status, home_score, away_score, venue, venue_address, raw FROM matches",
        );
        push_find_matches_where(&mut qb, filter);
        let rows: Vec<MatchRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into_match().map_err(Error::StoreUnavailable)).collect()
    }

    async fn bulk_replace(&self, snapshot: Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for season in &snapshot.seasons {
            sqlx::query(
                "INSERT INTO seasons (id, name, start_date, end_date, raw) VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, start_date = excluded.start_date, \
                 end_date = excluded.end_date, raw = excluded.raw",
            )
            .bind(season.id.as_str())
            .bind(&season.name)
            .bind(season.start_date)
            .bind(season.end_date)
            .bind(Json::to_string(&season.raw).unwrap_or_default())
            .execute(&mut *tx)
            .await?;
        }
        for competition in &snapshot.competitions {
            sqlx::query(
                "INSERT INTO competitions (id, season_id, name, raw) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET season_id = excluded.season_id, name = excluded.name, raw = excluded.raw",
            )
            .bind(competition.id.as_str())
            .bind(competition.season_id.as_str())
            .bind(&competition.name)
            .bind(Json::to_string(&competition.raw).unwrap_or_default())
            .execute(&mut *tx)
            .await?;
        }
        for group in &snapshot.groups {
            sqlx::query(
                "INSERT INTO groups (id, competition_id, season_id, name, group_type, raw) VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET competition_id = excluded.competition_id, \
                 season_id = excluded.season_id, name = excluded.name, group_type = excluded.group_type, raw = excluded.raw",
            )
            .bind(group.id.as_str())
            .bind(group.competition_id.as_str())
            .bind(group.season_id.as_str())
            .bind(&group.name)
            .bind(group.group_type.as_str())
            .bind(Json::to_string(&group.raw).unwrap_or_default())
            .execute(&mut *tx)
            .await?;
        }
        // Only id-qualified teams get a row here; name-only teams are
        // derived on read by `list_teams` scanning `matches` directly.
        for team in snapshot.teams.iter().filter_map(|t| t.id.as_ref().map(|id| (id, t))) {
            let (id, team) = team;
            sqlx::query(
                "INSERT INTO teams (id, name, logo_url) VALUES (?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, logo_url = excluded.logo_url",
            )
            .bind(id.as_str())
            .bind(&team.name)
            .bind(&team.logo_url)
            .execute(&mut *tx)
            .await?;
        }
        for m in &snapshot.matches {
            sqlx::query(
                "INSERT INTO matches (id, season_id, competition_id, competition_name, group_id, group_name, \
                 home_team_id, home_team_name, away_team_id, away_team_name, date, end_date, status, \
                 home_score, away_score, venue, venue_address, raw) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET season_id = excluded.season_id, competition_id = excluded.competition_id, \
                 competition_name = excluded.competition_name, group_id = excluded.group_id, group_name = excluded.group_name, \
                 home_team_id = excluded.home_team_id, home_team_name = excluded.home_team_name, \
                 away_team_id = excluded.away_team_id, away_team_name = excluded.away_team_name, \
                 date = excluded.date, end_date = excluded.end_date, status = excluded.status, \
                 home_score = excluded.home_score, away_score = excluded.away_score, \
                 venue = excluded.venue, venue_address = excluded.venue_address, raw = excluded.raw",
            )
            .bind(m.id.as_str())
            .bind(m.season_id.as_str())
            .bind(m.competition_id.as_str())
            .bind(&m.competition_name)
            .bind(m.group_id.as_str())
            .bind(&m.group_name)
            .bind(m.home_team_id.as_ref().map(|id| id.as_str()))
            .bind(&m.home_team_name)
            .bind(m.away_team_id.as_ref().map(|id| id.as_str()))
            .bind(&m.away_team_name)
            .bind(m.date)
            .bind(m.end_date)
            .bind(m.status.as_str())
            .bind(m.home_score.map(|v| v as i64))
            .bind(m.away_score.map(|v| v as i64))
            .bind(&m.venue)
            .bind(&m.venue_address)
            .bind(Json::to_string(&m.raw).unwrap_or_default())
            .execute(&mut *tx)
            .await?;
        }
        for standings in &snapshot.standings {
            sqlx::query(
                "INSERT INTO standings (group_id, raw, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(group_id) DO UPDATE SET raw = excluded.raw, updated_at = excluded.updated_at",
            )
            .bind(standings.group_id.as_str())
            .bind(Json::to_string(&standings.raw).unwrap_or_default())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "INSERT INTO metadata (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(crate::model::METADATA_LAST_SCRAPE_COMPLETED_AT)
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row: Option<MetadataRow> = sqlx::query_as("SELECT key, value, updated_at FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.value))
    }

    async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO metadata (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn database_size_bytes(&self) -> Result<Option<u64>> {
        let (size,): (i64,) =
            sqlx::query_as("SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()")
                .fetch_one(&self.pool)
                .await?;
        Ok(Some(size.max(0) as u64))
    }
}
