//! Remote row-store backend (`spec.md` §4.A, `DB_TYPE=rowstore`): Postgres
//! reached over `ROWSTORE_URL`, `raw` columns stored as native `JSONB`. The
//! schema in `store::sql::CREATE_TABLES_POSTGRES` also enables row-level
//! security on `matches` and installs a permissive read policy, modeling the
//! "row-level read policies" posture the spec calls for without this
//! process itself being subject to a policy narrower than its own writes.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions};

use crate::{
    error::{Error, Result},
    model::{Competition, CompetitionId, Group, GroupId, Match, Season, SeasonId, Snapshot, Team},
    store::{
        MatchFilter, Store,
        rows::{CompetitionRow, GroupRow, MatchRow, MetadataRow, SeasonRow},
        sql::{self, push_find_matches_where},
    },
};

pub struct RowStore {
    pool: PgPool,
}

impl RowStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        sqlx::raw_sql(sql::CREATE_TABLES_POSTGRES).execute(&pool).await?;
        let store = Self { pool };
        if store.get_metadata(crate::model::METADATA_SCHEMA_VERSION).await?.is_none() {
            store.set_metadata(crate::model::METADATA_SCHEMA_VERSION, super::SCHEMA_VERSION).await?;
        }
        Ok(store)
    }
}

#[async_trait]
impl Store for RowStore {
    async fn list_seasons(&self) -> Result<Vec<Season>> {
        let rows: Vec<SeasonRow> = sqlx::query_as("SELECT id, name, start_date, end_date, raw FROM seasons ORDER BY name DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Season::from).collect())
    }

    async fn list_competitions(&self, season_id: &SeasonId) -> Result<Vec<(Competition, Vec<Group>)>> {
        let competitions: Vec<CompetitionRow> = sqlx::query_as(
            "SELECT id, season_id, name, raw FROM competitions WHERE season_id = $1 ORDER BY name ASC",
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
            "SELECT id, competition_id, season_id, name, group_type, raw FROM groups WHERE competition_id = $1 ORDER BY name ASC",
        )
        .bind(competition_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn list_teams(&self, group_id: &GroupId) -> Result<Vec<Team>> {
        // See `store::file::FileStore::list_teams`: scans matches directly
        // so name-only teams aren't dropped by a join against `teams`.
        let rows: Vec<(Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT m.home_team_id, m.home_team_name, t.logo_url FROM matches m \
             LEFT JOIN teams t ON t.id = m.home_team_id WHERE m.group_id = $1 \
             UNION ALL \
             SELECT m.away_team_id, m.away_team_name, t.logo_url FROM matches m \
             LEFT JOIN teams t ON t.id = m.away_team_id WHERE m.group_id = $1",
        )
        .bind(group_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(crate::store::dedupe_team_refs(rows))
    }

    async fn find_matches(&self, filter: &MatchFilter) -> Result<Vec<Match>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
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
                "INSERT INTO seasons (id, name, start_date, end_date, raw) VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, start_date = excluded.start_date, \
                 end_date = excluded.end_date, raw = excluded.raw",
            )
            .bind(season.id.as_str())
            .bind(&season.name)
            .bind(season.start_date)
            .bind(season.end_date)
            .bind(&season.raw)
            .execute(&mut *tx)
            .await?;
        }
        for competition in &snapshot.competitions {
            sqlx::query(
                "INSERT INTO competitions (id, season_id, name, raw) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT(id) DO UPDATE SET season_id = excluded.season_id, name = excluded.name, raw = excluded.raw",
            )
            .bind(competition.id.as_str())
            .bind(competition.season_id.as_str())
            .bind(&competition.name)
            .bind(&competition.raw)
            .execute(&mut *tx)
            .await?;
        }
        for group in &snapshot.groups {
            sqlx::query(
                "INSERT INTO groups (id, competition_id, season_id, name, group_type, raw) VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT(id) DO UPDATE SET competition_id = excluded.competition_id, \
                 season_id = excluded.season_id, name = excluded.name, group_type = excluded.group_type, raw = excluded.raw",
            )
            .bind(group.id.as_str())
            .bind(group.competition_id.as_str())
            .bind(group.season_id.as_str())
            .bind(&group.name)
            .bind(group.group_type.as_str())
            .bind(&group.raw)
            .execute(&mut *tx)
            .await?;
        }
        for (id, team) in snapshot.teams.iter().filter_map(|t| t.id.as_ref().map(|id| (id, t))) {
            sqlx::query(
                "INSERT INTO teams (id, name, logo_url) VALUES ($1, $2, $3) \
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
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
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
            .bind(&m.raw)
            .execute(&mut *tx)
            .await?;
        }
        for standings in &snapshot.standings {
            sqlx::query(
                "INSERT INTO standings (group_id, raw, updated_at) VALUES ($1, $2, $3) \
                 ON CONFLICT(group_id) DO UPDATE SET raw = excluded.raw, updated_at = excluded.updated_at",
            )
            .bind(standings.group_id.as_str())
            .bind(&standings.raw)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "INSERT INTO metadata (key, value, updated_at) VALUES ($1, $2, $3) \
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
        let row: Option<MetadataRow> = sqlx::query_as("SELECT key, value, updated_at FROM metadata WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.value))
    }

    async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO metadata (key, value, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remote managed Postgres: no filesystem path this process can stat, so
    /// the cache-info surface reports `None` here per `spec.md` §4.A.
    async fn database_size_bytes(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}
