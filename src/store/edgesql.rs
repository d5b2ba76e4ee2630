//! Remote edge-SQL backend (`spec.md` §4.A, `DB_TYPE=edgesql`): a
//! libSQL/Turso-style database reached over HTTP via `EDGESQL_URL` +
//! `EDGESQL_AUTH_TOKEN`. Unlike `file`/`rowstore` this doesn't go through
//! `sqlx` — `libsql`'s remote client has its own connection and row types —
//! so rows are decoded by hand instead of via `store::rows`' `FromRow`
//! derives, though the column layout (and the SQLite dialect of the schema)
//! is the same as `file`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde_json::Value as Json;

use crate::{
    error::{Error, Result},
    model::{
        Competition, CompetitionId, Group, GroupId, GroupType, Match, MatchId, MatchStatus, Season,
        SeasonId, Snapshot, Team, TeamId,
    },
    store::{GroupDimension, MatchFilter, Store, TeamDimension, sql},
};

pub struct EdgeSqlStore {
    conn: Connection,
    _db: Database,
}

impl EdgeSqlStore {
    pub async fn connect(url: &str, auth_token: Option<&str>) -> Result<Self> {
        let db = libsql::Builder::new_remote(url.to_owned(), auth_token.unwrap_or_default().to_owned())
            .build()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let conn = db.connect().map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        conn.execute_batch(sql::CREATE_TABLES_SQLITE).await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let store = Self { conn, _db: db };
        if store.get_metadata(crate::model::METADATA_SCHEMA_VERSION).await?.is_none() {
            store.set_metadata(crate::model::METADATA_SCHEMA_VERSION, super::SCHEMA_VERSION).await?;
        }
        Ok(store)
    }

    async fn query_value(&self, sql: &str, args: impl libsql::params::IntoParams) -> Result<Option<String>> {
        let mut rows = self.conn.query(sql, args).await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        match rows.next().await.map_err(|e| Error::StoreUnavailable(e.to_string()))? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(|e| Error::StoreUnavailable(e.to_string()))?)),
            None => Ok(None),
        }
    }
}

fn decode_match(row: &libsql::Row) -> Result<Match> {
    let get_str = |i: i32| -> Result<String> { row.get::<String>(i).map_err(|e| Error::StoreUnavailable(e.to_string())) };
    let get_opt_str =
        |i: i32| -> Result<Option<String>> { row.get::<Option<String>>(i).map_err(|e| Error::StoreUnavailable(e.to_string())) };
    let get_opt_i64 =
        |i: i32| -> Result<Option<i64>> { row.get::<Option<i64>>(i).map_err(|e| Error::StoreUnavailable(e.to_string())) };
    let get_datetime = |i: i32| -> Result<DateTime<Utc>> {
        get_str(i)?.parse::<DateTime<Utc>>().map_err(|e| Error::StoreUnavailable(e.to_string()))
    };
    let get_opt_datetime = |i: i32| -> Result<Option<DateTime<Utc>>> {
        match get_opt_str(i)? {
            Some(s) => Ok(Some(s.parse::<DateTime<Utc>>().map_err(|e| Error::StoreUnavailable(e.to_string()))?)),
            None => Ok(None),
        }
    };
    let status_str = get_str(12)?;
    let status =
        MatchStatus::parse(&status_str).ok_or_else(|| Error::StoreUnavailable(format!("unrecognized status {status_str:?}")))?;
    let raw: Json = serde_json::from_str(&get_str(17)?).unwrap_or(Json::Null);
    Ok(Match {
        id: MatchId::new(get_str(0)?),
        season_id: SeasonId::new(get_str(1)?),
        competition_id: CompetitionId::new(get_str(2)?),
        competition_name: get_str(3)?,
        group_id: GroupId::new(get_str(4)?),
        group_name: get_str(5)?,
        home_team_id: get_opt_str(6)?.map(TeamId::new),
        home_team_name: get_opt_str(7)?,
        away_team_id: get_opt_str(8)?.map(TeamId::new),
        away_team_name: get_opt_str(9)?,
        date: get_datetime(10)?,
        end_date: get_opt_datetime(11)?,
        status,
        home_score: get_opt_i64(13)?.map(|v| v as u32),
        away_score: get_opt_i64(14)?.map(|v| v as u32),
        venue: get_opt_str(15)?,
        venue_address: get_opt_str(16)?,
        raw,
    })
}

const MATCH_COLUMNS: &str = "id, season_id, competition_id, competition_name, group_id, group_name, \
     home_team_id, home_team_name, away_team_id, away_team_name, date, end_date, \
     status, home_score, away_score, venue, venue_address, raw";

#[async_trait]
impl Store for EdgeSqlStore {
    async fn list_seasons(&self) -> Result<Vec<Season>> {
        let mut rows = self
            .conn
            .query("SELECT id, name, start_date, end_date, raw FROM seasons ORDER BY name DESC", ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::StoreUnavailable(e.to_string()))? {
            let raw_str: String = row.get(4).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            out.push(Season {
                id: SeasonId::new(row.get::<String>(0).map_err(|e| Error::StoreUnavailable(e.to_string()))?),
                name: row.get(1).map_err(|e| Error::StoreUnavailable(e.to_string()))?,
                start_date: row
                    .get::<String>(2)
                    .map_err(|e| Error::StoreUnavailable(e.to_string()))?
                    .parse()
                    .map_err(|e: chrono::ParseError| Error::StoreUnavailable(e.to_string()))?,
                end_date: row
                    .get::<String>(3)
                    .map_err(|e| Error::StoreUnavailable(e.to_string()))?
                    .parse()
                    .map_err(|e: chrono::ParseError| Error::StoreUnavailable(e.to_string()))?,
                raw: serde_json::from_str(&raw_str).unwrap_or(Json::Null),
            });
        }
        Ok(out)
    }

    async fn list_competitions(&self, season_id: &SeasonId) -> Result<Vec<(Competition, Vec<Group>)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, season_id, name, raw FROM competitions WHERE season_id = ? ORDER BY name ASC",
                params![season_id.as_str()],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let mut competitions = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::StoreUnavailable(e.to_string()))? {
            let raw_str: String = row.get(3).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            competitions.push(Competition {
                id: CompetitionId::new(row.get::<String>(0).map_err(|e| Error::StoreUnavailable(e.to_string()))?),
                season_id: SeasonId::new(row.get::<String>(1).map_err(|e| Error::StoreUnavailable(e.to_string()))?),
                name: row.get(2).map_err(|e| Error::StoreUnavailable(e.to_string()))?,
                raw: serde_json::from_str(&raw_str).unwrap_or(Json::Null),
            });
        }
        let mut out = Vec::with_capacity(competitions.len());
        for competition in competitions {
            let groups = self.list_groups(&competition.id).await?;
            out.push((competition, groups));
        }
        Ok(out)
    }

    async fn list_groups(&self, competition_id: &CompetitionId) -> Result<Vec<Group>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, competition_id, season_id, name, group_type, raw FROM groups WHERE competition_id = ? ORDER BY name ASC",
                params![competition_id.as_str()],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::StoreUnavailable(e.to_string()))? {
            let raw_str: String = row.get(5).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            out.push(Group {
                id: GroupId::new(row.get::<String>(0).map_err(|e| Error::StoreUnavailable(e.to_string()))?),
                competition_id: CompetitionId::new(row.get::<String>(1).map_err(|e| Error::StoreUnavailable(e.to_string()))?),
                season_id: SeasonId::new(row.get::<String>(2).map_err(|e| Error::StoreUnavailable(e.to_string()))?),
                name: row.get(3).map_err(|e| Error::StoreUnavailable(e.to_string()))?,
                group_type: GroupType::parse(&row.get::<String>(4).map_err(|e| Error::StoreUnavailable(e.to_string()))?),
                raw: serde_json::from_str(&raw_str).unwrap_or(Json::Null),
            });
        }
        Ok(out)
    }

    async fn list_teams(&self, group_id: &GroupId) -> Result<Vec<Team>> {
        // See `store::file::FileStore::list_teams`: scans matches directly
        // so name-only teams aren't dropped by a join against `teams`.
        let mut rows = self
            .conn
            .query(
                "SELECT m.home_team_id, m.home_team_name, t.logo_url FROM matches m \
                 LEFT JOIN teams t ON t.id = m.home_team_id WHERE m.group_id = ? \
                 UNION ALL \
                 SELECT m.away_team_id, m.away_team_name, t.logo_url FROM matches m \
                 LEFT JOIN teams t ON t.id = m.away_team_id WHERE m.group_id = ?",
                params![group_id.as_str(), group_id.as_str()],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::StoreUnavailable(e.to_string()))? {
            let id = row.get::<Option<String>>(0).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            let name = row.get::<Option<String>>(1).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            let logo_url = row.get::<Option<String>>(2).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            out.push((id, name, logo_url));
        }
        Ok(crate::store::dedupe_team_refs(out))
    }

    async fn find_matches(&self, filter: &MatchFilter) -> Result<Vec<Match>> {
        let mut sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE 1=1 ");
        let mut binds: Vec<libsql::Value> = Vec::new();
        if let Some(season_id) = &filter.season_id {
            sql.push_str("AND season_id = ? ");
            binds.push(season_id.as_str().into());
        }
        match filter.effective_group() {
            GroupDimension::GroupId(id) => {
                sql.push_str("AND group_id = ? ");
                binds.push(id.as_str().into());
            }
            GroupDimension::CompetitionName(name) => {
                sql.push_str("AND LOWER(competition_name) LIKE ? ");
                binds.push(format!("%{}%", name.to_lowercase()).into());
            }
            GroupDimension::None => {}
        }
        match filter.effective_team() {
            TeamDimension::TeamId(id) => {
                sql.push_str("AND (home_team_id = ? OR away_team_id = ?) ");
                binds.push(id.as_str().into());
                binds.push(id.as_str().into());
            }
            TeamDimension::TeamName(name) => {
                let pattern = format!("%{}%", name.to_lowercase());
                sql.push_str("AND (LOWER(home_team_name) LIKE ? OR LOWER(away_team_name) LIKE ?) ");
                binds.push(pattern.clone().into());
                binds.push(pattern.into());
            }
            TeamDimension::None => {}
        }
        if let Some(status) = &filter.status {
            sql.push_str("AND status = ? ");
            binds.push(status.as_str().into());
        }
        if let Some(from) = filter.date_from {
            sql.push_str("AND date >= ? ");
            binds.push(from.to_rfc3339().into());
        }
        if let Some(to) = filter.date_to {
            sql.push_str("AND date <= ? ");
            binds.push(to.to_rfc3339().into());
        }
        sql.push_str("ORDER BY date ASC, id ASC");
        let mut rows = self.conn.query(&sql, binds).await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::StoreUnavailable(e.to_string()))? {
            out.push(decode_match(&row)?);
        }
        Ok(out)
    }

    async fn bulk_replace(&self, snapshot: Snapshot) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        for season in &snapshot.seasons {
            tx.execute(
                "INSERT INTO seasons (id, name, start_date, end_date, raw) VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, start_date = excluded.start_date, \
                 end_date = excluded.end_date, raw = excluded.raw",
                params![
                    season.id.as_str(),
                    season.name.as_str(),
                    season.start_date.to_rfc3339(),
                    season.end_date.to_rfc3339(),
                    serde_json::to_string(&season.raw).unwrap_or_default()
                ],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        for competition in &snapshot.competitions {
            tx.execute(
                "INSERT INTO competitions (id, season_id, name, raw) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET season_id = excluded.season_id, name = excluded.name, raw = excluded.raw",
                params![
                    competition.id.as_str(),
                    competition.season_id.as_str(),
                    competition.name.as_str(),
                    serde_json::to_string(&competition.raw).unwrap_or_default()
                ],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        for group in &snapshot.groups {
            tx.execute(
                "INSERT INTO groups (id, competition_id, season_id, name, group_type, raw) VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET competition_id = excluded.competition_id, \
                 season_id = excluded.season_id, name = excluded.name, group_type = excluded.group_type, raw = excluded.raw",
                params![
                    group.id.as_str(),
                    group.competition_id.as_str(),
                    group.season_id.as_str(),
                    group.name.as_str(),
                    group.group_type.as_str(),
                    serde_json::to_string(&group.raw).unwrap_or_default()
                ],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        for (id, team) in snapshot.teams.iter().filter_map(|t| t.id.as_ref().map(|id| (id, t))) {
            tx.execute(
                "INSERT INTO teams (id, name, logo_url) VALUES (?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, logo_url = excluded.logo_url",
                params![id.as_str(), team.name.as_str(), team.logo_url.clone()],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        for m in &snapshot.matches {
            tx.execute(
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
                params![
                    m.id.as_str(),
                    m.season_id.as_str(),
                    m.competition_id.as_str(),
                    m.competition_name.as_str(),
                    m.group_id.as_str(),
                    m.group_name.as_str(),
                    m.home_team_id.as_ref().map(|id| id.as_str().to_owned()),
                    m.home_team_name.clone(),
                    m.away_team_id.as_ref().map(|id| id.as_str().to_owned()),
                    m.away_team_name.clone(),
                    m.date.to_rfc3339(),
                    m.end_date.map(|d| d.to_rfc3339()),
                    m.status.as_str(),
                    m.home_score.map(|v| v as i64),
                    m.away_score.map(|v| v as i64),
                    m.venue.clone(),
                    m.venue_address.clone(),
                    serde_json::to_string(&m.raw).unwrap_or_default()
                ],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        for standings in &snapshot.standings {
            tx.execute(
                "INSERT INTO standings (group_id, raw, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(group_id) DO UPDATE SET raw = excluded.raw, updated_at = excluded.updated_at",
                params![
                    standings.group_id.as_str(),
                    serde_json::to_string(&standings.raw).unwrap_or_default(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        tx.execute(
            "INSERT INTO metadata (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![crate::model::METADATA_LAST_SCRAPE_COMPLETED_AT, Utc::now().to_rfc3339(), Utc::now().to_rfc3339()],
        )
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        tx.commit().await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.query_value("SELECT value FROM metadata WHERE key = ?", params![key.to_owned()]).await
    }

    async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO metadata (key, value, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key.to_owned(), value.to_owned(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    /// A remote libSQL replica has no local file this process can stat
    /// directly either, so this mirrors `rowstore`'s `None` (`spec.md` §4.A).
    async fn database_size_bytes(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}
