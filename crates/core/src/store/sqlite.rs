use super::MatchStore;
use crate::error::MatchcastError;
use crate::model::{Match, MatchEvent, MatchEventType, MatchStatus, Team};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    short_code TEXT NOT NULL,
    logo_url TEXT
);
CREATE TABLE IF NOT EXISTS matches (
    id TEXT PRIMARY KEY,
    home_team_id TEXT NOT NULL REFERENCES teams(id),
    away_team_id TEXT NOT NULL REFERENCES teams(id),
    home_score INTEGER NOT NULL DEFAULT 0,
    away_score INTEGER NOT NULL DEFAULT 0,
    minute INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'NOT_STARTED',
    start_time TEXT NOT NULL,
    half_time_start INTEGER
);
CREATE TABLE IF NOT EXISTS match_events (
    id TEXT PRIMARY KEY,
    match_id TEXT NOT NULL REFERENCES matches(id),
    type TEXT NOT NULL,
    minute INTEGER NOT NULL,
    team_id TEXT REFERENCES teams(id),
    player TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status);
CREATE INDEX IF NOT EXISTS idx_match_events_match ON match_events(match_id);
"#;

const MATCH_SELECT: &str = r#"
SELECT m.id, m.home_score, m.away_score, m.minute, m.status, m.start_time, m.half_time_start,
       h.id, h.name, h.short_code, h.logo_url,
       a.id, a.name, a.short_code, a.logo_url
FROM matches m
JOIN teams h ON h.id = m.home_team_id
JOIN teams a ON a.id = m.away_team_id
"#;

const EVENT_SELECT: &str = r#"
SELECT e.id, e.match_id, e.type, e.minute, e.player, e.created_at,
       t.id, t.name, t.short_code, t.logo_url
FROM match_events e
LEFT JOIN teams t ON t.id = e.team_id
"#;

/// SQLite-backed store. Each call opens its own connection on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: PathBuf) -> Result<Self, MatchcastError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { path };
        let conn = store.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection, MatchcastError> {
        open_connection(&self.path)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, MatchcastError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, MatchcastError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&path)?;
            f(&mut conn)
        })
        .await?
    }

    /// Insert the reference teams and three live matches when no team exists yet.
    /// Returns the matches created, empty if the store was already seeded.
    pub async fn seed_defaults(&self) -> Result<Vec<Match>, MatchcastError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;
            if count > 0 {
                return Ok(Vec::new());
            }

            tracing::info!("Seeding initial data...");
            let teams = super::default_teams();
            let tx = conn.transaction()?;
            for team in &teams {
                upsert_team(&tx, team)?;
            }
            let mut seeded = Vec::new();
            for pair in teams.windows(2).take(3) {
                let m = Match::new(pair[0].clone(), pair[1].clone())
                    .with_status(MatchStatus::FirstHalf);
                upsert_match(&tx, &m)?;
                seeded.push(m);
            }
            tx.commit()?;
            Ok(seeded)
        })
        .await
    }
}

fn open_connection(path: &Path) -> Result<Connection, MatchcastError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

fn upsert_team(conn: &Connection, team: &Team) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO teams (id, name, short_code, logo_url) VALUES (?1, ?2, ?3, ?4)",
        params![team.id, team.name, team.short_code, team.logo_url],
    )?;
    Ok(())
}

fn upsert_match(conn: &Connection, m: &Match) -> rusqlite::Result<()> {
    upsert_team(conn, &m.home_team)?;
    upsert_team(conn, &m.away_team)?;
    conn.execute(
        r#"
INSERT INTO matches (id, home_team_id, away_team_id, home_score, away_score, minute, status, start_time, half_time_start)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(id) DO UPDATE SET
    home_score = excluded.home_score,
    away_score = excluded.away_score,
    minute = excluded.minute,
    status = excluded.status,
    half_time_start = excluded.half_time_start
"#,
        params![
            m.id,
            m.home_team.id,
            m.away_team.id,
            m.home_score,
            m.away_score,
            m.minute,
            m.status.as_str(),
            m.start_time.to_rfc3339(),
            m.half_time_start,
        ],
    )?;
    Ok(())
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_time(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e)))
}

fn team_at(row: &Row<'_>, start: usize) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(start)?,
        name: row.get(start + 1)?,
        short_code: row.get(start + 2)?,
        logo_url: row.get(start + 3)?,
    })
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<Match> {
    let status: String = row.get(4)?;
    let status = MatchStatus::parse(&status)
        .ok_or_else(|| conversion_error(4, format!("unknown match status '{}'", status)))?;
    Ok(Match {
        id: row.get(0)?,
        home_score: row.get(1)?,
        away_score: row.get(2)?,
        minute: row.get(3)?,
        status,
        start_time: parse_time(5, row.get(5)?)?,
        half_time_start: row.get(6)?,
        home_team: team_at(row, 7)?,
        away_team: team_at(row, 11)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<MatchEvent> {
    let kind: String = row.get(2)?;
    let event_type = MatchEventType::parse(&kind)
        .ok_or_else(|| conversion_error(2, format!("unknown event type '{}'", kind)))?;
    let team_id: Option<String> = row.get(6)?;
    let team = match team_id {
        Some(_) => Some(team_at(row, 6)?),
        None => None,
    };
    Ok(MatchEvent {
        id: row.get(0)?,
        match_id: row.get(1)?,
        event_type,
        minute: row.get(3)?,
        player: row.get(4)?,
        created_at: parse_time(5, row.get(5)?)?,
        team,
    })
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn load_live_matches(&self, statuses: &[MatchStatus]) -> Result<Vec<Match>, MatchcastError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let statuses: Vec<&'static str> = statuses.iter().map(|s| s.as_str()).collect();
        self.with_conn(move |conn| {
            let placeholders = vec!["?"; statuses.len()].join(", ");
            let sql = format!("{} WHERE m.status IN ({})", MATCH_SELECT, placeholders);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(statuses.iter()), match_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    async fn save(&self, m: &Match) -> Result<Match, MatchcastError> {
        let m = m.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            upsert_match(&tx, &m)?;
            tx.commit()?;
            Ok(m)
        })
        .await
    }

    async fn create_event(&self, event: &MatchEvent) -> Result<MatchEvent, MatchcastError> {
        let event = event.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if let Some(team) = &event.team {
                upsert_team(&tx, team)?;
            }
            tx.execute(
                "INSERT INTO match_events (id, match_id, type, minute, team_id, player, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id,
                    event.match_id,
                    event.event_type.as_str(),
                    event.minute,
                    event.team.as_ref().map(|t| t.id.as_str()),
                    event.player,
                    event.created_at.to_rfc3339(),
                ],
            )?;
            tx.commit()?;
            Ok(event)
        })
        .await
    }

    async fn list_matches(&self) -> Result<Vec<Match>, MatchcastError> {
        self.with_conn(|conn| {
            let sql = format!("{} ORDER BY m.start_time DESC", MATCH_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], match_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    async fn find_match(&self, id: &str) -> Result<Option<Match>, MatchcastError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("{} WHERE m.id = ?1", MATCH_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query_map(params![id], match_from_row)?;
            let found = rows.next().transpose()?;
            Ok(found)
        })
        .await
    }

    async fn events_for(&self, match_id: &str) -> Result<Vec<MatchEvent>, MatchcastError> {
        let match_id = match_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("{} WHERE e.match_id = ?1 ORDER BY e.rowid", EVENT_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![match_id], event_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }
}
