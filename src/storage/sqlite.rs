//! SQLite-backed persistence for goals, preferences, check-ins and progress snapshots.
//!
//! Every write is an upsert. In-memory state stays authoritative; callers log and
//! drop persistence errors.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::goals::{Cadence, Goal};
use crate::habits::{CheckinRecord, CheckinStatus, UserProgress};
use crate::scheduler::Preferences;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS goals (
        user_id TEXT NOT NULL,
        goal_id TEXT NOT NULL,
        title TEXT NOT NULL,
        category TEXT NOT NULL,
        cadence TEXT NOT NULL,
        active INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER,
        PRIMARY KEY (user_id, goal_id)
    );
    CREATE TABLE IF NOT EXISTS prefs (
        user_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (user_id, key)
    );
    CREATE TABLE IF NOT EXISTS checkins (
        user_id TEXT NOT NULL,
        date TEXT NOT NULL,
        status TEXT NOT NULL,
        focus_area TEXT NOT NULL,
        task TEXT NOT NULL,
        difficulty INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (user_id, date)
    );
    CREATE TABLE IF NOT EXISTS user_stats (
        user_id TEXT PRIMARY KEY,
        snapshot TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Persistence(format!("sqlite open: {}", e)))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Persistence(format!("sqlite open: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Persistence(format!("sqlite init: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn upsert_goal(&self, user_id: &str, goal: &Goal) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO goals (user_id, goal_id, title, category, cadence, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(user_id, goal_id) DO UPDATE SET
                    title = excluded.title,
                    category = excluded.category,
                    cadence = excluded.cadence,
                    active = excluded.active,
                    updated_at = excluded.updated_at",
                params![
                    user_id,
                    goal.id,
                    goal.title,
                    goal.category,
                    goal.cadence.to_string(),
                    goal.active,
                    goal.created_at.timestamp_millis(),
                    goal.updated_at.map(|t| t.timestamp_millis()),
                ],
            )
            .map_err(|e| Error::Persistence(format!("sqlite upsert goal: {}", e)))?;
        Ok(())
    }

    pub fn delete_goal(&self, user_id: &str, goal_id: &str) -> Result<usize> {
        self.conn()
            .execute(
                "DELETE FROM goals WHERE user_id = ?1 AND goal_id = ?2",
                params![user_id, goal_id],
            )
            .map_err(|e| Error::Persistence(format!("sqlite delete goal: {}", e)))
    }

    pub fn load_goals(&self) -> Result<HashMap<String, Vec<Goal>>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT user_id, goal_id, title, category, cadence, active, created_at, updated_at
                 FROM goals ORDER BY created_at ASC",
            )
            .map_err(|e| Error::Persistence(format!("sqlite prepare goals: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                let cadence: String = row.get(4)?;
                let created_at: i64 = row.get(6)?;
                let updated_at: Option<i64> = row.get(7)?;
                Ok((
                    row.get::<_, String>(0)?,
                    Goal {
                        id: row.get(1)?,
                        title: row.get(2)?,
                        category: row.get(3)?,
                        cadence: cadence.parse().unwrap_or(Cadence::Daily),
                        active: row.get(5)?,
                        created_at: from_millis(created_at),
                        updated_at: updated_at.map(from_millis),
                    },
                ))
            })
            .map_err(|e| Error::Persistence(format!("sqlite query goals: {}", e)))?;

        let mut goals: HashMap<String, Vec<Goal>> = HashMap::new();
        for row in rows {
            let (user_id, goal) =
                row.map_err(|e| Error::Persistence(format!("sqlite read goal: {}", e)))?;
            goals.entry(user_id).or_default().push(goal);
        }
        Ok(goals)
    }

    pub fn upsert_prefs(&self, user_id: &str, prefs: &Preferences) -> Result<()> {
        let channels = serde_json::to_string(&prefs.channels)?;
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Persistence(format!("sqlite begin: {}", e)))?;
        for (key, value) in [
            ("tz", prefs.tz.as_str()),
            ("checkin_time", prefs.checkin_time.as_str()),
            ("channels", channels.as_str()),
        ] {
            tx.execute(
                "INSERT INTO prefs (user_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value",
                params![user_id, key, value],
            )
            .map_err(|e| Error::Persistence(format!("sqlite upsert prefs: {}", e)))?;
        }
        tx.commit()
            .map_err(|e| Error::Persistence(format!("sqlite commit prefs: {}", e)))?;
        Ok(())
    }

    pub fn load_prefs(&self) -> Result<HashMap<String, Preferences>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT user_id, key, value FROM prefs")
            .map_err(|e| Error::Persistence(format!("sqlite prepare prefs: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| Error::Persistence(format!("sqlite query prefs: {}", e)))?;

        let mut raw: HashMap<String, HashMap<String, String>> = HashMap::new();
        for row in rows {
            let (user_id, key, value) =
                row.map_err(|e| Error::Persistence(format!("sqlite read prefs: {}", e)))?;
            raw.entry(user_id).or_default().insert(key, value);
        }

        Ok(raw
            .into_iter()
            .filter_map(|(user_id, mut kv)| {
                let prefs = Preferences {
                    tz: kv.remove("tz")?,
                    checkin_time: kv.remove("checkin_time")?,
                    channels: kv
                        .remove("channels")
                        .and_then(|c| serde_json::from_str::<BTreeSet<String>>(&c).ok())
                        .unwrap_or_default(),
                };
                Some((user_id, prefs))
            })
            .collect())
    }

    pub fn upsert_checkin(&self, user_id: &str, record: &CheckinRecord) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO checkins (user_id, date, status, focus_area, task, difficulty, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(user_id, date) DO UPDATE SET
                    status = excluded.status,
                    focus_area = excluded.focus_area,
                    task = excluded.task,
                    difficulty = excluded.difficulty,
                    created_at = excluded.created_at",
                params![
                    user_id,
                    record.date.to_string(),
                    record.status.as_str(),
                    record.focus_area,
                    record.task,
                    record.difficulty,
                    record.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| Error::Persistence(format!("sqlite upsert checkin: {}", e)))?;
        Ok(())
    }

    pub fn get_checkin(&self, user_id: &str, date: NaiveDate) -> Result<Option<CheckinRecord>> {
        self.conn()
            .query_row(
                "SELECT status, focus_area, task, difficulty, created_at
                 FROM checkins WHERE user_id = ?1 AND date = ?2",
                params![user_id, date.to_string()],
                |row| {
                    let status: String = row.get(0)?;
                    Ok(CheckinRecord {
                        date,
                        status: CheckinStatus::parse(&status),
                        focus_area: row.get(1)?,
                        task: row.get(2)?,
                        difficulty: row.get(3)?,
                        created_at: from_millis(row.get(4)?),
                    })
                },
            )
            .optional()
            .map_err(|e| Error::Persistence(format!("sqlite get checkin: {}", e)))
    }

    /// Every stored check-in, grouped per user and keyed by local date.
    pub fn load_checkins(&self) -> Result<HashMap<String, BTreeMap<NaiveDate, CheckinRecord>>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT user_id, date, status, focus_area, task, difficulty, created_at
                 FROM checkins",
            )
            .map_err(|e| Error::Persistence(format!("sqlite prepare checkins: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u8>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })
            .map_err(|e| Error::Persistence(format!("sqlite query checkins: {}", e)))?;

        let mut checkins: HashMap<String, BTreeMap<NaiveDate, CheckinRecord>> = HashMap::new();
        for row in rows {
            let (user_id, date, status, focus_area, task, difficulty, created_at) =
                row.map_err(|e| Error::Persistence(format!("sqlite read checkins: {}", e)))?;
            let Ok(date) = date.parse::<NaiveDate>() else {
                tracing::warn!(user_id, date, "Skipping check-in with unreadable date");
                continue;
            };
            let record = CheckinRecord {
                date,
                status: CheckinStatus::parse(&status),
                focus_area,
                task,
                difficulty,
                created_at: from_millis(created_at),
            };
            checkins.entry(user_id).or_default().insert(date, record);
        }
        Ok(checkins)
    }

    pub fn count_checkins(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM checkins WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Persistence(format!("sqlite count checkins: {}", e)))?;
        Ok(count as usize)
    }

    pub fn upsert_progress(&self, user_id: &str, progress: &UserProgress) -> Result<()> {
        let snapshot = serde_json::to_string(progress)?;
        self.conn()
            .execute(
                "INSERT INTO user_stats (user_id, snapshot, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    snapshot = excluded.snapshot,
                    updated_at = excluded.updated_at",
                params![user_id, snapshot, Utc::now().timestamp_millis()],
            )
            .map_err(|e| Error::Persistence(format!("sqlite upsert stats: {}", e)))?;
        Ok(())
    }

    pub fn load_progress(&self) -> Result<HashMap<String, UserProgress>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT user_id, snapshot FROM user_stats")
            .map_err(|e| Error::Persistence(format!("sqlite prepare stats: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::Persistence(format!("sqlite query stats: {}", e)))?;

        let mut progress = HashMap::new();
        for row in rows {
            let (user_id, snapshot) =
                row.map_err(|e| Error::Persistence(format!("sqlite read stats: {}", e)))?;
            match serde_json::from_str::<UserProgress>(&snapshot) {
                Ok(p) => {
                    progress.insert(user_id, p);
                }
                Err(e) => tracing::warn!(user_id, "Skipping unreadable progress snapshot: {}", e),
            }
        }
        Ok(progress)
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
