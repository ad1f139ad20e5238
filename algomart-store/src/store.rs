//! The `SqliteTrialStore` implementation of `TrialRepository`.

use algomart_trials::{RepositoryError, RepositoryResult, TrialRepository};
use algomart_types::{ProductId, Trial, TrialId, TrialStatus, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Persistent store for trials backed by SQLite.
pub struct SqliteTrialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTrialStore {
    /// Opens (or creates) a trial store at the given path.
    pub fn new(path: &Path) -> RepositoryResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| RepositoryError::Backend(format!("failed to open trial store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        debug!("trial store opened at {}", path.display());
        Ok(store)
    }

    /// Opens an in-memory trial store (for testing).
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            RepositoryError::Backend(format!("failed to open in-memory trial store: {e}"))
        })?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> RepositoryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS trials (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                product_id TEXT NOT NULL,
                start_at INTEGER NOT NULL,
                end_at INTEGER NOT NULL,
                status TEXT NOT NULL,
                CHECK (end_at > start_at)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS trials_one_active
                ON trials (user_id, product_id) WHERE status = 'active';

            CREATE INDEX IF NOT EXISTS trials_by_status_end
                ON trials (status, end_at);

            CREATE TABLE IF NOT EXISTS trial_reminders (
                trial_id TEXT NOT NULL REFERENCES trials(id),
                threshold INTEGER NOT NULL,
                sent_at INTEGER NOT NULL,
                UNIQUE (trial_id, threshold)
            );
            ",
        )
        .map_err(|e| RepositoryError::Backend(format!("failed to init trial schema: {e}")))?;
        Ok(())
    }

    fn load_reminders(conn: &Connection, id: &TrialId) -> RepositoryResult<BTreeSet<u32>> {
        let mut stmt = conn
            .prepare("SELECT threshold FROM trial_reminders WHERE trial_id = ?1")
            .map_err(|e| RepositoryError::Backend(format!("failed to prepare reminder query: {e}")))?;
        let rows = stmt
            .query_map(params![id.to_string()], |row| row.get::<_, i64>(0))
            .map_err(|e| RepositoryError::Backend(format!("failed to query reminders: {e}")))?;

        let mut set = BTreeSet::new();
        for row in rows {
            let threshold =
                row.map_err(|e| RepositoryError::Backend(format!("failed to read reminder row: {e}")))?;
            set.insert(threshold as u32);
        }
        Ok(set)
    }

    fn load_trial_row(
        conn: &Connection,
        id_str: String,
        user_str: String,
        product_str: String,
        start_secs: i64,
        end_secs: i64,
        status_str: String,
    ) -> RepositoryResult<Trial> {
        let id: TrialId = id_str
            .parse()
            .map_err(|e| RepositoryError::Backend(format!("invalid trial id in store: {e}")))?;
        let user_id: UserId = user_str
            .parse()
            .map_err(|e| RepositoryError::Backend(format!("invalid user id in store: {e}")))?;
        let product_id: ProductId = product_str
            .parse()
            .map_err(|e| RepositoryError::Backend(format!("invalid product id in store: {e}")))?;
        let status: TrialStatus = status_str
            .parse()
            .map_err(|e| RepositoryError::Backend(format!("invalid status in store: {e}")))?;
        let start_at = timestamp_from_secs(start_secs)?;
        let end_at = timestamp_from_secs(end_secs)?;
        let reminders_sent = Self::load_reminders(conn, &id)?;

        Ok(Trial {
            id,
            user_id,
            product_id,
            start_at,
            end_at,
            status,
            reminders_sent,
        })
    }
}

const TRIAL_COLUMNS: &str = "id, user_id, product_id, start_at, end_at, status";

type TrialRow = (String, String, String, i64, i64, String);

fn timestamp_from_secs(secs: i64) -> RepositoryResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| RepositoryError::Backend(format!("timestamp out of range: {secs}")))
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrialRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

// only a UNIQUE violation means "duplicate active"; CHECK or primary-key
// failures carry different extended codes and stay backend errors
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl TrialRepository for SqliteTrialStore {
    fn insert(&self, trial: &Trial) -> RepositoryResult<()> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO trials (id, user_id, product_id, start_at, end_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trial.id.to_string(),
                trial.user_id.to_string(),
                trial.product_id.to_string(),
                trial.start_at.timestamp(),
                trial.end_at.timestamp(),
                trial.status.as_str(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::DuplicateActive),
            Err(e) => Err(RepositoryError::Backend(format!("failed to insert trial: {e}"))),
        }
    }

    fn find(&self, id: &TrialId) -> RepositoryResult<Option<Trial>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {TRIAL_COLUMNS} FROM trials WHERE id = ?1"),
                params![id.to_string()],
                map_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(RepositoryError::Backend(format!(
                    "failed to query trial: {other}"
                ))),
            })?;

        match row {
            Some((id_s, user_s, product_s, start, end, status_s)) => Ok(Some(
                Self::load_trial_row(&conn, id_s, user_s, product_s, start, end, status_s)?,
            )),
            None => Ok(None),
        }
    }

    fn find_for_user_product(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> RepositoryResult<Option<Trial>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {TRIAL_COLUMNS} FROM trials
                     WHERE user_id = ?1 AND product_id = ?2
                     ORDER BY (status = 'active') DESC, start_at DESC
                     LIMIT 1"
                ),
                params![user_id.to_string(), product_id.to_string()],
                map_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(RepositoryError::Backend(format!(
                    "failed to query user trial: {other}"
                ))),
            })?;

        match row {
            Some((id_s, user_s, product_s, start, end, status_s)) => Ok(Some(
                Self::load_trial_row(&conn, id_s, user_s, product_s, start, end, status_s)?,
            )),
            None => Ok(None),
        }
    }

    fn find_active(&self) -> RepositoryResult<Vec<Trial>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRIAL_COLUMNS} FROM trials WHERE status = 'active' ORDER BY end_at"
            ))
            .map_err(|e| RepositoryError::Backend(format!("failed to prepare active query: {e}")))?;
        let rows = stmt
            .query_map([], map_row)
            .map_err(|e| RepositoryError::Backend(format!("failed to query active trials: {e}")))?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(
                row.map_err(|e| RepositoryError::Backend(format!("failed to read trial row: {e}")))?,
            );
        }

        let mut result = Vec::with_capacity(raw.len());
        for (id_s, user_s, product_s, start, end, status_s) in raw {
            result.push(Self::load_trial_row(
                &conn, id_s, user_s, product_s, start, end, status_s,
            )?);
        }
        Ok(result)
    }

    fn mark_expired(&self, ids: &[TrialId]) -> RepositoryResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE trials SET status = 'expired'
             WHERE status = 'active' AND id IN ({placeholders})"
        );
        let changed = conn
            .execute(&sql, params_from_iter(ids.iter().map(ToString::to_string)))
            .map_err(|e| RepositoryError::Backend(format!("failed to expire trials: {e}")))?;
        Ok(changed)
    }

    fn set_status(
        &self,
        id: &TrialId,
        from: TrialStatus,
        to: TrialStatus,
    ) -> RepositoryResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE trials SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![to.as_str(), id.to_string(), from.as_str()],
            )
            .map_err(|e| RepositoryError::Backend(format!("failed to update status: {e}")))?;
        if changed == 1 {
            return Ok(());
        }

        // distinguish a lost race from an unknown id
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM trials WHERE id = ?1)",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| RepositoryError::Backend(format!("failed to check trial: {e}")))?;
        if exists {
            Err(RepositoryError::Conflict)
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn record_reminder(&self, id: &TrialId, threshold: u32) -> RepositoryResult<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM trials WHERE id = ?1)",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| RepositoryError::Backend(format!("failed to check trial: {e}")))?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO trial_reminders (trial_id, threshold, sent_at)
                 VALUES (?1, ?2, ?3)",
                params![id.to_string(), i64::from(threshold), Utc::now().timestamp()],
            )
            .map_err(|e| RepositoryError::Backend(format!("failed to record reminder: {e}")))?;
        Ok(inserted == 1)
    }
}
