//! Turso/libSQL implementation of the activity store.
//!
//! This module provides persistent storage using Turso (libSQL).
//! It can connect to:
//! - Remote Turso database (cloud)
//! - Local embedded SQLite file
//! - Private in-memory database (tests)
//!
//! Ledger deltas and watch merges are single `INSERT .. ON CONFLICT DO
//! UPDATE .. RETURNING` statements, so each one applies atomically and
//! concurrent writers never overwrite each other's increments.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Builder, Connection, Database};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{ActivityReader, ActivityWriter, Error, LedgerStore, Result};
use crate::commands::RecordVideoWatch;
use crate::records::{
    LearnerRewardLedger, LedgerDelta, SubjectCatalog, TestAttempt, VIDEO_COMPLETION_THRESHOLD,
    VideoWatchEvent,
};
use crate::types::LearnerId;

/// SQL schema for the test attempts table.
const SCHEMA_TEST_ATTEMPTS: &str = r#"
CREATE TABLE IF NOT EXISTS test_attempts (
    learner_id TEXT NOT NULL,
    assessment_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    attempt TEXT NOT NULL,
    PRIMARY KEY (learner_id, assessment_id)
)
"#;

/// SQL schema for the video watch events table.
const SCHEMA_VIDEO_WATCH_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS video_watch_events (
    learner_id TEXT NOT NULL,
    video_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    chapter_key TEXT NOT NULL,
    fraction_watched REAL NOT NULL,
    completed INTEGER NOT NULL,
    watch_count INTEGER NOT NULL,
    last_watched_at TEXT NOT NULL,
    PRIMARY KEY (learner_id, video_id)
)
"#;

/// SQL schema for the subject catalogs table.
const SCHEMA_SUBJECT_CATALOGS: &str = r#"
CREATE TABLE IF NOT EXISTS subject_catalogs (
    subject_id TEXT PRIMARY KEY,
    catalog TEXT NOT NULL
)
"#;

/// SQL schema for the enrollments table.
const SCHEMA_ENROLLMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS enrollments (
    learner_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (learner_id, subject_id)
)
"#;

/// SQL schema for the reward ledgers table.
const SCHEMA_REWARD_LEDGERS: &str = r#"
CREATE TABLE IF NOT EXISTS reward_ledgers (
    learner_id TEXT PRIMARY KEY,
    total_xp INTEGER NOT NULL,
    currency_balance INTEGER NOT NULL,
    tests_completed INTEGER NOT NULL,
    last_test_at TEXT
)
"#;

/// SQL index for per-learner attempt scans.
const INDEX_TEST_ATTEMPTS: &str = r#"
CREATE INDEX IF NOT EXISTS idx_test_attempts_learner_time
ON test_attempts(learner_id, completed_at)
"#;

const VIDEO_COLUMNS: &str = "learner_id, video_id, subject_id, chapter_key, fraction_watched, completed, watch_count, last_watched_at";

const LEDGER_COLUMNS: &str =
    "learner_id, total_xp, currency_balance, tests_completed, last_test_at";

/// SQLite result codes for a busy or locked database.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// How long a local connection waits on another process's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Turso-backed activity store.
///
/// Writes from one store and its clones are serialized through a shared
/// gate, so SQLite never sees two of our own writers at once. Local
/// connections also wait out locks held by other processes.
#[derive(Clone)]
pub struct TursoActivityStore {
    db: Arc<Database>,
    /// Set for in-memory databases, where every connection would
    /// otherwise open a fresh, empty database.
    shared: Option<Connection>,
    local: bool,
    write_gate: Arc<Mutex<()>>,
}

impl TursoActivityStore {
    /// Create a new store with a local embedded database.
    pub async fn new_local(path: &Path) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        let store = Self {
            db: Arc::new(db),
            shared: None,
            local: true,
            write_gate: Arc::default(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create a new store connected to a remote Turso database.
    pub async fn new_remote(url: &str, token: &str) -> Result<Self> {
        let db = Builder::new_remote(url.to_string(), token.to_string())
            .build()
            .await?;
        let store = Self {
            db: Arc::new(db),
            shared: None,
            local: false,
            write_gate: Arc::default(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create a new in-memory store (for testing).
    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;
        let store = Self {
            db: Arc::new(db),
            shared: Some(conn),
            local: true,
            write_gate: Arc::default(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Get a database connection.
    async fn conn(&self) -> Result<Connection> {
        if let Some(conn) = &self.shared {
            return Ok(conn.clone());
        }
        let conn = self.db.connect()?;
        if self.local {
            conn.busy_timeout(BUSY_TIMEOUT)?;
        }
        Ok(conn)
    }

    /// Ensure the database schema exists.
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(SCHEMA_TEST_ATTEMPTS, ()).await?;
        conn.execute(SCHEMA_VIDEO_WATCH_EVENTS, ()).await?;
        conn.execute(SCHEMA_SUBJECT_CATALOGS, ()).await?;
        conn.execute(SCHEMA_ENROLLMENTS, ()).await?;
        conn.execute(SCHEMA_REWARD_LEDGERS, ()).await?;
        conn.execute(INDEX_TEST_ATTEMPTS, ()).await?;
        Ok(())
    }

    /// Insert or replace a subject catalog.
    #[instrument(skip(self, catalog), fields(subject_id = %catalog.subject_id), level = "debug")]
    pub async fn put_subject_catalog(&self, catalog: &SubjectCatalog) -> Result<()> {
        let _write = self.write_gate.lock().await;
        let conn = self.conn().await?;
        let catalog_json = serde_json::to_string(catalog)?;
        conn.execute(
            "INSERT INTO subject_catalogs (subject_id, catalog) VALUES (?, ?) ON CONFLICT(subject_id) DO UPDATE SET catalog = excluded.catalog",
            libsql::params![catalog.subject_id.clone(), catalog_json],
        )
        .await
        .map_err(classify)?;
        Ok(())
    }

    /// Enroll a learner in a subject. Enrolling twice is a no-op.
    #[instrument(skip(self), level = "debug")]
    pub async fn enroll(&self, learner_id: &LearnerId, subject_id: &str) -> Result<()> {
        let _write = self.write_gate.lock().await;
        let conn = self.conn().await?;
        conn.execute(
            "INSERT OR IGNORE INTO enrollments (learner_id, subject_id, position) VALUES (?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM enrollments WHERE learner_id = ?))",
            libsql::params![
                learner_id.as_str().to_string(),
                subject_id.to_string(),
                learner_id.as_str().to_string()
            ],
        )
        .await
        .map_err(classify)?;
        Ok(())
    }

    /// Parse a watch event from a database row.
    fn parse_video_event(row: &libsql::Row) -> Result<VideoWatchEvent> {
        let learner_id: String = row.get(0)?;
        let video_id: String = row.get(1)?;
        let subject_id: String = row.get(2)?;
        let chapter_key: String = row.get(3)?;
        let fraction_watched: f64 = row.get(4)?;
        let completed: i64 = row.get(5)?;
        let watch_count: i64 = row.get(6)?;
        let last_watched_at_str: String = row.get(7)?;

        let watch_count = u32::try_from(watch_count)
            .map_err(|_| Error::InvalidData(format!("invalid watch count: {}", watch_count)))?;

        Ok(VideoWatchEvent {
            learner_id: LearnerId(learner_id),
            video_id,
            subject_id,
            chapter_key,
            fraction_watched,
            completed: completed != 0,
            watch_count,
            last_watched_at: parse_datetime(&last_watched_at_str)?,
        })
    }

    /// Parse a ledger from a database row.
    fn parse_ledger(row: &libsql::Row) -> Result<LearnerRewardLedger> {
        let learner_id: String = row.get(0)?;
        let total_xp: i64 = row.get(1)?;
        let currency_balance: i64 = row.get(2)?;
        let tests_completed: i64 = row.get(3)?;
        let last_test_at_str: Option<String> = row.get(4)?;

        Ok(LearnerRewardLedger {
            learner_id: LearnerId(learner_id),
            total_xp: non_negative("total_xp", total_xp)?,
            currency_balance: non_negative("currency_balance", currency_balance)?,
            tests_completed: non_negative("tests_completed", tests_completed)?,
            last_test_at: last_test_at_str
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
        })
    }
}

#[async_trait]
impl ActivityReader for TursoActivityStore {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_test_attempts(&self, learner_id: &LearnerId) -> Result<Vec<TestAttempt>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT attempt FROM test_attempts WHERE learner_id = ? ORDER BY completed_at ASC, assessment_id ASC",
                [learner_id.as_str().to_string()],
            )
            .await?;

        let mut attempts = Vec::new();
        while let Some(row) = rows.next().await? {
            let attempt_json: String = row.get(0)?;
            attempts.push(serde_json::from_str(&attempt_json)?);
        }
        Ok(attempts)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_video_watch_events(
        &self,
        learner_id: &LearnerId,
        subject_id: Option<&str>,
    ) -> Result<Vec<VideoWatchEvent>> {
        let conn = self.conn().await?;
        let mut rows = match subject_id {
            Some(subject_id) => {
                conn.query(
                    &format!(
                        "SELECT {VIDEO_COLUMNS} FROM video_watch_events WHERE learner_id = ? AND subject_id = ? ORDER BY video_id ASC"
                    ),
                    libsql::params![learner_id.as_str().to_string(), subject_id.to_string()],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!(
                        "SELECT {VIDEO_COLUMNS} FROM video_watch_events WHERE learner_id = ? ORDER BY video_id ASC"
                    ),
                    [learner_id.as_str().to_string()],
                )
                .await?
            }
        };

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(Self::parse_video_event(&row)?);
        }
        Ok(events)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_subject_catalog(&self, subject_id: &str) -> Result<Option<SubjectCatalog>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT catalog FROM subject_catalogs WHERE subject_id = ?",
                [subject_id.to_string()],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let catalog_json: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&catalog_json)?))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_enrolled_subject_ids(&self, learner_id: &LearnerId) -> Result<Vec<String>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT subject_id FROM enrollments WHERE learner_id = ? ORDER BY position ASC",
                [learner_id.as_str().to_string()],
            )
            .await?;

        let mut subjects = Vec::new();
        while let Some(row) = rows.next().await? {
            subjects.push(row.get::<String>(0)?);
        }
        Ok(subjects)
    }
}

#[async_trait]
impl ActivityWriter for TursoActivityStore {
    #[instrument(skip(self, attempt), fields(learner_id = %attempt.learner_id, assessment_id = %attempt.assessment_id), level = "debug")]
    async fn write_test_attempt(&self, attempt: &TestAttempt) -> Result<()> {
        let _write = self.write_gate.lock().await;
        let conn = self.conn().await?;
        let attempt_json = serde_json::to_string(attempt)?;
        let replaced = conn
            .execute(
                "INSERT OR REPLACE INTO test_attempts (learner_id, assessment_id, subject_id, completed_at, attempt) VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    attempt.learner_id.as_str().to_string(),
                    attempt.assessment_id.clone(),
                    attempt.subject_id.clone(),
                    format_datetime(attempt.completed_at),
                    attempt_json
                ],
            )
            .await
            .map_err(classify)?;
        debug!(rows = replaced, "attempt written");
        Ok(())
    }

    #[instrument(skip(self, update), fields(learner_id = %update.learner_id, video_id = %update.video_id), level = "debug")]
    async fn upsert_video_watch_event(
        &self,
        update: &RecordVideoWatch,
    ) -> Result<VideoWatchEvent> {
        let _write = self.write_gate.lock().await;
        let conn = self.conn().await?;
        let reached = i64::from(update.fraction_watched >= VIDEO_COMPLETION_THRESHOLD);
        let mut rows = conn
            .query(
                &format!(
                    "INSERT INTO video_watch_events ({VIDEO_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, 1, ?) \
                     ON CONFLICT(learner_id, video_id) DO UPDATE SET \
                     subject_id = excluded.subject_id, \
                     chapter_key = excluded.chapter_key, \
                     fraction_watched = excluded.fraction_watched, \
                     completed = MAX(completed, excluded.completed), \
                     watch_count = watch_count + 1, \
                     last_watched_at = excluded.last_watched_at \
                     RETURNING {VIDEO_COLUMNS}"
                ),
                libsql::params![
                    update.learner_id.as_str().to_string(),
                    update.video_id.clone(),
                    update.subject_id.clone(),
                    update.chapter_key.clone(),
                    update.fraction_watched,
                    reached,
                    format_datetime(update.watched_at)
                ],
            )
            .await
            .map_err(classify)?;

        match rows.next().await.map_err(classify)? {
            Some(row) => Self::parse_video_event(&row),
            None => Err(Error::InvalidData(
                "watch upsert returned no row".to_string(),
            )),
        }
    }
}

#[async_trait]
impl LedgerStore for TursoActivityStore {
    #[instrument(skip(self, delta), level = "debug")]
    async fn upsert_ledger(
        &self,
        learner_id: &LearnerId,
        delta: &LedgerDelta,
    ) -> Result<LearnerRewardLedger> {
        let _write = self.write_gate.lock().await;
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "INSERT INTO reward_ledgers ({LEDGER_COLUMNS}) VALUES (?, ?, ?, ?, ?) \
                     ON CONFLICT(learner_id) DO UPDATE SET \
                     total_xp = total_xp + excluded.total_xp, \
                     currency_balance = currency_balance + excluded.currency_balance, \
                     tests_completed = tests_completed + excluded.tests_completed, \
                     last_test_at = MAX(COALESCE(last_test_at, ''), excluded.last_test_at) \
                     RETURNING {LEDGER_COLUMNS}"
                ),
                libsql::params![
                    learner_id.as_str().to_string(),
                    i64::from(delta.xp),
                    i64::from(delta.currency),
                    i64::from(delta.tests_completed),
                    format_datetime(delta.recorded_at)
                ],
            )
            .await
            .map_err(classify)?;

        match rows.next().await.map_err(classify)? {
            Some(row) => Self::parse_ledger(&row),
            None => Err(Error::InvalidData(
                "ledger upsert returned no row".to_string(),
            )),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_ledger(&self, learner_id: &LearnerId) -> Result<Option<LearnerRewardLedger>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {LEDGER_COLUMNS} FROM reward_ledgers WHERE learner_id = ?"),
                [learner_id.as_str().to_string()],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::parse_ledger(&row)?))
        } else {
            Ok(None)
        }
    }
}

/// Map busy/locked failures to a retryable conflict.
fn classify(err: libsql::Error) -> Error {
    match err {
        libsql::Error::SqliteFailure(code, message)
            if code == SQLITE_BUSY || code == SQLITE_LOCKED =>
        {
            Error::Conflict(message)
        }
        other => Error::Database(other),
    }
}

fn non_negative(column: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::InvalidData(format!("negative {}: {}", column, value)))
}

/// Format a datetime for storage.
///
/// Fixed-width UTC so that text ordering matches time ordering.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime from storage.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidData(format!("invalid datetime: {}", s)))
}
