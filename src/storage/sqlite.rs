//! SQLite-backed voice store.
//!
//! One database file holds three tables: `voiceprints` (unique per
//! identity), `enrollment_attempts` and `verification_attempts`
//! (append-only). Embeddings are stored as JSON arrays.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{StorageError, VoiceStore};
use crate::domain::{EnrollmentAttempt, VerificationAttempt, Voiceprint};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS voiceprints (
    identity      TEXT PRIMARY KEY,
    embedding     TEXT NOT NULL,
    sample_count  INTEGER NOT NULL,
    threshold     REAL NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollment_attempts (
    id                TEXT PRIMARY KEY,
    identity          TEXT NOT NULL,
    device_id         TEXT,
    success           INTEGER NOT NULL,
    quality_score     REAL,
    error             TEXT,
    samples_recorded  INTEGER NOT NULL,
    created_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_enrollment_attempts_identity
    ON enrollment_attempts (identity, created_at);

CREATE TABLE IF NOT EXISTS verification_attempts (
    id                TEXT PRIMARY KEY,
    identity          TEXT NOT NULL,
    device_id         TEXT,
    similarity_score  REAL,
    is_match          INTEGER NOT NULL,
    threshold_used    REAL NOT NULL,
    created_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_verification_attempts_identity
    ON verification_attempts (identity, created_at);
";

/// SQLite voice store, serialized through a mutex
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_id(raw: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|e| StorageError::Corrupt(format!("bad id '{}': {}", raw, e)))
}

fn read_voiceprint(conn: &Connection, identity: &str) -> Result<Option<Voiceprint>, StorageError> {
    let row = conn
        .query_row(
            "SELECT identity, embedding, sample_count, threshold, created_at, updated_at
             FROM voiceprints WHERE identity = ?1",
            params![identity],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((identity, embedding, sample_count, threshold, created_at, updated_at)) = row else {
        return Ok(None);
    };

    Ok(Some(Voiceprint {
        identity,
        embedding: serde_json::from_str(&embedding)?,
        sample_count,
        threshold,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    }))
}

#[async_trait]
impl VoiceStore for SqliteStore {
    async fn get_voiceprint(&self, identity: &str) -> Result<Option<Voiceprint>, StorageError> {
        let conn = self.lock()?;
        read_voiceprint(&conn, identity)
    }

    async fn upsert_voiceprint(
        &self,
        identity: &str,
        embedding: &[f64],
        sample_count: u32,
        threshold: f64,
    ) -> Result<Voiceprint, StorageError> {
        let json = serde_json::to_string(embedding)?;
        let now = format_time(&Utc::now());

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO voiceprints (identity, embedding, sample_count, threshold, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(identity) DO UPDATE SET
                 embedding = excluded.embedding,
                 sample_count = excluded.sample_count,
                 threshold = excluded.threshold,
                 updated_at = excluded.updated_at",
            params![identity, json, sample_count, threshold, now],
        )?;

        read_voiceprint(&conn, identity)?
            .ok_or_else(|| StorageError::Corrupt(format!("voiceprint for '{}' vanished after upsert", identity)))
    }

    async fn delete_voiceprint(&self, identity: &str) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM voiceprints WHERE identity = ?1",
            params![identity],
        )?;
        Ok(removed > 0)
    }

    async fn record_enrollment_attempt(&self, attempt: &EnrollmentAttempt) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO enrollment_attempts
             (id, identity, device_id, success, quality_score, error, samples_recorded, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                attempt.id.to_string(),
                attempt.identity,
                attempt.device_id,
                attempt.success,
                attempt.quality_score,
                attempt.error,
                attempt.samples_recorded,
                format_time(&attempt.timestamp),
            ],
        )?;
        Ok(())
    }

    async fn record_verification_attempt(
        &self,
        attempt: &VerificationAttempt,
    ) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO verification_attempts
             (id, identity, device_id, similarity_score, is_match, threshold_used, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                attempt.id.to_string(),
                attempt.identity,
                attempt.device_id,
                attempt.similarity_score,
                attempt.is_match,
                attempt.threshold_used,
                format_time(&attempt.timestamp),
            ],
        )?;
        Ok(())
    }

    async fn enrollment_attempts(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<EnrollmentAttempt>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, identity, device_id, success, quality_score, error, samples_recorded, created_at
             FROM enrollment_attempts WHERE identity = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![identity, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, u32>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut attempts = Vec::new();
        for row in rows {
            let (id, identity, device_id, success, quality_score, error, samples_recorded, created_at) =
                row?;
            attempts.push(EnrollmentAttempt {
                id: parse_id(&id)?,
                identity,
                device_id,
                success,
                quality_score,
                error,
                samples_recorded,
                timestamp: parse_time(&created_at)?,
            });
        }
        Ok(attempts)
    }

    async fn verification_attempts(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<VerificationAttempt>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, identity, device_id, similarity_score, is_match, threshold_used, created_at
             FROM verification_attempts WHERE identity = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![identity, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut attempts = Vec::new();
        for row in rows {
            let (id, identity, device_id, similarity_score, is_match, threshold_used, created_at) = row?;
            attempts.push(VerificationAttempt {
                id: parse_id(&id)?,
                identity,
                device_id,
                similarity_score,
                is_match,
                threshold_used,
                timestamp: parse_time(&created_at)?,
            });
        }
        Ok(attempts)
    }
}
