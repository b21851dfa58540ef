//! Persistence for voiceprints and attempt audit logs.
//!
//! The orchestrator talks to a [`VoiceStore`]; the shipped implementation
//! is SQLite. Voiceprints are keyed uniquely by identity with upsert
//! semantics, audit tables are append-only.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{EnrollmentAttempt, VerificationAttempt, Voiceprint};

pub use sqlite::SqliteStore;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keyed voiceprint store plus audit logs
#[async_trait]
pub trait VoiceStore: Send + Sync {
    /// Current voiceprint for an identity
    async fn get_voiceprint(&self, identity: &str) -> Result<Option<Voiceprint>, StorageError>;

    /// Insert or replace the voiceprint for an identity.
    ///
    /// Replaces vector, sample count and threshold; keeps `created_at`.
    async fn upsert_voiceprint(
        &self,
        identity: &str,
        embedding: &[f64],
        sample_count: u32,
        threshold: f64,
    ) -> Result<Voiceprint, StorageError>;

    /// Remove the voiceprint; returns whether one existed
    async fn delete_voiceprint(&self, identity: &str) -> Result<bool, StorageError>;

    async fn record_enrollment_attempt(&self, attempt: &EnrollmentAttempt) -> Result<(), StorageError>;

    async fn record_verification_attempt(
        &self,
        attempt: &VerificationAttempt,
    ) -> Result<(), StorageError>;

    /// Most recent enrollment attempts, newest first
    async fn enrollment_attempts(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<EnrollmentAttempt>, StorageError>;

    /// Most recent verification attempts, newest first
    async fn verification_attempts(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<VerificationAttempt>, StorageError>;
}
