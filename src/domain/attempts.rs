//! Audit records for enrollment and verification attempts.
//!
//! Both record types are append-only: they are created once by the
//! orchestrator and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One enrollment attempt, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentAttempt {
    /// Unique identifier for this record
    pub id: Uuid,

    /// Identity that attempted to enroll
    pub identity: String,

    /// Client device, if the caller supplied one
    pub device_id: Option<String>,

    /// Whether a voiceprint was stored
    pub success: bool,

    /// Mean SNR estimate (dB) over decodable samples
    pub quality_score: Option<f64>,

    /// Failure description
    pub error: Option<String>,

    /// Number of embeddings actually obtained
    pub samples_recorded: u32,

    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
}

impl EnrollmentAttempt {
    /// Record a successful enrollment
    pub fn succeeded(identity: &str, device_id: Option<String>, samples_recorded: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            device_id,
            success: true,
            quality_score: None,
            error: None,
            samples_recorded,
            timestamp: Utc::now(),
        }
    }

    /// Record a failed enrollment
    pub fn failed(
        identity: &str,
        device_id: Option<String>,
        samples_recorded: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            device_id,
            success: false,
            quality_score: None,
            error: Some(error.into()),
            samples_recorded,
            timestamp: Utc::now(),
        }
    }

    /// Attach a quality estimate
    pub fn with_quality(mut self, quality_score: Option<f64>) -> Self {
        self.quality_score = quality_score;
        self
    }
}

/// One verification attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationAttempt {
    pub id: Uuid,
    pub identity: String,
    pub device_id: Option<String>,

    /// Cosine similarity; `None` when no score could be computed
    pub similarity_score: Option<f64>,

    /// Accept/reject decision
    pub is_match: bool,

    /// Threshold in effect at decision time
    pub threshold_used: f64,

    pub timestamp: DateTime<Utc>,
}

impl VerificationAttempt {
    /// Record a scored attempt
    pub fn scored(
        identity: &str,
        device_id: Option<String>,
        score: f64,
        is_match: bool,
        threshold_used: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            device_id,
            similarity_score: Some(score),
            is_match,
            threshold_used,
            timestamp: Utc::now(),
        }
    }

    /// Record an attempt that never produced a score (always a rejection)
    pub fn unscored(identity: &str, device_id: Option<String>, threshold_used: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            device_id,
            similarity_score: None,
            is_match: false,
            threshold_used,
            timestamp: Utc::now(),
        }
    }
}
