//! Stored voiceprints.
//!
//! A voiceprint is the reference embedding for one enrolled identity.
//! There is at most one per identity; re-enrollment replaces it in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output dimension of the external speaker-embedding model (ECAPA-TDNN).
pub const EMBEDDING_DIM: usize = 192;

/// Acceptance threshold applied to every new enrollment.
pub const DEFAULT_THRESHOLD: f64 = 0.78;

/// Fewest usable samples an enrollment may be built from.
pub const MIN_ENROLLMENT_SAMPLES: usize = 3;

/// Most samples accepted in a single enrollment request.
pub const MAX_ENROLLMENT_SAMPLES: usize = 5;

/// The enrolled reference for one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voiceprint {
    /// Owning identity (user id)
    pub identity: String,

    /// Reference embedding, L2-normalized
    pub embedding: Vec<f64>,

    /// Number of embeddings averaged into the reference
    pub sample_count: u32,

    /// Cosine-similarity acceptance threshold, in [-1, 1]
    pub threshold: f64,

    /// When the identity first enrolled
    pub created_at: DateTime<Utc>,

    /// When the reference was last replaced
    pub updated_at: DateTime<Utc>,
}

impl Voiceprint {
    /// Dimension of the stored reference vector
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }

    /// Summary safe to hand to callers (no vector data)
    pub fn summary(&self) -> VoiceprintSummary {
        VoiceprintSummary {
            sample_count: self.sample_count,
            threshold: self.threshold,
            dimension: self.dimension(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Enrollment metadata without the reference vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceprintSummary {
    pub sample_count: u32,
    pub threshold: f64,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_hides_vector() {
        let now = Utc::now();
        let vp = Voiceprint {
            identity: "user-1".to_string(),
            embedding: vec![0.0; EMBEDDING_DIM],
            sample_count: 4,
            threshold: DEFAULT_THRESHOLD,
            created_at: now,
            updated_at: now,
        };

        let summary = vp.summary();
        assert_eq!(summary.sample_count, 4);
        assert_eq!(summary.dimension, EMBEDDING_DIM);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("embedding").is_none());
    }
}
