//! Error taxonomy for enrollment and verification.

use thiserror::Error;

use crate::adapters::EmbeddingServiceError;
use crate::storage::StorageError;

use super::vector::VectorError;

/// Errors surfaced by the voice orchestrator
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Bad request shape (sample count, empty audio, missing fields)
    #[error("{0}")]
    Validation(String),

    #[error("Voice embedding service is unavailable")]
    ServiceUnavailable,

    #[error(transparent)]
    EmbeddingService(#[from] EmbeddingServiceError),

    #[error("Insufficient usable samples: {achieved} of {required} required")]
    InsufficientSamples {
        required: usize,
        achieved: usize,
        samples_processed: usize,
    },

    #[error("Could not build voiceprint: {0}")]
    Aggregation(VectorError),

    #[error("Embedding extraction failed: {0}")]
    EmbeddingFailed(EmbeddingServiceError),

    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("No voiceprint enrolled for this user")]
    NotEnrolled,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VoiceError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::EmbeddingService(_) => "EMBEDDING_SERVICE_ERROR",
            Self::InsufficientSamples { .. } => "INSUFFICIENT_SAMPLES",
            Self::Aggregation(_) => "AGGREGATION_ERROR",
            Self::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            Self::InvalidEmbedding(_) => "INVALID_EMBEDDING",
            Self::NotEnrolled => "NOT_ENROLLED",
            Self::Storage(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the detail must stay server-side
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Internal(_))
    }

    /// Caller-facing message; internal details are replaced
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}
