//! Core voice logic.
//!
//! This module contains:
//! - Vector: cosine similarity, embedding averaging and validation
//! - Audio: advisory SNR estimate
//! - Orchestrator: enrollment/verification policy and audit
//! - Error: the failure taxonomy surfaced to callers

pub mod audio;
pub mod error;
pub mod orchestrator;
pub mod vector;

// Re-export commonly used types
pub use audio::{
    decode_wav, decode_wav_prefix, estimate_snr, estimate_wav_snr, MAX_ANALYZED_SAMPLES, MAX_SNR_DB,
};
pub use error::VoiceError;
pub use orchestrator::{
    round_score, validate_sample, AttemptHistory, EnrollmentOutcome, EnrollmentStatus,
    VerificationOutcome, VoiceOrchestrator, VoicePolicy,
};
pub use vector::{
    average_embeddings, cosine_similarity, l2_norm, validate_embedding, validate_embedding_value,
    VectorError,
};
