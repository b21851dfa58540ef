//! Domain types for voxguard.
//!
//! This module contains the persisted data model:
//! - Voiceprint: the enrolled reference embedding per identity
//! - Attempts: append-only audit records for enrollment and verification

pub mod attempts;
pub mod voiceprint;

// Re-export commonly used types
pub use attempts::{EnrollmentAttempt, VerificationAttempt};
pub use voiceprint::{
    Voiceprint, VoiceprintSummary, DEFAULT_THRESHOLD, EMBEDDING_DIM, MAX_ENROLLMENT_SAMPLES,
    MIN_ENROLLMENT_SAMPLES,
};
