//! Enrollment and verification orchestration.
//!
//! Coordinates the embedding backend, the vector math and the voice
//! store, and decides what lands in the voiceprint and audit tables.
//!
//! Enrollment: `NoVoiceprint -> Enrolling -> Enrolled`, or back to the
//! previous state on failure. Verification never mutates the voiceprint.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::adapters::{embed_many, AudioSample, EmbeddingBackend, ServiceHealth};
use crate::domain::{
    EnrollmentAttempt, VerificationAttempt, VoiceprintSummary, DEFAULT_THRESHOLD, EMBEDDING_DIM,
    MAX_ENROLLMENT_SAMPLES, MIN_ENROLLMENT_SAMPLES,
};
use crate::storage::VoiceStore;

use super::audio::estimate_wav_snr;
use super::error::VoiceError;
use super::vector::{average_embeddings, cosine_similarity, validate_embedding};

/// Tunables for the enrollment/verification policy
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePolicy {
    /// Threshold written on every enrollment
    pub default_threshold: f64,

    /// Expected embedding dimension
    pub dimension: usize,

    /// Fewest samples accepted, and fewest usable embeddings required
    pub min_samples: usize,

    /// Most samples accepted per enrollment
    pub max_samples: usize,
}

impl Default for VoicePolicy {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            dimension: EMBEDDING_DIM,
            min_samples: MIN_ENROLLMENT_SAMPLES,
            max_samples: MAX_ENROLLMENT_SAMPLES,
        }
    }
}

/// Result of a successful enrollment
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOutcome {
    /// Embeddings averaged into the voiceprint
    pub samples_processed: usize,

    /// Samples supplied by the caller
    pub samples_submitted: usize,

    pub threshold: f64,
    pub embedding_dimension: usize,
    pub quality_score: Option<f64>,
}

/// Result of a scored verification
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    /// Raw cosine similarity
    pub score: f64,

    /// Score rounded to 3 decimal places
    pub display_score: f64,

    pub is_match: bool,
    pub threshold: f64,
}

/// Enrollment state for an identity
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentStatus {
    pub enrolled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voiceprint: Option<VoiceprintSummary>,
}

/// Recent audit records for an identity
#[derive(Debug, Clone, Serialize)]
pub struct AttemptHistory {
    pub enrollments: Vec<EnrollmentAttempt>,
    pub verifications: Vec<VerificationAttempt>,
}

/// Round to 3 decimal places for display
pub fn round_score(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// Reject empty clips and non-audio uploads before any external call
pub fn validate_sample(sample: &AudioSample) -> Result<(), VoiceError> {
    let label = sample.filename.as_deref().unwrap_or("audio sample");
    if sample.is_empty() {
        return Err(VoiceError::Validation(format!("{} is empty", label)));
    }
    if let Some(content_type) = sample.content_type.as_deref() {
        let content_type = content_type.to_ascii_lowercase();
        if !content_type.starts_with("audio/") && content_type != "application/octet-stream" {
            return Err(VoiceError::Validation(format!(
                "{} must be an audio file, got {}",
                label, content_type
            )));
        }
    }
    Ok(())
}

/// Voice enrollment/verification orchestrator
pub struct VoiceOrchestrator {
    backend: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn VoiceStore>,
    policy: VoicePolicy,
}

impl VoiceOrchestrator {
    /// Create an orchestrator over injected collaborators
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn VoiceStore>,
        policy: VoicePolicy,
    ) -> Self {
        Self {
            backend,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> &VoicePolicy {
        &self.policy
    }

    /// Embedding service health, for status endpoints
    pub async fn service_health(&self) -> ServiceHealth {
        self.backend.health_report().await
    }

    /// Build (or replace) the voiceprint for `identity` from 3 to 5 samples
    #[instrument(skip(self, device_id, samples), fields(identity = %identity, submitted = samples.len()))]
    pub async fn enroll(
        &self,
        identity: &str,
        device_id: Option<String>,
        samples: Vec<AudioSample>,
    ) -> Result<EnrollmentOutcome, VoiceError> {
        let submitted = samples.len();
        if submitted < self.policy.min_samples || submitted > self.policy.max_samples {
            return Err(VoiceError::Validation(format!(
                "Enrollment requires between {} and {} audio samples, got {}",
                self.policy.min_samples, self.policy.max_samples, submitted
            )));
        }
        for sample in &samples {
            validate_sample(sample)?;
        }

        if !self.backend.health_check().await {
            warn!("Embedding service unhealthy, refusing enrollment");
            return Err(VoiceError::ServiceUnavailable);
        }

        // CPU-bound WAV decoding runs on the blocking pool
        let (samples, quality_score) = tokio::task::spawn_blocking(move || {
            let quality = mean_quality(&samples);
            (samples, quality)
        })
        .await
        .map_err(|e| VoiceError::Internal(format!("quality estimate task failed: {}", e)))?;

        let batch = embed_many(Arc::clone(&self.backend), samples).await;
        let failed_requests = batch.failure_count();

        let dimension = self.policy.dimension;
        let (usable, malformed): (Vec<Vec<f64>>, Vec<Vec<f64>>) = batch
            .vectors
            .into_iter()
            .partition(|v| validate_embedding(v, dimension));
        if !malformed.is_empty() {
            warn!(count = malformed.len(), "Discarding malformed embeddings");
        }

        let achieved = usable.len();
        info!(achieved, failed_requests, "Embeddings collected");

        if achieved < self.policy.min_samples {
            let err = VoiceError::InsufficientSamples {
                required: self.policy.min_samples,
                achieved,
                samples_processed: submitted,
            };
            self.audit_enrollment(
                EnrollmentAttempt::failed(identity, device_id, achieved as u32, err.to_string())
                    .with_quality(quality_score),
            )
            .await;
            return Err(err);
        }

        let reference = match average_embeddings(&usable) {
            Ok(reference) => reference,
            Err(e) => {
                let err = VoiceError::Aggregation(e);
                self.audit_enrollment(
                    EnrollmentAttempt::failed(identity, device_id, achieved as u32, err.to_string())
                        .with_quality(quality_score),
                )
                .await;
                return Err(err);
            }
        };

        let threshold = self.policy.default_threshold;
        if let Err(e) = self
            .store
            .upsert_voiceprint(identity, &reference, achieved as u32, threshold)
            .await
        {
            error!(error = %e, "Failed to store voiceprint");
            self.audit_enrollment(
                EnrollmentAttempt::failed(identity, device_id, achieved as u32, "failed to store voiceprint")
                    .with_quality(quality_score),
            )
            .await;
            return Err(e.into());
        }

        self.audit_enrollment(
            EnrollmentAttempt::succeeded(identity, device_id, achieved as u32)
                .with_quality(quality_score),
        )
        .await;

        info!(achieved, threshold, "Voice enrolled");
        Ok(EnrollmentOutcome {
            samples_processed: achieved,
            samples_submitted: submitted,
            threshold,
            embedding_dimension: reference.len(),
            quality_score,
        })
    }

    /// Score one sample against the stored voiceprint
    #[instrument(skip(self, device_id, sample), fields(identity = %identity))]
    pub async fn verify(
        &self,
        identity: &str,
        device_id: Option<String>,
        sample: AudioSample,
    ) -> Result<VerificationOutcome, VoiceError> {
        validate_sample(&sample)?;

        let voiceprint = self
            .store
            .get_voiceprint(identity)
            .await?
            .ok_or(VoiceError::NotEnrolled)?;
        let threshold = voiceprint.threshold;

        if !self.backend.health_check().await {
            warn!("Embedding service unhealthy, refusing verification");
            self.audit_verification(VerificationAttempt::unscored(identity, device_id, threshold))
                .await;
            return Err(VoiceError::ServiceUnavailable);
        }

        let embedding = match self.backend.embed_one(&sample).await {
            Ok(output) => output.vector,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Verification embedding failed");
                self.audit_verification(VerificationAttempt::unscored(identity, device_id, threshold))
                    .await;
                return Err(VoiceError::EmbeddingFailed(e));
            }
        };

        if !validate_embedding(&embedding, self.policy.dimension) {
            self.audit_verification(VerificationAttempt::unscored(identity, device_id, threshold))
                .await;
            return Err(VoiceError::InvalidEmbedding(format!(
                "expected {} finite values, got {}",
                self.policy.dimension,
                embedding.len()
            )));
        }

        let score = match cosine_similarity(&embedding, &voiceprint.embedding) {
            Ok(score) => score,
            Err(e) => {
                self.audit_verification(VerificationAttempt::unscored(identity, device_id, threshold))
                    .await;
                return Err(VoiceError::InvalidEmbedding(format!(
                    "cannot compare with stored voiceprint: {}",
                    e
                )));
            }
        };

        let is_match = score >= threshold;
        self.audit_verification(VerificationAttempt::scored(
            identity, device_id, score, is_match, threshold,
        ))
        .await;

        info!(score, threshold, is_match, "Voice verified");
        Ok(VerificationOutcome {
            score,
            display_score: round_score(score),
            is_match,
            threshold,
        })
    }

    /// Current enrollment state
    pub async fn status(&self, identity: &str) -> Result<EnrollmentStatus, VoiceError> {
        let voiceprint = self.store.get_voiceprint(identity).await?;
        Ok(EnrollmentStatus {
            enrolled: voiceprint.is_some(),
            voiceprint: voiceprint.map(|vp| vp.summary()),
        })
    }

    /// Delete the voiceprint; idempotent
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn remove(&self, identity: &str) -> Result<bool, VoiceError> {
        let removed = self.store.delete_voiceprint(identity).await?;
        info!(removed, "Voiceprint removal requested");
        Ok(removed)
    }

    /// Recent attempts, newest first
    pub async fn history(&self, identity: &str, limit: usize) -> Result<AttemptHistory, VoiceError> {
        Ok(AttemptHistory {
            enrollments: self.store.enrollment_attempts(identity, limit).await?,
            verifications: self.store.verification_attempts(identity, limit).await?,
        })
    }

    /// Best-effort audit write
    async fn audit_enrollment(&self, attempt: EnrollmentAttempt) {
        if let Err(e) = self.store.record_enrollment_attempt(&attempt).await {
            error!(error = %e, identity = %attempt.identity, "Failed to record enrollment attempt");
        }
    }

    /// Best-effort audit write
    async fn audit_verification(&self, attempt: VerificationAttempt) {
        if let Err(e) = self.store.record_verification_attempt(&attempt).await {
            error!(error = %e, identity = %attempt.identity, "Failed to record verification attempt");
        }
    }
}

/// Mean SNR over the samples that decode as WAV
fn mean_quality(samples: &[AudioSample]) -> Option<f64> {
    let estimates: Vec<f64> = samples
        .iter()
        .filter_map(|s| estimate_wav_snr(&s.bytes))
        .collect();
    if estimates.is_empty() {
        None
    } else {
        Some(estimates.iter().sum::<f64>() / estimates.len() as f64)
    }
}
