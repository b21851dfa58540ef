//! Route handlers for `/api/voice`.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::adapters::AudioSample;
use crate::core::VerificationOutcome;
use crate::domain::{EnrollmentAttempt, VerificationAttempt, VoiceprintSummary};

use super::auth::AuthenticatedUser;
use super::response::ApiError;
use super::AppState;

/// Default and maximum page size for attempt history
const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

/// Parsed multipart upload
#[derive(Debug, Default)]
pub struct Upload {
    pub device_id: Option<String>,
    pub samples: Vec<AudioSample>,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::new(e.status(), "VALIDATION_ERROR", e.body_text())
}

/// Collect `device_id` and every audio part.
///
/// A part counts as audio when it carries a file name or its field name
/// starts with `audio`; other text fields are ignored.
pub async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "device_id" || name == "deviceId" {
            let text = field.text().await.map_err(multipart_error)?;
            let text = text.trim();
            if !text.is_empty() {
                upload.device_id = Some(text.to_string());
            }
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        if filename.is_none() && !name.starts_with("audio") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let mut sample = AudioSample::new(bytes.to_vec());
        sample.filename = filename;
        sample.content_type = content_type;
        upload.samples.push(sample);
    }

    Ok(upload)
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub success: bool,
    pub message: String,
    pub samples_processed: usize,
    pub samples_submitted: usize,
    pub threshold: f64,
    pub embedding_dimension: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

/// `POST /api/voice/enroll`
pub async fn enroll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<EnrollResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let outcome = state
        .orchestrator
        .enroll(user.id(), upload.device_id, upload.samples)
        .await?;

    Ok(Json(EnrollResponse {
        success: true,
        message: format!(
            "Voice enrolled from {} samples",
            outcome.samples_processed
        ),
        samples_processed: outcome.samples_processed,
        samples_submitted: outcome.samples_submitted,
        threshold: outcome.threshold,
        embedding_dimension: outcome.embedding_dimension,
        quality_score: outcome.quality_score,
    }))
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: String,
    pub score: f64,
    #[serde(rename = "match")]
    pub is_match: bool,
    pub threshold: f64,
}

impl From<VerificationOutcome> for VerifyResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        Self {
            success: true,
            message: if outcome.is_match {
                "Voice verified".to_string()
            } else {
                "Voice did not match".to_string()
            },
            score: outcome.display_score,
            is_match: outcome.is_match,
            threshold: outcome.threshold,
        }
    }
}

/// `POST /api/voice/verify`
pub async fn verify(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<VerifyResponse>, ApiError> {
    let mut upload = read_upload(multipart).await?;
    if upload.samples.len() != 1 {
        return Err(ApiError::validation(format!(
            "Verification requires exactly one audio sample, got {}",
            upload.samples.len()
        )));
    }

    let sample = upload.samples.remove(0);
    let outcome = state
        .orchestrator
        .verify(user.id(), upload.device_id, sample)
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
    pub enrolled: bool,
    #[serde(flatten)]
    pub voiceprint: Option<VoiceprintSummary>,
}

/// `GET /api/voice/status`
pub async fn status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.orchestrator.status(user.id()).await?;
    Ok(Json(StatusResponse {
        success: true,
        message: if status.enrolled {
            "Voice enrolled".to_string()
        } else {
            "No voice enrolled".to_string()
        },
        enrolled: status.enrolled,
        voiceprint: status.voiceprint,
    }))
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub success: bool,
    pub message: String,
    pub removed: bool,
}

/// `DELETE /api/voice/enroll`
pub async fn remove(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<RemoveResponse>, ApiError> {
    let removed = state.orchestrator.remove(user.id()).await?;
    Ok(Json(RemoveResponse {
        success: true,
        message: if removed {
            "Voice enrollment removed".to_string()
        } else {
            "No voice enrollment to remove".to_string()
        },
        removed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub message: String,
    pub enrollments: Vec<EnrollmentAttempt>,
    pub verifications: Vec<VerificationAttempt>,
}

/// `GET /api/voice/history`
pub async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let history = state.orchestrator.history(user.id(), limit).await?;

    Ok(Json(HistoryResponse {
        success: true,
        message: format!(
            "{} enrollment and {} verification attempts",
            history.enrollments.len(),
            history.verifications.len()
        ),
        enrollments: history.enrollments,
        verifications: history.verifications,
    }))
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub url: String,
    pub healthy: bool,
    pub reachable: bool,
    pub status: Option<String>,
    pub model_loaded: bool,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub service: ServiceStatus,
}

/// `GET /api/voice/health` (unauthenticated)
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.orchestrator.service_health().await;
    let healthy = report.is_healthy();

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let message = if healthy {
        "Voice embedding service is healthy"
    } else {
        "Voice embedding service is unavailable"
    };

    (
        status,
        Json(HealthResponse {
            success: healthy,
            message: message.to_string(),
            service: ServiceStatus {
                url: state.embedding_url.to_string(),
                healthy,
                reachable: report.reachable,
                status: report.status,
                model_loaded: report.model_loaded,
                message: report.message,
            },
        }),
    )
}
