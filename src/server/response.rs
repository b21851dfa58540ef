//! JSON error responses.
//!
//! Every body carries `success` and `message`; errors add a stable `code`
//! and, for enrollment shortfalls, the sample counts a client needs to
//! decide whether to retry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::core::VoiceError;

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achieved: Option<usize>,
}

/// An error ready to be rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                success: false,
                code,
                message: message.into(),
                samples_processed: None,
                required: None,
                achieved: None,
            },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }
}

/// HTTP status for each failure kind
fn status_for(error: &VoiceError) -> StatusCode {
    match error {
        VoiceError::Validation(_) => StatusCode::BAD_REQUEST,
        VoiceError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        VoiceError::EmbeddingService(_) | VoiceError::EmbeddingFailed(_) => StatusCode::BAD_GATEWAY,
        VoiceError::InsufficientSamples { .. }
        | VoiceError::Aggregation(_)
        | VoiceError::InvalidEmbedding(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VoiceError::NotEnrolled => StatusCode::NOT_FOUND,
        VoiceError::Storage(_) | VoiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        if err.is_internal() {
            error!(error = %err, "Request failed with internal error");
        } else {
            warn!(code = err.code(), error = %err, "Request failed");
        }

        let mut api = ApiError::new(status_for(&err), err.code(), err.public_message());
        if let VoiceError::InsufficientSamples {
            required,
            achieved,
            samples_processed,
        } = err
        {
            api.body.required = Some(required);
            api.body.achieved = Some(achieved);
            api.body.samples_processed = Some(samples_processed);
        }
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
