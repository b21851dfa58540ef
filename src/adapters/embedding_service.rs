//! HTTP client for the speaker-embedding microservice.
//!
//! Endpoints:
//! - `GET /health` -> `{status, model_loaded, message}`
//! - `POST /embed` (multipart field `file`) -> `{success, embedding, message}`
//!
//! Non-2xx responses carry `{detail}` or `{message}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{AudioSample, EmbeddingBackend, EmbeddingOutput, EmbeddingServiceError, ServiceHealth};
use crate::domain::EMBEDDING_DIM;

/// Connection settings for the embedding service
#[derive(Debug, Clone)]
pub struct EmbeddingServiceConfig {
    /// Base URL, e.g. `http://localhost:8000`
    pub base_url: String,

    /// Timeout for the health probe
    pub health_timeout: Duration,

    /// Timeout for a single embedding request
    pub request_timeout: Duration,

    /// Largest audio payload sent upstream
    pub max_upload_bytes: usize,

    /// Expected embedding dimension
    pub dimension: usize,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            health_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            max_upload_bytes: 50 * 1024 * 1024, // 50MB
            dimension: EMBEDDING_DIM,
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    model_loaded: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Body of a 2xx `POST /embed`
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    success: bool,
    #[serde(default)]
    embedding: Option<Vec<f64>>,
    #[serde(default)]
    message: Option<String>,
}

/// Embedding service client over HTTP
pub struct HttpEmbeddingClient {
    config: EmbeddingServiceConfig,
    client: reqwest::Client,
}

impl HttpEmbeddingClient {
    /// Create a new client
    pub fn new(config: EmbeddingServiceConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Build endpoint URL
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    fn build_form(sample: &AudioSample) -> Result<Form, EmbeddingServiceError> {
        let file_name = sample
            .filename
            .clone()
            .unwrap_or_else(|| "audio.wav".to_string());
        // The service rejects parts that are not audio/*
        let part = Part::bytes(sample.bytes.clone())
            .file_name(file_name)
            .mime_str(sample.upload_mime())
            .map_err(|e| EmbeddingServiceError::Unknown(format!("invalid content type: {}", e)))?;

        Ok(Form::new().part("file", part))
    }
}

/// Map a transport error onto the service error kinds
fn classify(error: reqwest::Error) -> EmbeddingServiceError {
    if error.is_timeout() {
        EmbeddingServiceError::Timeout
    } else if error.is_connect() {
        EmbeddingServiceError::ConnectionRefused
    } else if let Some(status) = error.status() {
        EmbeddingServiceError::HttpError {
            status: status.as_u16(),
            message: error.to_string(),
        }
    } else if error.is_decode() {
        EmbeddingServiceError::InvalidResponse(error.to_string())
    } else {
        EmbeddingServiceError::Unknown(error.to_string())
    }
}

/// Pull `detail` or `message` out of an error body, falling back to raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("message"))
                .map(|m| match m.as_str() {
                    Some(s) => s.to_string(),
                    None => m.to_string(),
                })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingClient {
    fn name(&self) -> &str {
        "embedding-service"
    }

    async fn health_report(&self) -> ServiceHealth {
        let response = match self
            .client
            .get(self.endpoint("health"))
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let e = classify(e);
                debug!(error = %e, "Embedding service health probe failed");
                return ServiceHealth::unreachable(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            return ServiceHealth::unreachable(format!("health endpoint returned HTTP {}", status));
        }

        match response.json::<HealthResponse>().await {
            Ok(health) => ServiceHealth {
                reachable: true,
                status: Some(health.status),
                model_loaded: health.model_loaded,
                message: health.message,
            },
            Err(e) => ServiceHealth {
                reachable: true,
                status: None,
                model_loaded: false,
                message: Some(format!("unreadable health response: {}", e)),
            },
        }
    }

    #[instrument(skip(self, sample), fields(bytes = sample.len()))]
    async fn embed_one(&self, sample: &AudioSample) -> Result<EmbeddingOutput, EmbeddingServiceError> {
        if sample.is_empty() {
            return Err(EmbeddingServiceError::Unknown(
                "audio payload is empty".to_string(),
            ));
        }
        if sample.len() > self.config.max_upload_bytes {
            return Err(EmbeddingServiceError::Unknown(format!(
                "audio payload of {} bytes exceeds limit of {} bytes",
                sample.len(),
                self.config.max_upload_bytes
            )));
        }

        let response = self
            .client
            .post(self.endpoint("embed"))
            .timeout(self.config.request_timeout)
            .multipart(Self::build_form(sample)?)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;

        if !status.is_success() {
            return Err(EmbeddingServiceError::HttpError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| EmbeddingServiceError::InvalidResponse(e.to_string()))?;

        if !parsed.success {
            return Err(EmbeddingServiceError::InvalidResponse(
                parsed
                    .message
                    .unwrap_or_else(|| "service reported failure".to_string()),
            ));
        }

        let vector = match parsed.embedding {
            Some(v) if !v.is_empty() => v,
            _ => {
                return Err(EmbeddingServiceError::InvalidResponse(
                    "response has no embedding".to_string(),
                ))
            }
        };

        if vector.len() != self.config.dimension {
            warn!(
                got = vector.len(),
                expected = self.config.dimension,
                "Unexpected embedding dimension"
            );
        }

        Ok(EmbeddingOutput::new(vector))
    }
}
