//! Adapter interfaces for the external embedding service.
//!
//! The speaker model runs out of process. Adapters expose it as a health
//! probe plus single-sample embedding; batch fan-out is built on top.

pub mod embedding_service;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

// Re-export the HTTP client
pub use embedding_service::{EmbeddingServiceConfig, HttpEmbeddingClient};

/// Failures talking to the embedding service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingServiceError {
    #[error("Embedding service refused the connection")]
    ConnectionRefused,

    #[error("Embedding service timed out")]
    Timeout,

    #[error("Embedding service returned HTTP {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("Invalid response from embedding service: {0}")]
    InvalidResponse(String),

    #[error("Embedding service error: {0}")]
    Unknown(String),
}

impl EmbeddingServiceError {
    /// Stable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection_refused",
            Self::Timeout => "timeout",
            Self::HttpError { .. } => "http_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// One uploaded audio clip
#[derive(Debug, Clone)]
pub struct AudioSample {
    /// Raw file bytes (WAV preferred)
    pub bytes: Vec<u8>,

    /// Original file name, if known
    pub filename: Option<String>,

    /// Declared MIME type, if known
    pub content_type: Option<String>,
}

impl AudioSample {
    /// Create a sample from raw bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            filename: None,
            content_type: None,
        }
    }

    /// Attach a file name
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Attach a MIME type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// MIME type to send upstream; always `audio/*`.
    ///
    /// A declared `audio/*` type wins, then the file extension, then `audio/wav`.
    pub fn upload_mime(&self) -> &str {
        if let Some(declared) = self.content_type.as_deref() {
            if declared.to_ascii_lowercase().starts_with("audio/") {
                return declared;
            }
        }
        self.filename
            .as_deref()
            .and_then(audio_mime_for)
            .unwrap_or("audio/wav")
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Guess an audio MIME type from a file name's extension
pub fn audio_mime_for(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "m4a" | "mp4" => Some("audio/mp4"),
        "ogg" | "oga" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "webm" => Some("audio/webm"),
        _ => None,
    }
}

/// A successfully extracted embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutput {
    pub vector: Vec<f64>,
    pub dimension: usize,
}

impl EmbeddingOutput {
    pub fn new(vector: Vec<f64>) -> Self {
        let dimension = vector.len();
        Self { vector, dimension }
    }
}

/// Health snapshot of the embedding service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceHealth {
    /// The status endpoint answered with a 2xx
    pub reachable: bool,

    /// Reported status string (e.g. "healthy")
    pub status: Option<String>,

    /// Whether the speaker model is loaded
    pub model_loaded: bool,

    /// Service message or transport error
    pub message: Option<String>,
}

impl ServiceHealth {
    /// Unreachable service with a reason
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            reachable: false,
            status: None,
            model_loaded: false,
            message: Some(message.into()),
        }
    }

    /// Operational status AND model loaded
    pub fn is_healthy(&self) -> bool {
        self.reachable && self.status.as_deref() == Some("healthy") && self.model_loaded
    }
}

/// Trait for embedding backends
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Probe the service; never fails, transport errors become unhealthy
    async fn health_report(&self) -> ServiceHealth;

    /// Boolean health probe
    async fn health_check(&self) -> bool {
        self.health_report().await.is_healthy()
    }

    /// Extract one embedding
    async fn embed_one(&self, sample: &AudioSample) -> Result<EmbeddingOutput, EmbeddingServiceError>;
}

/// Result of a batch embedding request
#[derive(Debug, Clone, Default)]
pub struct BatchEmbedding {
    /// Successful vectors, in completion order
    pub vectors: Vec<Vec<f64>>,

    /// Per-sample failures
    pub errors: Vec<EmbeddingServiceError>,
}

impl BatchEmbedding {
    pub fn success_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn failure_count(&self) -> usize {
        self.errors.len()
    }

    /// At least one sample produced an embedding
    pub fn success(&self) -> bool {
        !self.vectors.is_empty()
    }
}

/// Embed every sample concurrently and wait for all of them to settle.
///
/// Failures are isolated per sample; a panicked task counts as an
/// `Unknown` failure. Result order does not follow input order.
pub async fn embed_many(
    backend: Arc<dyn EmbeddingBackend>,
    samples: Vec<AudioSample>,
) -> BatchEmbedding {
    let mut tasks = JoinSet::new();
    for sample in samples {
        let backend = Arc::clone(&backend);
        tasks.spawn(async move { backend.embed_one(&sample).await });
    }

    let mut batch = BatchEmbedding::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(output)) => batch.vectors.push(output.vector),
            Ok(Err(e)) => {
                warn!(kind = e.kind(), error = %e, "Sample embedding failed");
                batch.errors.push(e);
            }
            Err(e) => {
                warn!(error = %e, "Embedding task aborted");
                batch
                    .errors
                    .push(EmbeddingServiceError::Unknown(format!("embedding task failed: {}", e)));
            }
        }
    }

    debug!(
        backend = backend.name(),
        successes = batch.success_count(),
        failures = batch.failure_count(),
        "Batch embedding settled"
    );
    batch
}
