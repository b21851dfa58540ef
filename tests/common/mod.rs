//! Shared test fixtures: a scripted embedding backend and store wrappers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use voxguard::adapters::{AudioSample, EmbeddingBackend, EmbeddingOutput, EmbeddingServiceError, ServiceHealth};
use voxguard::core::{VoiceOrchestrator, VoicePolicy};
use voxguard::domain::{EnrollmentAttempt, VerificationAttempt, Voiceprint, EMBEDDING_DIM};
use voxguard::storage::{SqliteStore, StorageError, VoiceStore};

/// Embedding backend that answers per file name
pub struct FakeBackend {
    healthy: AtomicBool,
    script: Mutex<HashMap<String, Result<Vec<f64>, EmbeddingServiceError>>>,
    calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            script: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Respond to `name` with `vector`
    pub fn with_vector(self, name: &str, vector: Vec<f64>) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(name.to_string(), Ok(vector));
        self
    }

    /// Fail `name` with `error`
    pub fn with_failure(self, name: &str, error: EmbeddingServiceError) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(name.to_string(), Err(error));
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of embed requests received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn health_report(&self) -> ServiceHealth {
        if self.healthy.load(Ordering::SeqCst) {
            ServiceHealth {
                reachable: true,
                status: Some("healthy".to_string()),
                model_loaded: true,
                message: Some("fake backend".to_string()),
            }
        } else {
            ServiceHealth::unreachable("fake backend is down")
        }
    }

    async fn embed_one(&self, sample: &AudioSample) -> Result<EmbeddingOutput, EmbeddingServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = sample.filename.clone().unwrap_or_default();
        let scripted = self.script.lock().unwrap().get(&name).cloned();
        match scripted {
            Some(Ok(vector)) => Ok(EmbeddingOutput::new(vector)),
            Some(Err(e)) => Err(e),
            None => Err(EmbeddingServiceError::Unknown(format!("unscripted sample {}", name))),
        }
    }
}

/// Unit vector along `axis`
pub fn basis(axis: usize) -> Vec<f64> {
    let mut v = vec![0.0; EMBEDDING_DIM];
    v[axis] = 1.0;
    v
}

/// Deterministic non-trivial vector
pub fn wave(seed: f64) -> Vec<f64> {
    (0..EMBEDDING_DIM)
        .map(|i| ((i as f64 + 1.0) * seed).sin())
        .collect()
}

/// Audio sample whose file name selects the scripted response
pub fn sample(name: &str) -> AudioSample {
    AudioSample::new(vec![0x52, 0x49, 0x46, 0x46, 1, 2, 3, 4])
        .with_filename(name)
        .with_content_type("audio/wav")
}

/// 16 kHz mono PCM WAV clip carrying `pcm`, named `name`
pub fn wav_sample(name: &str, pcm: &[i16]) -> AudioSample {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in pcm {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }
    AudioSample::new(cursor.into_inner())
        .with_filename(name)
        .with_content_type("audio/wav")
}

pub fn samples(names: &[&str]) -> Vec<AudioSample> {
    names.iter().map(|n| sample(n)).collect()
}

/// Orchestrator over a fake backend and an in-memory store
pub fn harness(backend: FakeBackend) -> (VoiceOrchestrator, Arc<FakeBackend>, Arc<SqliteStore>) {
    let backend = Arc::new(backend);
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let orchestrator = VoiceOrchestrator::new(
        backend.clone(),
        store.clone(),
        VoicePolicy::default(),
    );
    (orchestrator, backend, store)
}

/// Store whose audit inserts always fail
pub struct AuditFailingStore {
    pub inner: SqliteStore,
}

impl AuditFailingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
        }
    }
}

#[async_trait]
impl VoiceStore for AuditFailingStore {
    async fn get_voiceprint(&self, identity: &str) -> Result<Option<Voiceprint>, StorageError> {
        self.inner.get_voiceprint(identity).await
    }

    async fn upsert_voiceprint(
        &self,
        identity: &str,
        embedding: &[f64],
        sample_count: u32,
        threshold: f64,
    ) -> Result<Voiceprint, StorageError> {
        self.inner
            .upsert_voiceprint(identity, embedding, sample_count, threshold)
            .await
    }

    async fn delete_voiceprint(&self, identity: &str) -> Result<bool, StorageError> {
        self.inner.delete_voiceprint(identity).await
    }

    async fn record_enrollment_attempt(&self, _attempt: &EnrollmentAttempt) -> Result<(), StorageError> {
        Err(StorageError::Corrupt("audit table unavailable".to_string()))
    }

    async fn record_verification_attempt(
        &self,
        _attempt: &VerificationAttempt,
    ) -> Result<(), StorageError> {
        Err(StorageError::Corrupt("audit table unavailable".to_string()))
    }

    async fn enrollment_attempts(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<EnrollmentAttempt>, StorageError> {
        self.inner.enrollment_attempts(identity, limit).await
    }

    async fn verification_attempts(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<VerificationAttempt>, StorageError> {
        self.inner.verification_attempts(identity, limit).await
    }
}
