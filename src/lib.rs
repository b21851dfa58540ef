//! voxguard - Voice-biometric enrollment and verification
//!
//! Backend service for the family safety app's optional voice check.
//! Speaker embeddings come from an external model service; this crate
//! averages them into voiceprints, scores fresh samples against them and
//! keeps an audit trail of every attempt.
//!
//! # Architecture
//!
//! - Enrollment: 3-5 samples are embedded concurrently, averaged and
//!   L2-normalized into a reference vector (one per identity, upserted)
//! - Verification: one sample is embedded and accepted when its cosine
//!   similarity with the reference is at least the stored threshold
//! - Every attempt past request validation lands in an append-only audit log
//!
//! # Modules
//!
//! - `adapters`: Embedding service client (trait + HTTP)
//! - `core`: Vector math, audio quality, orchestrator
//! - `domain`: Data structures (Voiceprint, attempt records)
//! - `storage`: Voiceprint and audit persistence (SQLite)
//! - `server`: HTTP API
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the service
//! voxguard serve --address 0.0.0.0:8080
//!
//! # Enroll and verify locally
//! voxguard enroll --user alice a.wav b.wav c.wav
//! voxguard verify --user alice fresh.wav
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod storage;

// Re-export main types at crate root for convenience
pub use crate::adapters::{AudioSample, EmbeddingBackend, EmbeddingServiceError, HttpEmbeddingClient};
pub use crate::core::{VoiceError, VoiceOrchestrator, VoicePolicy};
pub use crate::domain::{EnrollmentAttempt, VerificationAttempt, Voiceprint};
pub use crate::storage::{SqliteStore, StorageError, VoiceStore};
