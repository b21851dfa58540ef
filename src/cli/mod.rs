//! Command-line interface for voxguard.
//!
//! Runs the HTTP service, and drives the same orchestrator locally for
//! enrollment, verification and inspection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{audio_mime_for, AudioSample, EmbeddingBackend, HttpEmbeddingClient};
use crate::config::{self, ResolvedConfig};
use crate::core::VoiceOrchestrator;
use crate::server::{self, build_orchestrator};

/// voxguard - Voice enrollment and verification service
#[derive(Parser, Debug)]
#[command(name = "voxguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .voxguard/config.yaml discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides config)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Probe the embedding service
    Health,

    /// Enroll a user from 3-5 audio files
    Enroll {
        /// User id to enroll
        #[arg(short, long)]
        user: String,

        /// Device identifier recorded in the audit log
        #[arg(short, long)]
        device: Option<String>,

        /// Audio files (WAV preferred)
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Verify one audio file against a user's voiceprint
    Verify {
        /// User id to verify
        #[arg(short, long)]
        user: String,

        /// Device identifier recorded in the audit log
        #[arg(short, long)]
        device: Option<String>,

        /// Audio file
        file: PathBuf,
    },

    /// Show a user's enrollment status
    Status {
        #[arg(short, long)]
        user: String,
    },

    /// Remove a user's voiceprint
    Remove {
        #[arg(short, long)]
        user: String,
    },

    /// Show recent enrollment and verification attempts
    History {
        #[arg(short, long)]
        user: String,

        /// Maximum number of attempts of each kind
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => config::load_config_from(path)?,
            None => config::config()?.clone(),
        };

        match self.command {
            Commands::Serve { address } => server::serve(&config, address.as_deref()).await,
            Commands::Health => show_health(&config).await,
            Commands::Enroll { user, device, files } => {
                enroll(&config, &user, device, &files).await
            }
            Commands::Verify { user, device, file } => verify(&config, &user, device, &file).await,
            Commands::Status { user } => show_status(&config, &user).await,
            Commands::Remove { user } => remove(&config, &user).await,
            Commands::History { user, limit } => show_history(&config, &user, limit).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Read an audio file into a sample
async fn load_sample(path: &Path) -> Result<AudioSample> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;

    let mut sample = AudioSample::new(bytes);
    if let Some(name) = path.file_name() {
        let name = name.to_string_lossy();
        if let Some(mime) = audio_mime_for(&name) {
            sample = sample.with_content_type(mime);
        }
        sample = sample.with_filename(name);
    }
    Ok(sample)
}

fn orchestrator(config: &ResolvedConfig) -> Result<VoiceOrchestrator> {
    build_orchestrator(config)
}

async fn show_health(config: &ResolvedConfig) -> Result<()> {
    let client = HttpEmbeddingClient::new(config.embedding.clone());
    let report = client.health_report().await;

    println!("Embedding service: {}", client.base_url());
    println!("  Reachable:    {}", report.reachable);
    println!("  Status:       {}", report.status.as_deref().unwrap_or("-"));
    println!("  Model loaded: {}", report.model_loaded);
    if let Some(message) = &report.message {
        println!("  Message:      {}", message);
    }

    if !report.is_healthy() {
        anyhow::bail!("Embedding service is not healthy");
    }
    Ok(())
}

async fn enroll(
    config: &ResolvedConfig,
    user: &str,
    device: Option<String>,
    files: &[PathBuf],
) -> Result<()> {
    let mut samples = Vec::with_capacity(files.len());
    for path in files {
        samples.push(load_sample(path).await?);
    }

    let outcome = orchestrator(config)?
        .enroll(user, device, samples)
        .await
        .with_context(|| format!("Enrollment failed for {}", user))?;

    println!("Enrolled {}", user);
    println!(
        "  Samples:   {} of {} submitted",
        outcome.samples_processed, outcome.samples_submitted
    );
    println!("  Threshold: {}", outcome.threshold);
    println!("  Dimension: {}", outcome.embedding_dimension);
    if let Some(quality) = outcome.quality_score {
        println!("  SNR (dB):  {:.1}", quality);
    }
    Ok(())
}

async fn verify(config: &ResolvedConfig, user: &str, device: Option<String>, file: &Path) -> Result<()> {
    let sample = load_sample(file).await?;
    let outcome = orchestrator(config)?
        .verify(user, device, sample)
        .await
        .with_context(|| format!("Verification failed for {}", user))?;

    println!(
        "{}: score {:.3} (threshold {})",
        if outcome.is_match { "MATCH" } else { "NO MATCH" },
        outcome.display_score,
        outcome.threshold
    );
    if !outcome.is_match {
        std::process::exit(1);
    }
    Ok(())
}

async fn show_status(config: &ResolvedConfig, user: &str) -> Result<()> {
    let status = orchestrator(config)?.status(user).await?;
    match status.voiceprint {
        Some(vp) => {
            println!("{} is enrolled", user);
            println!("  Samples:   {}", vp.sample_count);
            println!("  Threshold: {}", vp.threshold);
            println!("  Dimension: {}", vp.dimension);
            println!("  Created:   {}", vp.created_at);
            println!("  Updated:   {}", vp.updated_at);
        }
        None => println!("{} is not enrolled", user),
    }
    Ok(())
}

async fn remove(config: &ResolvedConfig, user: &str) -> Result<()> {
    if orchestrator(config)?.remove(user).await? {
        println!("Removed voiceprint for {}", user);
    } else {
        println!("No voiceprint for {}", user);
    }
    Ok(())
}

async fn show_history(config: &ResolvedConfig, user: &str, limit: usize) -> Result<()> {
    let history = orchestrator(config)?.history(user, limit).await?;

    println!("Enrollment attempts:");
    if history.enrollments.is_empty() {
        println!("  (none)");
    }
    for attempt in &history.enrollments {
        println!(
            "  {} [{}] samples={} {}",
            attempt.timestamp.format("%Y-%m-%d %H:%M:%S"),
            if attempt.success { "OK  " } else { "FAIL" },
            attempt.samples_recorded,
            attempt.error.as_deref().unwrap_or("")
        );
    }

    println!();
    println!("Verification attempts:");
    if history.verifications.is_empty() {
        println!("  (none)");
    }
    for attempt in &history.verifications {
        let score = attempt
            .similarity_score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} [{}] score={} threshold={}",
            attempt.timestamp.format("%Y-%m-%d %H:%M:%S"),
            if attempt.is_match { "MATCH" } else { "NO   " },
            score,
            attempt.threshold_used
        );
    }
    Ok(())
}

fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("voxguard configuration");
    println!();
    match &config.config_file {
        Some(path) => println!("Config file:       {}", path.display()),
        None => println!("Config file:       (none, using defaults)"),
    }
    println!("Embedding URL:     {}", config.embedding.base_url);
    println!("Health timeout:    {:?}", config.embedding.health_timeout);
    println!("Request timeout:   {:?}", config.embedding.request_timeout);
    println!("Max upload bytes:  {}", config.embedding.max_upload_bytes);
    println!("Dimension:         {}", config.embedding.dimension);
    println!("Default threshold: {}", config.voice.default_threshold);
    println!(
        "Enrollment samples: {}-{}",
        config.voice.min_samples, config.voice.max_samples
    );
    println!("Database:          {}", config.database.display());
    println!("Bind:              {}", config.bind);
    println!(
        "API token:         {}",
        if config.api_token.is_some() { "set" } else { "not set" }
    );
    Ok(())
}
