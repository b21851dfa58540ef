//! Configuration for voxguard.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VOXGUARD_EMBEDDING_URL, VOXGUARD_THRESHOLD, ...)
//! 2. Config file (.voxguard/config.yaml, or the path in VOXGUARD_CONFIG)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .voxguard/config.yaml
//! - A relative database path is resolved against the project root
//!   (the parent of .voxguard/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::EmbeddingServiceConfig;
use crate::core::VoicePolicy;
use crate::domain::{DEFAULT_THRESHOLD, EMBEDDING_DIM, MAX_ENROLLMENT_SAMPLES, MIN_ENROLLMENT_SAMPLES};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub embedding: EmbeddingFileConfig,
    #[serde(default)]
    pub voice: VoiceFileConfig,
    #[serde(default)]
    pub storage: StorageFileConfig,
    #[serde(default)]
    pub server: ServerFileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingFileConfig {
    pub url: Option<String>,
    pub health_timeout_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    pub max_upload_bytes: Option<usize>,
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub default_threshold: Option<f64>,
    pub min_enrollment_samples: Option<usize>,
    pub max_enrollment_samples: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageFileConfig {
    /// Database path (relative to the project root)
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerFileConfig {
    pub bind: Option<String>,
    pub api_token: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Embedding service connection
    pub embedding: EmbeddingServiceConfig,
    /// Enrollment/verification policy
    pub voice: VoicePolicy,
    /// Absolute path to the SQLite database
    pub database: PathBuf,
    /// HTTP bind address
    pub bind: String,
    /// Shared bearer token required on authenticated routes
    pub api_token: Option<String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Largest request body the HTTP layer accepts
    pub fn max_request_bytes(&self) -> usize {
        self.embedding
            .max_upload_bytes
            .saturating_mul(self.voice.max_samples)
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("VOXGUARD_CONFIG") {
        return Some(PathBuf::from(explicit));
    }

    let mut current = std::env::current_dir().ok()?;
    loop {
        let config_path = current.join(".voxguard").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(None),
    }
}

/// Merge file values, environment and defaults, then validate
fn resolve(
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let (config_file, file_config) = match file {
        Some((path, config)) => (Some(path), config),
        None => (None, ConfigFile::default()),
    };

    // Base directory is the parent of .voxguard/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .map(Path::to_path_buf);

    let defaults = EmbeddingServiceConfig::default();
    let embedding = EmbeddingServiceConfig {
        base_url: env("VOXGUARD_EMBEDDING_URL")
            .or(file_config.embedding.url)
            .unwrap_or(defaults.base_url),
        health_timeout: Duration::from_secs(
            parse_env(&env, "VOXGUARD_HEALTH_TIMEOUT_SECONDS")?
                .or(file_config.embedding.health_timeout_seconds)
                .unwrap_or(defaults.health_timeout.as_secs()),
        ),
        request_timeout: Duration::from_secs(
            parse_env(&env, "VOXGUARD_REQUEST_TIMEOUT_SECONDS")?
                .or(file_config.embedding.request_timeout_seconds)
                .unwrap_or(defaults.request_timeout.as_secs()),
        ),
        max_upload_bytes: parse_env(&env, "VOXGUARD_MAX_UPLOAD_BYTES")?
            .or(file_config.embedding.max_upload_bytes)
            .unwrap_or(defaults.max_upload_bytes),
        dimension: file_config.embedding.dimension.unwrap_or(EMBEDDING_DIM),
    };

    let voice = VoicePolicy {
        default_threshold: parse_env(&env, "VOXGUARD_THRESHOLD")?
            .or(file_config.voice.default_threshold)
            .unwrap_or(DEFAULT_THRESHOLD),
        dimension: embedding.dimension,
        min_samples: file_config
            .voice
            .min_enrollment_samples
            .unwrap_or(MIN_ENROLLMENT_SAMPLES),
        max_samples: file_config
            .voice
            .max_enrollment_samples
            .unwrap_or(MAX_ENROLLMENT_SAMPLES),
    };

    let database = if let Some(env_db) = env("VOXGUARD_DATABASE") {
        PathBuf::from(env_db)
    } else if let (Some(db), Some(base)) = (file_config.storage.database.as_deref(), base_dir.as_deref()) {
        resolve_path(base, db)
    } else if let Some(db) = file_config.storage.database.as_deref() {
        PathBuf::from(db)
    } else {
        dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".voxguard")
            .join("voxguard.db")
    };

    let bind = env("VOXGUARD_BIND")
        .or(file_config.server.bind)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let api_token = env("VOXGUARD_API_TOKEN")
        .or(file_config.server.api_token)
        .filter(|t| !t.trim().is_empty());

    let resolved = ResolvedConfig {
        embedding,
        voice,
        database,
        bind,
        api_token,
        config_file,
    };
    validate(&resolved)?;
    Ok(resolved)
}

fn validate(config: &ResolvedConfig) -> Result<()> {
    let threshold = config.voice.default_threshold;
    if !(-1.0..=1.0).contains(&threshold) {
        anyhow::bail!("Threshold must lie in [-1, 1], got {}", threshold);
    }
    if config.embedding.dimension == 0 {
        anyhow::bail!("Embedding dimension must be positive");
    }
    if config.voice.min_samples == 0 || config.voice.min_samples > config.voice.max_samples {
        anyhow::bail!(
            "Invalid enrollment sample bounds: min {} max {}",
            config.voice.min_samples,
            config.voice.max_samples
        );
    }
    Ok(())
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };
    resolve(file, |key| std::env::var(key).ok())
}

/// Load configuration from an explicit file, still honoring env overrides
pub fn load_config_from(path: &Path) -> Result<ResolvedConfig> {
    let config = load_config_file(path)?;
    resolve(Some((path.to_path_buf(), config)), |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
