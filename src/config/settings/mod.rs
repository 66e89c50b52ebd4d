
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::SupportError;
use crate::chunking::ChunkingConfig;
use crate::index::Distance;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub batch_size: usize,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/embed".to_string(),
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    #[inline]
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "llama3.1:latest".to_string(),
            api_key: None,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    pub api_key: Option<String>,
    pub cooldown_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for SpeechConfig {
    #[inline]
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/audio/speech".to_string(),
            model: "gpt-4o-mini-tts".to_string(),
            voice: "coral".to_string(),
            api_key: None,
            cooldown_seconds: 10,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub collection: String,
    pub distance: Distance,
    #[serde(flatten)]
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub history_window: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            collection: "docs_embeddings".to_string(),
            distance: Distance::Cosine,
            chunking: ChunkingConfig::default(),
            top_k: 3,
            history_window: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid chunk size: {0} (must be between 100 and 8192 characters)")]
    InvalidChunkSize(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 20)")]
    InvalidTopK(usize),
    #[error("Invalid history window: {0} (must be between 1 and 50 turns)")]
    InvalidHistoryWindow(usize),
    #[error("Invalid collection name: {0} (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid voice: {0} (cannot be empty)")]
    InvalidVoice(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.generation.validate()?;
        self.speech.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            speech: SpeechConfig::default(),
            retrieval: RetrievalConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    Url::parse(endpoint).map_err(|_| ConfigError::InvalidUrl(endpoint.to_string()))?;
    Ok(())
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if !(1..=300).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.endpoint)?;
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        validate_timeout(self.timeout_seconds)?;
        Ok(())
    }

    #[inline]
    pub fn endpoint_url(&self) -> crate::Result<Url> {
        Url::parse(&self.endpoint)
            .map_err(|_| SupportError::Config(format!("invalid embedding endpoint: {}", self.endpoint)))
    }
}

impl GenerationConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.endpoint)?;
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }
        validate_timeout(self.timeout_seconds)?;
        Ok(())
    }

    #[inline]
    pub fn endpoint_url(&self) -> crate::Result<Url> {
        Url::parse(&self.endpoint).map_err(|_| {
            SupportError::Config(format!("invalid generation endpoint: {}", self.endpoint))
        })
    }
}

impl SpeechConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.endpoint)?;
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }
        if self.voice.trim().is_empty() {
            return Err(ConfigError::InvalidVoice(self.voice.clone()));
        }
        validate_timeout(self.timeout_seconds)?;
        Ok(())
    }

    #[inline]
    pub fn endpoint_url(&self) -> crate::Result<Url> {
        Url::parse(&self.endpoint)
            .map_err(|_| SupportError::Config(format!("invalid speech endpoint: {}", self.endpoint)))
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }
        if !(100..=8192).contains(&self.chunking.max_chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunking.max_chunk_size));
        }
        if !(1..=20).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        if !(1..=50).contains(&self.history_window) {
            return Err(ConfigError::InvalidHistoryWindow(self.history_window));
        }
        Ok(())
    }
}
