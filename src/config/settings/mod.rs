
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

/// Environment variable consulted when no Gemini API key is configured
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Which service backs both embedding and answer generation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Ollama,
}

impl Provider {
    pub const ALL: [Self; 2] = [Self::Gemini, Self::Ollama];
}

impl fmt::Display for Provider {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub generation_model: String,
    pub embedding_dimension: u32,
    pub batch_size: u32,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            embedding_model: "gemini-embedding-001".to_string(),
            generation_model: "gemini-2.5-flash".to_string(),
            embedding_dimension: 1536,
            batch_size: 32,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub embedding_dimension: u32,
    pub batch_size: u32,
    /// Prepended to every chunk before embedding
    pub document_prefix: String,
    /// Prepended to every question before embedding
    pub query_prefix: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.2:latest".to_string(),
            embedding_dimension: 768,
            batch_size: 16,
            document_prefix: "search_document: ".to_string(),
            query_prefix: "search_query: ".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks placed in the answer context
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Documents shorter than this many characters are refused before indexing
    pub min_document_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_document_chars: 100,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and {1})")]
    InvalidBatchSize(u32, u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} seconds (must be between 1 and 600)")]
    InvalidTimeout(u64),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000 words)")]
    InvalidChunkSize(usize),
    #[error("Invalid overlap: {0} (must be smaller than the chunk size {1})")]
    InvalidOverlap(usize, usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("No Gemini API key configured and GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.docs-qa`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".docs-qa"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("docs-qa"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the default configuration directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        Self::load(config_dir)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

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

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gemini.validate()?;
        self.ollama.validate()?;
        validate_chunking(&self.chunking)?;
        validate_top_k(self.retrieval.top_k)?;
        Ok(())
    }

    /// Dimension of the vectors produced by the active provider
    #[inline]
    pub fn embedding_dimension(&self) -> u32 {
        match self.provider {
            Provider::Gemini => self.gemini.embedding_dimension,
            Provider::Ollama => self.ollama.embedding_dimension,
        }
    }

    #[inline]
    pub fn set_chunking(&mut self, chunk_size: usize, overlap: usize) -> Result<(), ConfigError> {
        let chunking = ChunkingConfig {
            chunk_size,
            overlap,
        };
        validate_chunking(&chunking)?;
        self.chunking = chunking;
        Ok(())
    }

    #[inline]
    pub fn set_top_k(&mut self, top_k: usize) -> Result<(), ConfigError> {
        validate_top_k(top_k)?;
        self.retrieval.top_k = top_k;
        Ok(())
    }
}

/// Check chunking parameters supplied from config or the command line
#[inline]
pub fn validate_chunking(config: &ChunkingConfig) -> Result<(), ConfigError> {
    if !(1..=100_000).contains(&config.chunk_size) {
        return Err(ConfigError::InvalidChunkSize(config.chunk_size));
    }

    if config.overlap >= config.chunk_size {
        return Err(ConfigError::InvalidOverlap(
            config.overlap,
            config.chunk_size,
        ));
    }

    Ok(())
}

#[inline]
pub fn validate_top_k(top_k: usize) -> Result<(), ConfigError> {
    if !(1..=100).contains(&top_k) {
        return Err(ConfigError::InvalidTopK(top_k));
    }
    Ok(())
}

fn validate_model(model: &str) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::InvalidModel(model.to_string()));
    }
    Ok(())
}

fn validate_dimension(dimension: u32) -> Result<(), ConfigError> {
    if !(64..=4096).contains(&dimension) {
        return Err(ConfigError::InvalidEmbeddingDimension(dimension));
    }
    Ok(())
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}

fn validate_batch_size(batch_size: u32, max: u32) -> Result<(), ConfigError> {
    if batch_size == 0 || batch_size > max {
        return Err(ConfigError::InvalidBatchSize(batch_size, max));
    }
    Ok(())
}

impl GeminiConfig {
    /// Largest batch the batchEmbedContents endpoint accepts
    pub const MAX_BATCH_SIZE: u32 = 100;

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        validate_model(&self.embedding_model)?;
        validate_model(&self.generation_model)?;
        validate_dimension(self.embedding_dimension)?;
        validate_batch_size(self.batch_size, Self::MAX_BATCH_SIZE)?;
        validate_timeout(self.timeout_seconds)?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(self.base_url.clone()));
        }
        Ok(url)
    }

    /// The configured API key, or the one in the environment
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var(GEMINI_API_KEY_ENV)
                    .ok()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
            })
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        let temp_config = GeminiConfig {
            base_url: base_url.clone(),
            ..self.clone()
        };
        temp_config.base_url()?;
        self.base_url = base_url;
        Ok(())
    }

    /// Store an API key; a blank key clears it so the environment is used
    pub fn set_api_key(&mut self, api_key: String) {
        let api_key = api_key.trim();
        self.api_key = (!api_key.is_empty()).then(|| api_key.to_string());
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.generation_model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        validate_dimension(dimension)?;
        self.embedding_dimension = dimension;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        validate_batch_size(batch_size, Self::MAX_BATCH_SIZE)?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl OllamaConfig {
    pub const MAX_BATCH_SIZE: u32 = 1000;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        validate_model(&self.embedding_model)?;
        validate_model(&self.generation_model)?;
        validate_batch_size(self.batch_size, Self::MAX_BATCH_SIZE)?;
        validate_dimension(self.embedding_dimension)?;
        validate_timeout(self.timeout_seconds)?;

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.ollama_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.generation_model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        validate_batch_size(batch_size, Self::MAX_BATCH_SIZE)?;
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        validate_dimension(dimension)?;
        self.embedding_dimension = dimension;
        Ok(())
    }
}
