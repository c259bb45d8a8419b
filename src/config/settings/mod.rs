#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::documents::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    /// Base endpoint for the generative language API. Overridable so tests
    /// can point the client at a local mock server.
    pub endpoint: String,
    /// Environment variable holding the API key. The key itself is never
    /// written to the config file.
    pub api_key_env: String,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dimension: u32,
    /// Maximum texts per embedding request.
    pub batch_size: u32,
}

impl Default for GeminiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            model: "gemini-1.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 16,
        }
    }
}

/// Which vector database backend is active for this deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorProvider {
    Pinecone,
    Qdrant,
    Weaviate,
    /// RAG disabled; chat runs without retrieval.
    #[default]
    None,
}

impl std::fmt::Display for VectorProvider {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pinecone => write!(f, "pinecone"),
            Self::Qdrant => write!(f, "qdrant"),
            Self::Weaviate => write!(f, "weaviate"),
            Self::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct VectorConfig {
    pub provider: VectorProvider,
    pub pinecone: PineconeConfig,
    pub qdrant: QdrantConfig,
    pub weaviate: WeaviateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PineconeConfig {
    /// Index host URL, e.g. `https://my-index-abc123.svc.us-east-1.pinecone.io`.
    pub index_host: String,
    pub api_key_env: String,
    pub namespace: String,
}

impl Default for PineconeConfig {
    #[inline]
    fn default() -> Self {
        Self {
            index_host: String::new(),
            api_key_env: "PINECONE_API_KEY".to_string(),
            namespace: "ragchat".to_string(),
        }
    }
}

impl PineconeConfig {
    /// Pinecone always requires a key.
    #[inline]
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub api_key_env: String,
}

impl Default for QdrantConfig {
    #[inline]
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "ragchat".to_string(),
            api_key_env: "QDRANT_API_KEY".to_string(),
        }
    }
}

impl QdrantConfig {
    /// Optional; local deployments usually run without authentication.
    #[inline]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeaviateConfig {
    pub url: String,
    pub class_name: String,
    pub api_key_env: String,
}

impl Default for WeaviateConfig {
    #[inline]
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            class_name: "RagchatChunk".to_string(),
            api_key_env: "WEAVIATE_API_KEY".to_string(),
        }
    }
}

impl WeaviateConfig {
    #[inline]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Lowercase extensions accepted for upload.
    pub allowed_extensions: Vec<String>,
    /// Default per-file size limit in megabytes.
    pub max_file_size_mb: u64,
    /// Per-extension overrides of the size limit.
    pub max_size_overrides_mb: BTreeMap<String, u64>,
}

impl Default for DocumentsConfig {
    #[inline]
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert("png".to_string(), 5);
        overrides.insert("jpg".to_string(), 5);
        overrides.insert("jpeg".to_string(), 5);
        Self {
            allowed_extensions: vec![
                "txt".to_string(),
                "md".to_string(),
                "pdf".to_string(),
                "docx".to_string(),
                "png".to_string(),
                "jpg".to_string(),
                "jpeg".to_string(),
            ],
            max_file_size_mb: 10,
            max_size_overrides_mb: overrides,
        }
    }
}

impl DocumentsConfig {
    /// Size limit in bytes for a given (lowercase) extension.
    #[inline]
    pub fn max_bytes_for(&self, extension: &str) -> u64 {
        self.max_size_overrides_mb
            .get(extension)
            .copied()
            .unwrap_or(self.max_file_size_mb)
            * 1024
            * 1024
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates requested from the backend per query.
    pub top_k: usize,
    /// Minimum similarity score for a match to enter context.
    pub threshold: f32,
    /// Upper bound on chunks included in an augmented prompt.
    pub max_context_chunks: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.7,
            max_context_chunks: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Fields that must be collected before chat proceeds.
    pub required_fields: Vec<String>,
    /// Inactivity timeout in minutes before a session is considered expired.
    pub timeout_minutes: i64,
    /// Trailing conversation turns replayed to the model.
    pub history_window: usize,
}

impl Default for SessionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            required_fields: vec![
                "name".to_string(),
                "email".to_string(),
                "purpose".to_string(),
            ],
            timeout_minutes: 30,
            history_window: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    /// JSON send endpoint of the transactional email provider.
    pub endpoint: String,
    pub api_key_env: String,
    pub from_address: String,
}

impl Default for EmailConfig {
    #[inline]
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.resend.com/emails".to_string(),
            api_key_env: "EMAIL_API_KEY".to_string(),
            from_address: "noreply@example.com".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 100)")]
    InvalidBatchSize(u32),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be between 100 and 8000 characters)")]
    InvalidChunkSize(usize),
    #[error("Invalid chunk overlap: {0} (must be smaller than chunk size {1})")]
    InvalidChunkOverlap(usize, usize),
    #[error("Invalid similarity threshold: {0} (must be between 0.0 and 1.0)")]
    InvalidThreshold(f32),
    #[error("Invalid top_k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Invalid max context chunks: {0} (must be between 1 and 20)")]
    InvalidMaxContextChunks(usize),
    #[error("Invalid session timeout: {0} minutes (must be between 1 and 1440)")]
    InvalidSessionTimeout(i64),
    #[error("Invalid history window: {0} (must be between 1 and 100)")]
    InvalidHistoryWindow(usize),
    #[error("Missing connection parameters for vector provider {0}: {1}")]
    MissingVectorParams(String, String),
    #[error("Invalid file size limit: {0} MB (must be between 1 and 100)")]
    InvalidFileSizeLimit(u64),
    #[error("No allowed file extensions configured")]
    EmptyAllowedExtensions,
    #[error("Invalid email from address: {0}")]
    InvalidFromAddress(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from `config.toml` under the given directory,
    /// falling back to defaults when the file does not exist.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            let mut config = Self::default();
            config.base_dir = config_dir.as_ref().to_path_buf();
            return Ok(config);
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
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gemini.validate()?;
        self.vector.validate()?;
        self.validate_documents()?;
        self.validate_chunking()?;
        self.validate_retrieval()?;
        self.validate_session()?;
        self.validate_email()?;
        Ok(())
    }

    fn validate_documents(&self) -> Result<(), ConfigError> {
        if self.documents.allowed_extensions.is_empty() {
            return Err(ConfigError::EmptyAllowedExtensions);
        }
        if !(1..=100).contains(&self.documents.max_file_size_mb) {
            return Err(ConfigError::InvalidFileSizeLimit(
                self.documents.max_file_size_mb,
            ));
        }
        for limit in self.documents.max_size_overrides_mb.values() {
            if !(1..=100).contains(limit) {
                return Err(ConfigError::InvalidFileSizeLimit(*limit));
            }
        }
        Ok(())
    }

    fn validate_chunking(&self) -> Result<(), ConfigError> {
        if !(100..=8000).contains(&self.chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::InvalidChunkOverlap(
                self.chunking.overlap,
                self.chunking.chunk_size,
            ));
        }
        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.retrieval.threshold) {
            return Err(ConfigError::InvalidThreshold(self.retrieval.threshold));
        }
        if !(1..=50).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }
        if !(1..=20).contains(&self.retrieval.max_context_chunks) {
            return Err(ConfigError::InvalidMaxContextChunks(
                self.retrieval.max_context_chunks,
            ));
        }
        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        if !(1..=1440).contains(&self.session.timeout_minutes) {
            return Err(ConfigError::InvalidSessionTimeout(
                self.session.timeout_minutes,
            ));
        }
        if !(1..=100).contains(&self.session.history_window) {
            return Err(ConfigError::InvalidHistoryWindow(
                self.session.history_window,
            ));
        }
        Ok(())
    }

    fn validate_email(&self) -> Result<(), ConfigError> {
        if self.email.enabled {
            Url::parse(&self.email.endpoint)
                .map_err(|_| ConfigError::InvalidUrl(self.email.endpoint.clone()))?;
            if !self.email.from_address.contains('@') {
                return Err(ConfigError::InvalidFromAddress(
                    self.email.from_address.clone(),
                ));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Path for the SQLite database holding sessions and analytics.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("ragchat.db")
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            vector: VectorConfig::default(),
            documents: DocumentsConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            session: SessionConfig::default(),
            email: EmailConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl GeminiConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.endpoint).map_err(|_| ConfigError::InvalidUrl(self.endpoint.clone()))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }
        if self.batch_size == 0 || self.batch_size > 100 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|_| ConfigError::InvalidUrl(self.endpoint.clone()))
    }

    /// Read the API key from the configured environment variable.
    #[inline]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

impl VectorConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            VectorProvider::Pinecone => {
                if self.pinecone.index_host.trim().is_empty() {
                    return Err(ConfigError::MissingVectorParams(
                        "pinecone".to_string(),
                        "index_host is required".to_string(),
                    ));
                }
                Url::parse(&self.pinecone.index_host)
                    .map_err(|_| ConfigError::InvalidUrl(self.pinecone.index_host.clone()))?;
            }
            VectorProvider::Qdrant => {
                Url::parse(&self.qdrant.url)
                    .map_err(|_| ConfigError::InvalidUrl(self.qdrant.url.clone()))?;
                if self.qdrant.collection.trim().is_empty() {
                    return Err(ConfigError::MissingVectorParams(
                        "qdrant".to_string(),
                        "collection is required".to_string(),
                    ));
                }
            }
            VectorProvider::Weaviate => {
                Url::parse(&self.weaviate.url)
                    .map_err(|_| ConfigError::InvalidUrl(self.weaviate.url.clone()))?;
                if self.weaviate.class_name.trim().is_empty() {
                    return Err(ConfigError::MissingVectorParams(
                        "weaviate".to_string(),
                        "class_name is required".to_string(),
                    ));
                }
            }
            VectorProvider::None => {}
        }
        Ok(())
    }
}
