// Configuration management: TOML settings plus the interactive setup flow.

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, DocumentsConfig, EmailConfig, GeminiConfig, PineconeConfig, QdrantConfig,
    RetrievalConfig, SessionConfig, VectorConfig, VectorProvider, WeaviateConfig,
};

/// Resolve the default base directory for config and local databases.
#[inline]
pub fn default_base_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("ragchat"))
        .ok_or(ConfigError::DirectoryError)
}
