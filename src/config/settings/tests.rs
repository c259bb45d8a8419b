use super::*;
use tempfile::TempDir;

fn temp_config() -> (TempDir, Config) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.base_dir = dir.path().to_path_buf();
    (dir, config)
}

#[test]
fn default_config_is_valid() {
    let (_dir, config) = temp_config();
    assert!(config.validate().is_ok());
    assert_eq!(config.gemini.embedding_dimension, 768);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.overlap, 200);
    assert!((config.retrieval.threshold - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.session.timeout_minutes, 30);
    assert_eq!(config.vector.provider, VectorProvider::None);
}

#[test]
fn load_missing_file_returns_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config::load(dir.path()).expect("Load should succeed");
    assert_eq!(config.gemini.model, "gemini-1.5-flash");
    assert_eq!(config.base_dir, dir.path());
}

#[test]
fn save_and_reload_roundtrip() {
    let (dir, mut config) = temp_config();
    config.retrieval.top_k = 8;
    config.session.timeout_minutes = 45;
    config.vector.provider = VectorProvider::Qdrant;
    config.vector.qdrant.collection = "custom".to_string();
    config.save().expect("Save should succeed");

    let reloaded = Config::load(dir.path()).expect("Reload should succeed");
    assert_eq!(reloaded.retrieval.top_k, 8);
    assert_eq!(reloaded.session.timeout_minutes, 45);
    assert_eq!(reloaded.vector.provider, VectorProvider::Qdrant);
    assert_eq!(reloaded.vector.qdrant.collection, "custom");
}

#[test]
fn rejects_bad_threshold() {
    let (_dir, mut config) = temp_config();
    config.retrieval.threshold = 1.5;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidThreshold(_))
    ));
}

#[test]
fn rejects_overlap_not_smaller_than_chunk_size() {
    let (_dir, mut config) = temp_config();
    config.chunking.chunk_size = 500;
    config.chunking.overlap = 500;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkOverlap(500, 500))
    ));
}

#[test]
fn rejects_empty_allowed_extensions() {
    let (_dir, mut config) = temp_config();
    config.documents.allowed_extensions.clear();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::EmptyAllowedExtensions)
    ));
}

#[test]
fn pinecone_requires_index_host() {
    let (_dir, mut config) = temp_config();
    config.vector.provider = VectorProvider::Pinecone;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingVectorParams(provider, _)) if provider == "pinecone"
    ));
}

#[test]
fn qdrant_defaults_are_valid() {
    let (_dir, mut config) = temp_config();
    config.vector.provider = VectorProvider::Qdrant;
    assert!(config.validate().is_ok());
}

#[test]
fn rejects_zero_batch_size() {
    let (_dir, mut config) = temp_config();
    config.gemini.batch_size = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBatchSize(0))
    ));
}

#[test]
fn size_limit_overrides_apply_per_extension() {
    let documents = DocumentsConfig::default();
    assert_eq!(documents.max_bytes_for("png"), 5 * 1024 * 1024);
    assert_eq!(documents.max_bytes_for("pdf"), 10 * 1024 * 1024);
}

#[test]
fn email_validation_only_when_enabled() {
    let (_dir, mut config) = temp_config();
    config.email.from_address = "not-an-address".to_string();
    assert!(config.validate().is_ok());

    config.email.enabled = true;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidFromAddress(_))
    ));
}

#[test]
fn provider_serde_is_lowercase() {
    let toml = "provider = \"weaviate\"";
    let parsed: VectorConfig = toml::from_str(toml).expect("Parse should succeed");
    assert_eq!(parsed.provider, VectorProvider::Weaviate);
    assert_eq!(VectorProvider::Pinecone.to_string(), "pinecone");
}
