use super::*;
use crate::config::{GeminiConfig, VectorProvider};
use std::sync::Mutex;

fn test_embedder() -> GeminiClient {
    GeminiClient::with_api_key(&GeminiConfig::default(), "test-key".to_string()).unwrap()
}

fn payload(n: usize) -> ChunkPayload {
    ChunkPayload {
        chunk_id: format!("doc_chunk_{}", n),
        document_id: "doc".to_string(),
        session_id: "session".to_string(),
        file_name: "notes.md".to_string(),
        chunk_index: n,
        text: format!("chunk {}", n),
    }
}

fn scored(n: usize, score: f32) -> ScoredMatch {
    ScoredMatch {
        id: format!("doc_chunk_{}", n),
        score,
        payload: payload(n),
    }
}

/// Records calls so orchestration can be verified without a live store.
#[derive(Default)]
struct RecordingBackend {
    deleted: Mutex<Vec<String>>,
    fail_initialize: bool,
}

impl VectorBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn initialize(&self) -> Result<()> {
        if self.fail_initialize {
            return Err(RagError::Retrieval("connection refused".to_string()));
        }
        Ok(())
    }

    fn upsert(&self, _records: &[VectorRecord]) -> Result<()> {
        Ok(())
    }

    fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _session_id: Option<&str>,
    ) -> Result<Vec<ScoredMatch>> {
        Ok(vec![])
    }

    fn delete_by_document(&self, document_id: &str) -> Result<()> {
        self.deleted
            .lock()
            .map_err(|_| RagError::Retrieval("lock poisoned".to_string()))?
            .push(document_id.to_string());
        Ok(())
    }

    fn stats(&self) -> Result<BackendStats> {
        Ok(BackendStats {
            total_vectors: 42,
            dimension: 768,
        })
    }
}

#[test]
fn rank_matches_filters_below_threshold_and_sorts_descending() {
    let mut matches = vec![scored(0, 0.65), scored(1, 0.91), scored(2, 0.73)];
    rank_matches(&mut matches, 0.7);

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "doc_chunk_1");
    assert_eq!(matches[1].id, "doc_chunk_2");
}

#[test]
fn rank_matches_keeps_exact_threshold() {
    let mut matches = vec![scored(0, 0.7)];
    rank_matches(&mut matches, 0.7);
    assert_eq!(matches.len(), 1);
}

#[test]
fn chunk_payload_roundtrips_through_json() {
    let original = payload(3);
    let json = serde_json::to_string(&original).unwrap();
    let restored: ChunkPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, original);
}

#[test]
fn none_provider_yields_disabled_index() {
    let mut config = crate::config::Config::default();
    config.vector.provider = VectorProvider::None;

    let index = VectorIndex::from_config(&config, test_embedder()).unwrap();
    index.initialize().unwrap();

    assert!(!index.is_available());
    let err = index
        .search_similar("hello", &index.default_search_options(None))
        .unwrap_err();
    assert!(matches!(err, RagError::Retrieval(_)));
}

#[test]
fn failed_initialization_marks_index_unavailable() {
    let backend = RecordingBackend {
        fail_initialize: true,
        ..Default::default()
    };
    let index = VectorIndex::with_backend(
        Box::new(backend),
        test_embedder(),
        crate::config::RetrievalConfig::default(),
    );

    assert!(index.initialize().is_err());
    assert!(!index.is_available());
}

#[test]
fn successful_initialization_marks_index_available() {
    let index = VectorIndex::with_backend(
        Box::new(RecordingBackend::default()),
        test_embedder(),
        crate::config::RetrievalConfig::default(),
    );

    index.initialize().unwrap();
    assert!(index.is_available());
}

#[test]
fn delete_document_forwards_to_backend() {
    let index = VectorIndex::with_backend(
        Box::new(RecordingBackend::default()),
        test_embedder(),
        crate::config::RetrievalConfig::default(),
    );
    index.force_available(true);

    index.delete_document("doc-123").unwrap();
    index.delete_document("doc-456").unwrap();

    let stats = index.stats().unwrap();
    assert_eq!(stats.total_vectors, 42);
}

#[test]
fn empty_document_stores_no_vectors() {
    let index = VectorIndex::with_backend(
        Box::new(RecordingBackend::default()),
        test_embedder(),
        crate::config::RetrievalConfig::default(),
    );
    index.force_available(true);

    let metadata = crate::documents::DocumentMetadata {
        id: "doc-empty".to_string(),
        session_id: "s1".to_string(),
        file_name: "empty.txt".to_string(),
        file_type: "txt".to_string(),
        file_size: 0,
        upload_time: chrono::Utc::now(),
        chunk_count: 0,
        vector_stored: false,
    };
    let stored = index.store_document_chunks(&metadata, &[]).unwrap();
    assert_eq!(stored, 0);
}

#[test]
fn default_search_options_come_from_retrieval_config() {
    let retrieval = crate::config::RetrievalConfig {
        top_k: 8,
        threshold: 0.55,
        max_context_chunks: 4,
    };
    let index = VectorIndex::with_backend(
        Box::new(RecordingBackend::default()),
        test_embedder(),
        retrieval,
    );

    let options = index.default_search_options(Some("s1".to_string()));
    assert_eq!(options.top_k, 8);
    assert!((options.threshold - 0.55).abs() < f32::EPSILON);
    assert_eq!(options.session_id.as_deref(), Some("s1"));
}
