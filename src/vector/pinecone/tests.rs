use super::*;
use serde_json::json;

#[test]
fn parses_match_with_full_metadata() {
    let value = json!({
        "id": "doc_chunk_0",
        "score": 0.87,
        "metadata": {
            "chunk_id": "doc_chunk_0",
            "document_id": "doc-1",
            "session_id": "s1",
            "file_name": "report.pdf",
            "chunk_index": 0,
            "text": "quarterly results",
        }
    });

    let parsed = parse_match(&value).unwrap();
    assert_eq!(parsed.id, "doc_chunk_0");
    assert!((parsed.score - 0.87).abs() < 1e-6);
    assert_eq!(parsed.payload.document_id, "doc-1");
    assert_eq!(parsed.payload.text, "quarterly results");
}

#[test]
fn skips_match_without_document_id() {
    let value = json!({
        "id": "orphan",
        "score": 0.9,
        "metadata": { "text": "no provenance" }
    });
    assert!(parse_match(&value).is_none());
}

#[test]
fn skips_match_without_score() {
    let value = json!({
        "id": "doc_chunk_0",
        "metadata": { "document_id": "doc-1" }
    });
    assert!(parse_match(&value).is_none());
}

#[test]
fn constructor_requires_api_key() {
    let config = crate::config::PineconeConfig {
        index_host: "https://idx.example.pinecone.io".to_string(),
        api_key_env: "RAGCHAT_TEST_MISSING_PINECONE_KEY".to_string(),
        namespace: "test".to_string(),
    };
    assert!(PineconeBackend::new(&config).is_err());
}
