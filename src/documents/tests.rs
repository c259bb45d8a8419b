use super::*;

fn processor() -> DocumentProcessor {
    DocumentProcessor::new(DocumentsConfig::default(), ChunkingConfig::default())
}

#[test]
fn plain_text_upload_is_processed() {
    let result = processor()
        .process_document("notes.txt", b"Some meeting notes about the refund policy.", "session1")
        .expect("processing should succeed");

    assert_eq!(result.metadata.file_name, "notes.txt");
    assert_eq!(result.metadata.file_type, "txt");
    assert_eq!(result.metadata.session_id, "session1");
    assert_eq!(result.metadata.chunk_count, result.chunks.len());
    assert!(!result.metadata.vector_stored);
    assert!(result.extracted);
    assert_eq!(result.chunks.len(), 1);
}

#[test]
fn unsupported_extension_is_rejected_with_allowed_list() {
    let err = processor()
        .process_document("malware.exe", b"MZ", "session1")
        .unwrap_err();

    assert!(matches!(err, RagError::Validation(_)));
    let message = err.to_string();
    assert!(message.contains(".exe"));
    assert!(message.contains("txt"));
    assert!(message.contains("pdf"));
}

#[test]
fn missing_extension_is_rejected() {
    let err = processor()
        .process_document("README", b"no extension", "session1")
        .unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
}

#[test]
fn oversized_file_is_rejected_not_truncated() {
    let config = DocumentsConfig {
        max_file_size_mb: 1,
        ..DocumentsConfig::default()
    };
    let processor = DocumentProcessor::new(config, ChunkingConfig::default());
    let big = vec![b'a'; 2 * 1024 * 1024];

    let err = processor
        .process_document("big.txt", &big, "session1")
        .unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    assert!(err.to_string().contains("too large"));
}

#[test]
fn extraction_failure_substitutes_placeholder() {
    // Garbage PDF bytes: extraction fails but the upload is accepted.
    let result = processor()
        .process_document("broken.pdf", b"not really a pdf", "session1")
        .expect("processing should still succeed");

    assert!(!result.extracted);
    assert!(result.text_content.contains("broken.pdf"));
    assert!(result.text_content.contains("16 bytes"));
    assert!(!result.chunks.is_empty());
}

#[test]
fn image_upload_takes_placeholder_path() {
    let result = processor()
        .process_document("scan.png", &[0x89, 0x50, 0x4e, 0x47], "session1")
        .expect("processing should succeed");

    assert!(!result.extracted);
    assert!(result.text_content.contains("scan.png"));
}

#[test]
fn chunk_ids_derive_from_document_id() {
    let text = "word ".repeat(600);
    let result = processor()
        .process_document("long.txt", text.as_bytes(), "session1")
        .expect("processing should succeed");

    assert!(result.chunks.len() > 1);
    for chunk in &result.chunks {
        assert!(chunk.id.starts_with(&result.metadata.id));
        assert_eq!(chunk.document_id, result.metadata.id);
    }
}

#[test]
fn extension_check_is_case_insensitive() {
    let result = processor()
        .process_document("NOTES.TXT", b"uppercase name", "session1")
        .expect("processing should succeed");
    assert_eq!(result.metadata.file_type, "txt");
}
