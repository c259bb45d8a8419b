// Document ingestion: validation, per-format text extraction, and chunking.

#[cfg(test)]
mod tests;

pub mod chunking;
pub mod extract;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DocumentsConfig;
use crate::documents::chunking::{Chunk, ChunkingConfig, chunk_text};
use crate::documents::extract::{FileKind, extract_text};
use crate::{RagError, Result};

/// Metadata for an uploaded document. Immutable after creation except the
/// `vector_stored` flag, which flips once embeddings land in the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub id: String,
    pub session_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub upload_time: DateTime<Utc>,
    pub chunk_count: usize,
    pub vector_stored: bool,
}

/// Outcome of a successful upload: metadata plus extracted text and chunks.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub metadata: DocumentMetadata,
    pub text_content: String,
    pub chunks: Vec<Chunk>,
    /// False when extraction fell back to a placeholder; the document is
    /// still referenceable by name but carries no real content.
    pub extracted: bool,
}

/// Validates, extracts, and chunks uploaded files.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    documents: DocumentsConfig,
    chunking: ChunkingConfig,
}

impl DocumentProcessor {
    #[inline]
    pub fn new(documents: DocumentsConfig, chunking: ChunkingConfig) -> Self {
        Self {
            documents,
            chunking,
        }
    }

    /// Process an uploaded file into a chunked document.
    ///
    /// Validation failures (unsupported type, oversized file) return
    /// `RagError::Validation`. Extraction failures do not reject the upload:
    /// a descriptive placeholder is substituted so the document can still be
    /// referenced by name in conversation.
    #[inline]
    pub fn process_document(
        &self,
        file_name: &str,
        bytes: &[u8],
        session_id: &str,
    ) -> Result<ProcessedDocument> {
        let extension = self.validate(file_name, bytes.len() as u64)?;

        let document_id = Uuid::new_v4().to_string();
        debug!(
            "Processing document {} ({}, {} bytes) for session {}",
            file_name,
            extension,
            bytes.len(),
            session_id
        );

        let kind = FileKind::from_extension(&extension).ok_or_else(|| {
            RagError::Validation(format!("Unsupported file extension: .{}", extension))
        })?;

        let (text_content, extracted) = match extract_text(bytes, kind) {
            Ok(text) if !text.trim().is_empty() => (text, true),
            Ok(_) => {
                warn!("Extraction produced no text for {}", file_name);
                (placeholder_text(file_name, bytes.len() as u64), false)
            }
            Err(e) => {
                warn!("Extraction failed for {}: {}", file_name, e);
                (placeholder_text(file_name, bytes.len() as u64), false)
            }
        };

        let chunks = chunk_text(&document_id, &text_content, &self.chunking);

        let metadata = DocumentMetadata {
            id: document_id,
            session_id: session_id.to_string(),
            file_name: file_name.to_string(),
            file_type: extension,
            file_size: bytes.len() as u64,
            upload_time: Utc::now(),
            chunk_count: chunks.len(),
            vector_stored: false,
        };

        info!(
            "Processed document {} into {} chunks (extracted: {})",
            metadata.file_name,
            chunks.len(),
            extracted
        );

        Ok(ProcessedDocument {
            metadata,
            text_content,
            chunks,
            extracted,
        })
    }

    /// Check extension against the allow-list and size against the per-type
    /// limit. Returns the lowercase extension on success.
    fn validate(&self, file_name: &str, size: u64) -> Result<String> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        if extension.is_empty()
            || !self
                .documents
                .allowed_extensions
                .iter()
                .any(|allowed| allowed == &extension)
        {
            return Err(RagError::Validation(format!(
                "File type .{} is not supported. Allowed types: {}",
                extension,
                self.documents.allowed_extensions.join(", ")
            )));
        }

        let max_bytes = self.documents.max_bytes_for(&extension);
        if size > max_bytes {
            return Err(RagError::Validation(format!(
                "File {} is too large ({} bytes). Maximum for .{} files is {} MB",
                file_name,
                size,
                extension,
                max_bytes / (1024 * 1024)
            )));
        }

        Ok(extension)
    }
}

/// Placeholder content for documents whose text could not be extracted.
fn placeholder_text(file_name: &str, size: u64) -> String {
    format!(
        "Document '{}' ({} bytes) was uploaded but its text could not be extracted. \
         It can be referenced by name in conversation.",
        file_name, size
    )
}
