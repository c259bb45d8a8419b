// Vector store adapter: one of several interchangeable backends behind a
// single trait, with embedding generation in front of every store and query.

#[cfg(test)]
mod tests;

pub mod pinecone;
pub mod qdrant;
mod transport;
pub mod weaviate;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::config::{Config, RetrievalConfig, VectorProvider};
use crate::documents::DocumentMetadata;
use crate::documents::chunking::Chunk;
use crate::gemini::GeminiClient;
use crate::{RagError, Result};

/// Backends cap bulk upserts; larger uploads are split into groups.
const UPSERT_BATCH_LIMIT: usize = 100;

/// Metadata stored alongside every vector, returned with each match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub chunk_id: String,
    pub document_id: String,
    pub session_id: String,
    pub file_name: String,
    pub chunk_index: usize,
    pub text: String,
}

/// A vector ready for storage.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub payload: ChunkPayload,
}

/// One scored result from a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub id: String,
    /// Cosine similarity in [0, 1] after threshold filtering.
    pub score: f32,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendStats {
    pub total_vectors: u64,
    pub dimension: u32,
}

/// Common shape of the supported vector databases. Implementations differ
/// only in wire format; the orchestrator never branches on provider identity.
pub trait VectorBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Verify connectivity and ensure the target collection/index exists.
    fn initialize(&self) -> Result<()>;

    /// Store vectors; `records` is already capped at the batch limit.
    fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Nearest-neighbor query, optionally restricted to one session's
    /// documents. Scores are the backend's native cosine similarity.
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<ScoredMatch>>;

    /// Remove every vector whose metadata names this document. Filter-based
    /// so partial storage failures cannot strand vectors.
    fn delete_by_document(&self, document_id: &str) -> Result<()>;

    fn stats(&self) -> Result<BackendStats>;
}

/// Options for a similarity search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub threshold: f32,
    pub session_id: Option<String>,
}

/// The adapter the RAG orchestrator talks to: embeds text via Gemini before
/// every store or query, delegates vector operations to the active backend,
/// and tracks whether the backend is usable at all.
pub struct VectorIndex {
    backend: Option<Box<dyn VectorBackend>>,
    embedder: GeminiClient,
    retrieval: RetrievalConfig,
    available: AtomicBool,
}

impl VectorIndex {
    /// Select the backend once from configuration. `None` yields a disabled
    /// index that reports unavailable rather than erroring.
    #[inline]
    pub fn from_config(config: &Config, embedder: GeminiClient) -> Result<Self> {
        let dimension = config.gemini.embedding_dimension;
        let backend: Option<Box<dyn VectorBackend>> = match config.vector.provider {
            VectorProvider::Pinecone => Some(Box::new(pinecone::PineconeBackend::new(
                &config.vector.pinecone,
            )?)),
            VectorProvider::Qdrant => Some(Box::new(qdrant::QdrantBackend::new(
                &config.vector.qdrant,
                dimension,
            )?)),
            VectorProvider::Weaviate => Some(Box::new(weaviate::WeaviateBackend::new(
                &config.vector.weaviate,
            )?)),
            VectorProvider::None => None,
        };

        Ok(Self {
            backend,
            embedder,
            retrieval: config.retrieval.clone(),
            available: AtomicBool::new(false),
        })
    }

    /// Build directly from a backend, used by tests and embedders-in-tests.
    #[inline]
    pub fn with_backend(
        backend: Box<dyn VectorBackend>,
        embedder: GeminiClient,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            backend: Some(backend),
            embedder,
            retrieval,
            available: AtomicBool::new(false),
        }
    }

    /// Initialize the active backend. A failure leaves the index marked
    /// unavailable so callers degrade to non-RAG generation instead of
    /// mistaking it for "no relevant documents".
    #[inline]
    pub fn initialize(&self) -> Result<()> {
        let Some(backend) = self.backend.as_deref() else {
            info!("No vector backend configured; retrieval disabled");
            self.available.store(false, Ordering::SeqCst);
            return Ok(());
        };

        match backend.initialize() {
            Ok(()) => {
                info!("Vector backend {} initialized", backend.name());
                self.available.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                warn!("Vector backend {} unavailable: {}", backend.name(), e);
                self.available.store(false, Ordering::SeqCst);
                Err(RagError::Retrieval(format!(
                    "Backend {} initialization failed: {}",
                    backend.name(),
                    e
                )))
            }
        }
    }

    /// Whether the backend initialized successfully and can serve queries.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Embed a document's chunks and store them, respecting the backend's
    /// batch cap. Returns the number of vectors written.
    #[inline]
    pub fn store_document_chunks(
        &self,
        metadata: &DocumentMetadata,
        chunks: &[Chunk],
    ) -> Result<usize> {
        let backend = self.require_backend()?;
        if chunks.is_empty() {
            return Ok(0);
        }

        debug!(
            "Embedding {} chunks of document {}",
            chunks.len(),
            metadata.id
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| RagError::Retrieval(format!("Embedding generation failed: {}", e)))?;

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorRecord {
                id: chunk.id.clone(),
                values,
                payload: ChunkPayload {
                    chunk_id: chunk.id.clone(),
                    document_id: metadata.id.clone(),
                    session_id: metadata.session_id.clone(),
                    file_name: metadata.file_name.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                },
            })
            .collect();

        for batch in records.chunks(UPSERT_BATCH_LIMIT) {
            backend.upsert(batch)?;
        }

        info!(
            "Stored {} vectors for document {} in {}",
            records.len(),
            metadata.id,
            backend.name()
        );
        Ok(records.len())
    }

    /// Embed the query text once and search, applying the similarity
    /// threshold as a post-filter and sorting by descending score.
    #[inline]
    pub fn search_similar(&self, query: &str, options: &SearchOptions) -> Result<Vec<ScoredMatch>> {
        let backend = self.require_backend()?;

        let query_vector = self
            .embedder
            .embed_text(query)
            .map_err(|e| RagError::Retrieval(format!("Query embedding failed: {}", e)))?;

        let mut matches = backend.query(
            &query_vector,
            options.top_k,
            options.session_id.as_deref(),
        )?;

        rank_matches(&mut matches, options.threshold);

        debug!(
            "Search returned {} matches above threshold {}",
            matches.len(),
            options.threshold
        );
        Ok(matches)
    }

    #[inline]
    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        let backend = self.require_backend()?;
        backend.delete_by_document(document_id)?;
        info!("Deleted vectors for document {}", document_id);
        Ok(())
    }

    #[inline]
    pub fn stats(&self) -> Result<BackendStats> {
        self.require_backend()?.stats()
    }

    /// Default search options from the retrieval configuration.
    #[inline]
    pub fn default_search_options(&self, session_id: Option<String>) -> SearchOptions {
        SearchOptions {
            top_k: self.retrieval.top_k,
            threshold: self.retrieval.threshold,
            session_id,
        }
    }

    /// Configured ceiling on chunks handed to prompt assembly.
    #[inline]
    pub fn max_context_chunks(&self) -> usize {
        self.retrieval.max_context_chunks
    }

    /// Swap availability for tests of degraded-mode behavior.
    #[cfg(test)]
    fn force_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn require_backend(&self) -> Result<&dyn VectorBackend> {
        if !self.is_available() {
            return Err(RagError::Retrieval(
                "Vector backend is not available".to_string(),
            ));
        }
        self.backend.as_deref().ok_or_else(|| {
            RagError::Retrieval("No vector backend configured".to_string())
        })
    }
}

/// Drop matches below the similarity threshold and order the rest by
/// descending score.
fn rank_matches(matches: &mut Vec<ScoredMatch>, threshold: f32) {
    matches.retain(|m| m.score >= threshold);
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
