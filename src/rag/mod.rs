//! The conversation orchestrator: gates chat behind user info collection,
//! retrieves relevant document chunks when possible, assembles the prompt,
//! generates the response with graceful degradation, and records the
//! transcript and analytics trail.


use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analytics::Analytics;
use crate::config::Config;
use crate::database::Database;
use crate::database::models::{DocumentRow, InteractionRole, Session};
use crate::documents::DocumentProcessor;
use crate::email::EmailClient;
use crate::gemini::{ChatTurn, GeminiClient};
use crate::sessions::{SessionManager, UserInfo};
use crate::vector::{ScoredMatch, VectorIndex};
use crate::{RagError, Result};

const SNIPPET_CHARS: usize = 150;

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub use_rag: bool,
    /// Cap on context chunks for this message; defaults to the configured
    /// context limit.
    pub max_context_chunks: Option<usize>,
    pub include_history: bool,
}

impl Default for ChatOptions {
    #[inline]
    fn default() -> Self {
        Self {
            use_rag: true,
            max_context_chunks: None,
            include_history: true,
        }
    }
}

/// A document that informed a response, with a short redacted preview
/// rather than full chunk text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub document_id: String,
    pub file_name: String,
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: String,
    pub response: String,
    pub rag_used: bool,
    pub relevant_documents: Vec<DocumentRef>,
}

pub struct RagEngine {
    sessions: SessionManager,
    vectors: VectorIndex,
    gemini: GeminiClient,
    analytics: Analytics,
    processor: DocumentProcessor,
    email: Option<EmailClient>,
    db: Database,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes the session from the in-flight set when the request finishes,
/// however it finishes.
#[derive(Debug)]
struct FlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.session_id);
        }
    }
}

impl RagEngine {
    #[inline]
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let gemini = GeminiClient::new(&config.gemini)
            .map_err(|e| RagError::Config(e.to_string()))?;
        let embedder = GeminiClient::new(&config.gemini)
            .map_err(|e| RagError::Config(e.to_string()))?;

        let email = if config.email.enabled {
            match EmailClient::new(&config.email) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("Email disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self::with_components(
            config,
            db,
            gemini,
            VectorIndex::from_config(config, embedder)?,
            email,
        ))
    }

    /// Assemble from pre-built components. Lets tests substitute clients
    /// pointed at local mock servers.
    #[inline]
    pub fn with_components(
        config: &Config,
        db: Database,
        gemini: GeminiClient,
        vectors: VectorIndex,
        email: Option<EmailClient>,
    ) -> Self {
        Self {
            sessions: SessionManager::new(db.clone(), config.session.clone()),
            vectors,
            gemini,
            analytics: Analytics::new(db.clone()),
            processor: DocumentProcessor::new(
                config.documents.clone(),
                config.chunking.clone(),
            ),
            email,
            db,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Initialize the vector backend. Failure leaves retrieval disabled but
    /// the engine fully usable for plain generation.
    #[inline]
    pub fn initialize_vectors(&self) {
        if let Err(e) = self.vectors.initialize() {
            warn!("Continuing without retrieval: {}", e);
        }
    }

    #[inline]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[inline]
    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    #[inline]
    pub fn vectors(&self) -> &VectorIndex {
        &self.vectors
    }

    /// Handle one chat message end to end.
    ///
    /// Degradation ladder: retrieval errors or empty results fall back to
    /// the bare message; a failed contextual generation gets one plain
    /// retry without context; only when that also fails does the call
    /// error. One message per session at a time.
    #[inline]
    pub async fn chat(
        &self,
        session_id: &str,
        message: &str,
        options: &ChatOptions,
    ) -> Result<ChatOutcome> {
        if message.trim().is_empty() {
            return Err(RagError::Validation("Message cannot be empty".to_string()));
        }

        let _guard = self.claim_session(session_id)?;

        let session = self.sessions.ensure_active(session_id).await?;
        if self.sessions.is_user_info_required(&session) {
            return Err(RagError::Validation(
                "User info must be collected before chatting".to_string(),
            ));
        }

        // Snapshot history before recording the new message so the prompt
        // does not contain it twice.
        let history = if options.include_history {
            self.sessions.conversation_history(session_id).await?
        } else {
            Vec::new()
        };

        self.sessions
            .record_interaction(session_id, InteractionRole::User, message, false, vec![])
            .await?;

        let matches = if options.use_rag {
            self.retrieve_context(&session, message, options).await
        } else {
            Vec::new()
        };
        let rag_used = !matches.is_empty();

        let prompt = if rag_used {
            build_prompt(message, &matches)
        } else {
            message.to_string()
        };

        let started = Instant::now();
        let response = self.generate(&prompt, &history, message, rag_used).await;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let response = match response {
            Ok(text) => {
                self.analytics
                    .track_ai_performance(session_id, elapsed_ms, true)
                    .await?;
                text
            }
            Err(e) => {
                self.analytics
                    .track_ai_performance(session_id, elapsed_ms, false)
                    .await?;
                return Err(e);
            }
        };

        let referenced: Vec<String> = dedup_document_ids(&matches);
        self.sessions
            .record_interaction(
                session_id,
                InteractionRole::Assistant,
                &response,
                rag_used,
                referenced.clone(),
            )
            .await?;
        self.analytics
            .track_conversation(session_id, rag_used)
            .await?;

        info!(
            "Chat turn complete for session {} (rag: {}, {} ms)",
            session_id, rag_used, elapsed_ms
        );

        Ok(ChatOutcome {
            session_id: session_id.to_string(),
            response,
            rag_used,
            relevant_documents: document_refs(&matches),
        })
    }

    /// Ingest an uploaded file: validate, extract, chunk, persist, and
    /// store vectors when the backend is up.
    #[inline]
    pub async fn upload_document(
        &self,
        session_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<DocumentRow> {
        self.sessions.ensure_active(session_id).await?;

        let processed = self
            .processor
            .process_document(file_name, bytes, session_id)?;

        // The row is persisted before the vector write so a storage failure
        // still leaves the document registered.
        let mut row = DocumentRow {
            id: processed.metadata.id.clone(),
            session_id: session_id.to_string(),
            file_name: processed.metadata.file_name.clone(),
            file_type: processed.metadata.file_type.clone(),
            file_size: processed.metadata.file_size as i64,
            chunk_count: processed.chunks.len() as i64,
            vector_stored: false,
            extracted: processed.extracted,
            upload_time: processed.metadata.upload_time.naive_utc(),
        };
        self.db.insert_document(&row).await?;

        if self.vectors.is_available() && !processed.chunks.is_empty() {
            match self
                .vectors
                .store_document_chunks(&processed.metadata, &processed.chunks)
            {
                Ok(count) => {
                    debug!("Stored {} vectors for {}", count, file_name);
                    self.db.mark_document_vector_stored(&row.id).await?;
                    row.vector_stored = true;
                }
                Err(e) => {
                    warn!("Vector storage failed for {}: {}", file_name, e);
                }
            }
        }
        self.sessions
            .record_interaction(
                session_id,
                InteractionRole::User,
                &format!("[Uploaded document: {}]", file_name),
                false,
                vec![row.id.clone()],
            )
            .await?;
        self.analytics
            .track_engagement(session_id, "document_upload")
            .await?;

        info!(
            "Document {} uploaded to session {} ({} chunks, vectors: {})",
            file_name, session_id, row.chunk_count, row.vector_stored
        );
        Ok(row)
    }

    /// Remove a document and its vectors. The vectors go first so a partial
    /// failure leaves the row behind as evidence.
    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        let row = self
            .db
            .get_document(document_id)
            .await?
            .ok_or_else(|| {
                RagError::Validation(format!("Unknown document: {}", document_id))
            })?;

        if row.vector_stored && self.vectors.is_available() {
            self.vectors.delete_document(document_id)?;
        }

        self.db.delete_document(document_id).await?;
        info!("Deleted document {} ({})", document_id, row.file_name);
        Ok(())
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<DocumentRow>> {
        Ok(self.db.list_documents().await?)
    }

    #[inline]
    pub async fn session_documents(&self, session_id: &str) -> Result<Vec<DocumentRow>> {
        Ok(self.db.session_documents(session_id).await?)
    }

    #[inline]
    pub async fn end_session(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .end_session(session_id, &self.gemini, self.email.as_ref())
            .await
    }

    fn claim_session(&self, session_id: &str) -> Result<FlightGuard<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| RagError::Other(anyhow::anyhow!("In-flight lock poisoned")))?;
        if !set.insert(session_id.to_string()) {
            return Err(RagError::SessionBusy(session_id.to_string()));
        }
        Ok(FlightGuard {
            set: &self.in_flight,
            session_id: session_id.to_string(),
        })
    }

    /// Retrieval never fails the chat; any problem collapses to "no
    /// context found".
    async fn retrieve_context(
        &self,
        session: &Session,
        message: &str,
        options: &ChatOptions,
    ) -> Vec<ScoredMatch> {
        if !self.vectors.is_available() {
            debug!("Vector backend unavailable; skipping retrieval");
            return Vec::new();
        }

        let has_documents = match self.db.session_documents(&session.id).await {
            Ok(rows) => rows.iter().any(|d| d.vector_stored),
            Err(e) => {
                warn!("Failed to check session documents: {}", e);
                false
            }
        };
        if !has_documents {
            return Vec::new();
        }

        let search = self
            .vectors
            .default_search_options(Some(session.id.clone()));
        let cap = options
            .max_context_chunks
            .unwrap_or_else(|| self.vectors.max_context_chunks())
            .min(search.top_k);

        match self.vectors.search_similar(message, &search) {
            Ok(mut matches) => {
                matches.truncate(cap);
                matches
            }
            Err(e) => {
                warn!("Retrieval failed, continuing without context: {}", e);
                Vec::new()
            }
        }
    }

    /// Contextual generation with one plain retry on failure.
    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatTurn],
        original_message: &str,
        rag_used: bool,
    ) -> Result<String> {
        match self.gemini.generate_with_history(prompt, history) {
            Ok(text) => Ok(text),
            Err(first) => {
                warn!("Generation failed: {}; retrying without context", first);
                if !rag_used && history.is_empty() {
                    // The failed attempt was already the bare message.
                    return Err(RagError::Generation(first.to_string()));
                }
                self.gemini
                    .generate_text(original_message)
                    .map_err(|second| {
                        RagError::Generation(format!(
                            "Generation failed twice: {}; retry: {}",
                            first, second
                        ))
                    })
            }
        }
    }

    // Convenience pass-throughs used by the CLI.
    #[inline]
    pub async fn create_session(&self) -> Result<Session> {
        self.sessions.create_session().await
    }

    #[inline]
    pub async fn collect_user_info(&self, session_id: &str, info: UserInfo) -> Result<Session> {
        self.sessions.collect_user_info(session_id, info).await
    }
}

fn build_prompt(message: &str, matches: &[ScoredMatch]) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant answering questions about the user's documents. \
         Use the excerpts below when they are relevant; if they do not cover the \
         question, say so and answer from general knowledge.\n\n",
    );
    for item in matches {
        prompt.push_str(&format!(
            "--- Excerpt from {} ---\n{}\n\n",
            item.payload.file_name, item.payload.text
        ));
    }
    prompt.push_str(&format!("Question: {}", message));
    prompt
}

fn dedup_document_ids(matches: &[ScoredMatch]) -> Vec<String> {
    matches
        .iter()
        .map(|m| m.payload.document_id.clone())
        .unique()
        .collect()
}

/// One entry per document, previewing the best-scoring chunk, truncated on
/// a character boundary.
fn document_refs(matches: &[ScoredMatch]) -> Vec<DocumentRef> {
    let mut seen = HashSet::new();
    matches
        .iter()
        .filter(|m| seen.insert(m.payload.document_id.clone()))
        .map(|m| DocumentRef {
            document_id: m.payload.document_id.clone(),
            file_name: m.payload.file_name.clone(),
            snippet: truncate_chars(&m.payload.text, SNIPPET_CHARS),
        })
        .collect()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}...", cut.trim_end())
}
