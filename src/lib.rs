use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Crate-wide error taxonomy. Leaf I/O failures are converted into one of
/// these variants at the component boundary; callers decide whether to retry,
/// degrade, or surface.
#[derive(Error, Debug)]
pub enum RagError {
    /// Bad input from the user: unsupported file type, oversized upload,
    /// missing required session fields. Surfaced immediately, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Text extraction failed for a specific format. Recoverable: the caller
    /// substitutes a placeholder document instead of rejecting the upload.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Vector backend unreachable or a query failed. Recoverable: RAG is
    /// disabled for the turn and generation proceeds without context.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The generation provider failed outright, including the fallback call.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Email delivery failed. Logged only; never blocks session completion.
    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Session is busy: {0}")]
    SessionBusy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod analytics;
pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod email;
pub mod gemini;
pub mod rag;
pub mod sessions;
pub mod vector;
pub mod voice;
