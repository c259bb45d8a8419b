use anyhow::Context;
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::analytics::Analytics;
use crate::config::Config;
use crate::database::Database;
use crate::database::models::SessionStatus;
use crate::rag::{ChatOptions, RagEngine};
use crate::sessions::UserInfo;
use crate::voice::{NullSynthesizer, ScriptedRecognizer, VoiceBridge, VoiceOptions};
use crate::{RagError, Result};

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} thinking...") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

async fn build_engine(config_dir: &Path) -> Result<RagEngine> {
    let config = Config::load(config_dir).map_err(|e| RagError::Config(e.to_string()))?;
    config
        .validate()
        .map_err(|e| RagError::Config(e.to_string()))?;

    let database = Database::initialize_from_config_dir(config_dir)
        .await
        .map_err(RagError::Other)?;

    let engine = RagEngine::new(&config, database)?;
    engine.initialize_vectors();
    Ok(engine)
}

async fn resolve_session(engine: &RagEngine, session: Option<String>) -> Result<String> {
    match session {
        Some(id) => {
            let session = engine.sessions().ensure_active(&id).await?;
            println!("Resuming session {}", session.id);
            Ok(session.id)
        }
        None => {
            let session = engine.create_session().await?;
            println!("Started session {}", style(&session.id).cyan());
            Ok(session.id)
        }
    }
}

/// Prompt for any user details the session still needs.
async fn collect_user_info_interactive(engine: &RagEngine, session_id: &str) -> Result<()> {
    let session = engine.sessions().ensure_active(session_id).await?;
    if !engine.sessions().is_user_info_required(&session) {
        return Ok(());
    }

    println!("{}", style("Before we start, a few details:").bold());
    let name: String = Input::new()
        .with_prompt("Your name")
        .interact_text()
        .context("Failed to read name")
        .map_err(RagError::Other)?;
    let email: String = Input::new()
        .with_prompt("Your email")
        .interact_text()
        .context("Failed to read email")
        .map_err(RagError::Other)?;
    let purpose: String = Input::new()
        .with_prompt("What brings you here")
        .interact_text()
        .context("Failed to read purpose")
        .map_err(RagError::Other)?;

    engine
        .collect_user_info(
            session_id,
            UserInfo {
                name: Some(name),
                email: Some(email),
                purpose: Some(purpose),
            },
        )
        .await?;
    println!("Thanks, you are all set.\n");
    Ok(())
}

/// Interactive chat loop. `/quit` ends the session; everything else is a
/// message.
#[inline]
pub async fn run_chat(
    config_dir: &Path,
    session: Option<String>,
    no_rag: bool,
    voice: bool,
) -> Result<()> {
    let engine = build_engine(config_dir).await?;
    let session_id = resolve_session(&engine, session).await?;
    collect_user_info_interactive(&engine, &session_id).await?;

    if voice {
        return run_voice_chat(&engine, &session_id).await;
    }

    let options = ChatOptions {
        use_rag: !no_rag,
        ..ChatOptions::default()
    };

    println!("Type your message, or /quit to end the session.\n");
    loop {
        let line: String = Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read message")
            .map_err(RagError::Other)?;
        let message = line.trim();

        if message.is_empty() {
            continue;
        }
        if message == "/quit" {
            break;
        }

        let spinner = thinking_spinner();
        let outcome = engine.chat(&session_id, message, &options).await;
        spinner.finish_and_clear();

        match outcome {
            Ok(outcome) => {
                println!("{} {}", style("assistant:").green().bold(), outcome.response);
                if outcome.rag_used {
                    for doc in &outcome.relevant_documents {
                        println!(
                            "  {} {} — {}",
                            style("source:").dim(),
                            style(&doc.file_name).dim().italic(),
                            style(&doc.snippet).dim()
                        );
                    }
                }
                println!();
            }
            Err(e) => {
                if !matches!(&e, RagError::SessionBusy(_)) {
                    warn!("Chat turn failed: {}", e);
                }
                println!("{}", chat_failure_line(&e));
            }
        }
    }

    let ended = engine.end_session(&session_id).await?;
    println!("Session {} ended.", ended.id);
    if let Some(summary) = ended.summary {
        println!("{} {}", style("summary:").bold(), summary);
    }
    Ok(())
}

/// One printed line per failed chat turn. Generation failures show a generic
/// apology; the underlying error stays in the log.
fn chat_failure_line(error: &RagError) -> String {
    match error {
        RagError::SessionBusy(_) => {
            "Still working on the previous message, try again.".to_string()
        }
        RagError::Generation(_) => "Sorry, I could not process that. Please try again.".to_string(),
        e => format!("{} {}", style("error:").red(), e),
    }
}

/// Voice mode without an audio stack: stdin lines play the role of final
/// transcripts and responses are printed instead of spoken.
async fn run_voice_chat(engine: &RagEngine, session_id: &str) -> Result<()> {
    println!("Voice mode: each line is treated as a spoken utterance (EOF ends).\n");

    let utterances: Vec<String> = std::io::stdin()
        .lock()
        .lines()
        .map_while(|line| line.ok())
        .filter(|line| !line.trim().is_empty())
        .collect();

    let recognizer = ScriptedRecognizer::new(utterances);
    let synthesizer = NullSynthesizer;
    let bridge = VoiceBridge::new(engine, VoiceOptions::default());
    let exchanges = bridge.run(session_id, &recognizer, &synthesizer).await?;

    println!("Voice session handled {} exchanges.", exchanges);
    let ended = engine.end_session(session_id).await?;
    println!("Session {} ended.", ended.id);
    Ok(())
}

#[inline]
pub async fn upload_document(
    config_dir: &Path,
    file: PathBuf,
    session: Option<String>,
) -> Result<()> {
    let engine = build_engine(config_dir).await?;
    let session_id = resolve_session(&engine, session).await?;

    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RagError::Validation(format!("Invalid file path: {}", file.display())))?
        .to_string();
    let bytes = std::fs::read(&file)
        .with_context(|| format!("Failed to read {}", file.display()))
        .map_err(RagError::Other)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Processing {}", file_name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let row = engine.upload_document(&session_id, &file_name, &bytes).await;
    spinner.finish_and_clear();

    let row = row?;
    println!("Uploaded {} ({} bytes)", row.file_name, row.file_size);
    println!("  Document ID: {}", row.id);
    println!("  Chunks: {}", row.chunk_count);
    if !row.extracted {
        println!(
            "  {}",
            style("Text extraction failed; stored as a placeholder.").yellow()
        );
    }
    if row.vector_stored {
        println!("  Vectors stored for retrieval.");
    } else {
        println!(
            "  {}",
            style("Vectors not stored; retrieval will not see this document.").yellow()
        );
    }
    Ok(())
}

#[inline]
pub async fn list_documents(config_dir: &Path, session: Option<&str>) -> Result<()> {
    let engine = build_engine(config_dir).await?;
    let documents = match session {
        Some(session_id) => engine.session_documents(session_id).await?,
        None => engine.list_documents().await?,
    };

    if documents.is_empty() {
        println!("No documents uploaded.");
        return Ok(());
    }

    println!("{} document(s):", documents.len());
    for doc in documents {
        println!(
            "  {}  {} ({} bytes, {} chunks, vectors: {})",
            doc.id,
            doc.file_name,
            doc.file_size,
            doc.chunk_count,
            if doc.vector_stored { "yes" } else { "no" }
        );
    }
    Ok(())
}

#[inline]
pub async fn delete_document(config_dir: &Path, document_id: String) -> Result<()> {
    let engine = build_engine(config_dir).await?;
    engine.delete_document(&document_id).await?;
    println!("Deleted document {}", document_id);
    Ok(())
}

#[inline]
pub async fn list_sessions(config_dir: &Path, cleanup: bool) -> Result<()> {
    let engine = build_engine(config_dir).await?;

    if cleanup {
        let expired = engine.sessions().cleanup_expired().await?;
        println!("Expired {} inactive session(s).", expired);
    }

    let sessions = engine.sessions().list_sessions().await?;
    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    println!("{} session(s):", sessions.len());
    for session in sessions {
        let user = session.user_name.as_deref().unwrap_or("-");
        println!(
            "  {}  {}  user: {}  started: {}",
            session.id, session.status, user, session.created_at
        );
    }
    Ok(())
}

#[inline]
pub async fn end_session(config_dir: &Path, session_id: String) -> Result<()> {
    let engine = build_engine(config_dir).await?;
    let session = engine.end_session(&session_id).await?;

    println!("Session {} is now {}.", session.id, session.status);
    if let Some(summary) = session.summary {
        println!("{} {}", style("summary:").bold(), summary);
    }
    Ok(())
}

#[inline]
pub async fn show_analytics(config_dir: &Path, days: u32) -> Result<()> {
    let database = Database::initialize_from_config_dir(config_dir)
        .await
        .map_err(RagError::Other)?;
    let analytics = Analytics::new(database);

    let conversations = analytics.conversation_data(days).await?;
    let voice = analytics.voice_data(days).await?;
    let performance = analytics.performance_data(days).await?;
    let engagement = analytics.engagement_data(days).await?;

    println!("{}", style(format!("Last {} day(s)", days)).bold());
    println!("\nConversations:");
    for day in &conversations {
        println!(
            "  {}  messages: {:>4}  with retrieval: {:>4}",
            day.date, day.messages, day.rag_messages
        );
    }
    println!("\nVoice:");
    for day in &voice {
        println!(
            "  {}  uses: {:>4}  total duration: {} ms",
            day.date, day.uses, day.total_duration_ms
        );
    }
    println!("\nAI performance:");
    for day in &performance {
        println!(
            "  {}  requests: {:>4}  avg latency: {:>7.1} ms  success: {:>5.1}%",
            day.date,
            day.requests,
            day.avg_duration_ms,
            day.success_rate * 100.0
        );
    }
    println!("\nEngagement:");
    for day in &engagement {
        println!("  {}  events: {:>4}", day.date, day.events);
    }
    Ok(())
}

/// Summarize configuration, storage, and backend health.
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).map_err(|e| RagError::Config(e.to_string()))?;
    println!("{}", style("ragchat status").bold());
    println!("  Config dir: {}", config_dir.display());
    println!("  Generation model: {}", config.gemini.model);
    println!(
        "  Embedding model: {} ({} dims)",
        config.gemini.embedding_model, config.gemini.embedding_dimension
    );
    println!("  Vector provider: {}", config.vector.provider);

    let database = Database::initialize_from_config_dir(config_dir)
        .await
        .map_err(RagError::Other)?;
    let sessions = database.list_sessions().await.map_err(RagError::Other)?;
    let active = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Active)
        .count();
    let documents = database.list_documents().await.map_err(RagError::Other)?;
    println!(
        "  Sessions: {} total, {} active",
        sessions.len(),
        active
    );
    println!("  Documents: {}", documents.len());

    let engine = RagEngine::new(&config, database)?;
    engine.initialize_vectors();
    if engine.vectors().is_available() {
        match engine.vectors().stats() {
            Ok(stats) => {
                println!(
                    "  Vector backend: available ({} vectors)",
                    stats.total_vectors
                );
            }
            Err(e) => println!("  Vector backend: reachable, stats failed ({})", e),
        }
    } else {
        println!("  Vector backend: unavailable");
    }

    info!("Status check complete");
    Ok(())
}
