use clap::{Parser, Subcommand};
use ragchat::Result;
use ragchat::commands::{
    delete_document, end_session, list_documents, list_sessions, run_chat, show_analytics,
    show_status, upload_document,
};
use ragchat::config::{default_base_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ragchat")]
#[command(about = "A document-aware chat assistant with retrieval, sessions, and analytics")]
#[command(version)]
struct Cli {
    /// Override the configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Configure API keys, vector backend, and behavior
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start an interactive chat session
    Chat {
        /// Resume an existing session by id
        #[arg(long)]
        session: Option<String>,
        /// Answer without document retrieval
        #[arg(long)]
        no_rag: bool,
        /// Voice mode: read utterances from stdin
        #[arg(long)]
        voice: bool,
    },
    /// Upload a document for retrieval
    Upload {
        /// Path to the file (txt, md, pdf, docx, or image)
        file: PathBuf,
        /// Attach to an existing session instead of creating one
        #[arg(long)]
        session: Option<String>,
    },
    /// List uploaded documents
    Documents {
        /// Limit to a single session's documents
        #[arg(long)]
        session: Option<String>,
    },
    /// Delete a document and its vectors
    DeleteDocument {
        /// Document ID to delete
        document_id: String,
    },
    /// List sessions
    Sessions {
        /// Expire sessions idle past the timeout first
        #[arg(long)]
        cleanup: bool,
    },
    /// End a session, generating its summary
    EndSession {
        /// Session ID to end
        session_id: String,
    },
    /// Show usage analytics
    Analytics {
        /// Trailing window in days
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Show configuration, storage, and backend health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_base_dir().map_err(|e| ragchat::RagError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Chat {
            session,
            no_rag,
            voice,
        } => {
            run_chat(&config_dir, session, no_rag, voice).await?;
        }
        Commands::Upload { file, session } => {
            upload_document(&config_dir, file, session).await?;
        }
        Commands::Documents { session } => {
            list_documents(&config_dir, session.as_deref()).await?;
        }
        Commands::DeleteDocument { document_id } => {
            delete_document(&config_dir, document_id).await?;
        }
        Commands::Sessions { cleanup } => {
            list_sessions(&config_dir, cleanup).await?;
        }
        Commands::EndSession { session_id } => {
            end_session(&config_dir, session_id).await?;
        }
        Commands::Analytics { days } => {
            show_analytics(&config_dir, days).await?;
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["ragchat", "documents"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Documents { session: None }));
        }
    }

    #[test]
    fn chat_flags() {
        let cli = Cli::try_parse_from(["ragchat", "chat", "--no-rag", "--session", "abc"]).unwrap();
        match cli.command {
            Commands::Chat {
                session,
                no_rag,
                voice,
            } => {
                assert_eq!(session.as_deref(), Some("abc"));
                assert!(no_rag);
                assert!(!voice);
            }
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn analytics_defaults_to_a_week() {
        let cli = Cli::try_parse_from(["ragchat", "analytics"]).unwrap();
        match cli.command {
            Commands::Analytics { days } => assert_eq!(days, 7),
            _ => panic!("expected analytics command"),
        }
    }

    #[test]
    fn upload_requires_a_file() {
        let err = Cli::try_parse_from(["ragchat", "upload"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn global_config_dir_flag() {
        let cli = Cli::try_parse_from(["ragchat", "--config-dir", "/tmp/x", "status"]).unwrap();
        assert_eq!(cli.config_dir.as_deref(), Some(std::path::Path::new("/tmp/x")));
    }
}
