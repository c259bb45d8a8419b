use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, VectorProvider};

/// Walk the user through the settings that matter most: the Gemini model,
/// the vector backend, and email delivery.
#[inline]
pub fn run_interactive_config(config_dir: &std::path::Path) -> Result<()> {
    eprintln!("{}", style("Ragchat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Gemini Settings").bold().yellow());
    let model: String = Input::new()
        .with_prompt("Generation model")
        .default(config.gemini.model.clone())
        .interact_text()?;
    config.gemini.model = model;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(config.gemini.embedding_model.clone())
        .interact_text()?;
    config.gemini.embedding_model = embedding_model;

    eprintln!();
    eprintln!("{}", style("Vector Backend").bold().yellow());
    let providers = &["none", "pinecone", "qdrant", "weaviate"];
    let current = providers
        .iter()
        .position(|&p| p == config.vector.provider.to_string())
        .unwrap_or(0);
    let selected = Select::new()
        .with_prompt("Vector database provider")
        .default(current)
        .items(providers)
        .interact()?;
    config.vector.provider = match providers[selected] {
        "pinecone" => VectorProvider::Pinecone,
        "qdrant" => VectorProvider::Qdrant,
        "weaviate" => VectorProvider::Weaviate,
        _ => VectorProvider::None,
    };

    match config.vector.provider {
        VectorProvider::Pinecone => {
            config.vector.pinecone.index_host = Input::new()
                .with_prompt("Pinecone index host URL")
                .default(config.vector.pinecone.index_host.clone())
                .interact_text()?;
        }
        VectorProvider::Qdrant => {
            config.vector.qdrant.url = Input::new()
                .with_prompt("Qdrant URL")
                .default(config.vector.qdrant.url.clone())
                .interact_text()?;
            config.vector.qdrant.collection = Input::new()
                .with_prompt("Qdrant collection")
                .default(config.vector.qdrant.collection.clone())
                .interact_text()?;
        }
        VectorProvider::Weaviate => {
            config.vector.weaviate.url = Input::new()
                .with_prompt("Weaviate URL")
                .default(config.vector.weaviate.url.clone())
                .interact_text()?;
        }
        VectorProvider::None => {
            eprintln!(
                "{}",
                style("RAG disabled: chat will run without document retrieval.").yellow()
            );
        }
    }

    eprintln!();
    config.email.enabled = Confirm::new()
        .with_prompt("Send session summary emails?")
        .default(config.email.enabled)
        .interact()?;
    if config.email.enabled {
        config.email.from_address = Input::new()
            .with_prompt("From address")
            .default(config.email.from_address.clone())
            .interact_text()?;
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("Configuration saved.").green());
        eprintln!(
            "Config file: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &std::path::Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Gemini:").bold().yellow());
    eprintln!("  Model: {}", style(&config.gemini.model).cyan());
    eprintln!(
        "  Embedding model: {} ({} dims)",
        style(&config.gemini.embedding_model).cyan(),
        config.gemini.embedding_dimension
    );
    eprintln!("  API key env: {}", style(&config.gemini.api_key_env).cyan());

    eprintln!();
    eprintln!("{}", style("Vector backend:").bold().yellow());
    eprintln!("  Provider: {}", style(config.vector.provider).cyan());
    match config.vector.provider {
        VectorProvider::Pinecone => {
            eprintln!("  Host: {}", style(&config.vector.pinecone.index_host).cyan());
        }
        VectorProvider::Qdrant => {
            eprintln!("  URL: {}", style(&config.vector.qdrant.url).cyan());
            eprintln!(
                "  Collection: {}",
                style(&config.vector.qdrant.collection).cyan()
            );
        }
        VectorProvider::Weaviate => {
            eprintln!("  URL: {}", style(&config.vector.weaviate.url).cyan());
            eprintln!(
                "  Class: {}",
                style(&config.vector.weaviate.class_name).cyan()
            );
        }
        VectorProvider::None => {}
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  top_k: {}", style(config.retrieval.top_k).cyan());
    eprintln!("  Threshold: {}", style(config.retrieval.threshold).cyan());

    eprintln!();
    eprintln!("{}", style("Sessions:").bold().yellow());
    eprintln!(
        "  Required fields: {}",
        style(config.session.required_fields.join(", ")).cyan()
    );
    eprintln!(
        "  Timeout: {} minutes",
        style(config.session.timeout_minutes).cyan()
    );
    eprintln!(
        "  Email summaries: {}",
        style(if config.email.enabled { "enabled" } else { "disabled" }).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &std::path::Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            let mut config = Config::default();
            config.base_dir = config_dir.to_path_buf();
            Ok(config)
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}
