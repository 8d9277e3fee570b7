
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::Path;

use super::{
    Config, ConfigError, GEMINI_API_KEY_ENV, GeminiConfig, OllamaConfig, Provider,
    validate_chunking, validate_top_k,
};
use crate::embeddings::{ChunkingConfig, EmbeddingRole, Embedder};
use crate::providers::{GeminiClient, OllamaClient};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Docs QA Configuration Setup").bold().cyan());
    eprintln!();

    let config_dir = Config::config_dir().context("Failed to determine config directory")?;
    let mut config = load_existing_config(&config_dir);

    let provider_index = Select::new()
        .with_prompt("Provider for embeddings and answers")
        .default(
            Provider::ALL
                .iter()
                .position(|&p| p == config.provider)
                .unwrap_or(0),
        )
        .items(&Provider::ALL)
        .interact()?;
    config.provider = Provider::ALL
        .get(provider_index)
        .copied()
        .unwrap_or_default();

    eprintln!();
    match config.provider {
        Provider::Gemini => {
            eprintln!("{}", style("Gemini Configuration").bold().yellow());
            eprintln!("Configure the Gemini API for embeddings and answer generation.");
            eprintln!();
            configure_gemini(&mut config.gemini)?;
        }
        Provider::Ollama => {
            eprintln!("{}", style("Ollama Configuration").bold().yellow());
            eprintln!("Configure your local Ollama instance for embeddings and answer generation.");
            eprintln!();
            configure_ollama(&mut config.ollama)?;
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_connection(&config) {
        Ok(()) => eprintln!("{}", style("✓ Connection successful!").green()),
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: connection test failed: {:#}", e)).yellow()
            );
            eprintln!("You can continue, but the service must be reachable before asking questions.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();
    eprintln!("Provider: {}", style(config.provider).cyan().bold());
    eprintln!();

    eprintln!("{}", style("Gemini Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.gemini.base_url).cyan());
    let key_state = match config.gemini.resolve_api_key() {
        Ok(_) if config.gemini.api_key.is_some() => "set in config file".to_string(),
        Ok(_) => format!("from {}", GEMINI_API_KEY_ENV),
        Err(_) => "not set".to_string(),
    };
    eprintln!("  API Key: {}", style(key_state).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.gemini.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.gemini.generation_model).cyan()
    );
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.gemini.embedding_dimension).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.gemini.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} words",
        style(config.chunking.chunk_size).cyan()
    );
    eprintln!("  Overlap: {} words", style(config.chunking.overlap).cyan());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Minimum Document Length: {} characters",
        style(config.session.min_document_chars).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

#[allow(clippy::ptr_arg, reason = "dialoguer validators receive &String")]
fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn configure_gemini(gemini: &mut GeminiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Gemini API base URL")
        .default(gemini.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            GeminiConfig {
                base_url: input.clone(),
                ..GeminiConfig::default()
            }
            .base_url()
            .map(|_| ())
        })
        .interact_text()?;

    let prompt = if gemini.api_key.is_some() {
        "API key (leave empty to keep the current key)".to_string()
    } else {
        format!("API key (leave empty to use {})", GEMINI_API_KEY_ENV)
    };
    let api_key = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(gemini.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(gemini.generation_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(gemini.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Embedding dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding requests")
        .default(gemini.batch_size)
        .validate_with(|input: &u32| -> Result<(), String> {
            if (1..=GeminiConfig::MAX_BATCH_SIZE).contains(input) {
                Ok(())
            } else {
                Err(format!(
                    "Batch size must be between 1 and {}",
                    GeminiConfig::MAX_BATCH_SIZE
                ))
            }
        })
        .interact_text()?;

    gemini.set_base_url(base_url)?;
    if !api_key.trim().is_empty() {
        gemini.set_api_key(api_key);
    }
    gemini.set_embedding_model(embedding_model)?;
    gemini.set_generation_model(generation_model)?;
    gemini.set_embedding_dimension(embedding_dimension)?;
    gemini.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols
        .get(protocol_index)
        .copied()
        .unwrap_or("http")
        .to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            }
            .validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(ollama.generation_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(ollama.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Embedding dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > OllamaConfig::MAX_BATCH_SIZE {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_generation_model(generation_model)?;
    ollama.set_embedding_dimension(embedding_dimension)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (words)")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            validate_chunking(&ChunkingConfig {
                chunk_size: *input,
                overlap: 0,
            })
        })
        .interact_text()?;

    let overlap: usize = Input::new()
        .with_prompt("Overlap between chunks (words)")
        .default(config.chunking.overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            validate_chunking(&ChunkingConfig {
                chunk_size,
                overlap: *input,
            })
        })
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Chunks used to answer each question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| validate_top_k(*input))
        .interact_text()?;

    config.set_chunking(chunk_size, overlap)?;
    config.set_top_k(top_k)?;

    Ok(())
}

fn test_connection(config: &Config) -> Result<()> {
    match config.provider {
        Provider::Gemini => {
            let client = GeminiClient::new(&config.gemini)?;
            client
                .embed("connection test", EmbeddingRole::Query)
                .context("Gemini embedding request failed")?;
        }
        Provider::Ollama => {
            OllamaClient::new(&config.ollama)?.health_check()?;
        }
    }
    Ok(())
}
