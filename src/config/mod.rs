// Configuration management module
// TOML settings for the service providers, chunking and retrieval

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, GEMINI_API_KEY_ENV, GeminiConfig, OllamaConfig, Provider,
    RetrievalConfig, SessionConfig, validate_chunking, validate_top_k,
};
