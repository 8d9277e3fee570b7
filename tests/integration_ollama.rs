#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance with the configured
// models pulled
// Run with: cargo test --test integration_ollama -- --ignored

use docs_qa::config::{Config, OllamaConfig, Provider};
use docs_qa::embeddings::{ChunkingConfig, EmbeddingRole, Embedder};
use docs_qa::generation::Generator;
use docs_qa::providers::OllamaClient;
use docs_qa::retriever::{DocumentSource, Retriever};
use std::env;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn integration_config() -> OllamaConfig {
    let defaults = OllamaConfig::default();
    OllamaConfig {
        host: env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string()),
        port: env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_OLLAMA_PORT),
        embedding_model: env::var("OLLAMA_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
        generation_model: env::var("OLLAMA_GENERATION_MODEL")
            .unwrap_or(defaults.generation_model),
        batch_size: 5,
        ..OllamaConfig::default()
    }
}

fn create_integration_test_client() -> OllamaClient {
    OllamaClient::new(&integration_config())
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(120))
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_list_models() {
    init_test_tracing();

    let client = create_integration_test_client();
    let models = client.list_models().expect("Model listing should succeed");
    assert!(
        !models.is_empty(),
        "Should have at least one model available"
    );

    for model in &models {
        debug!("Available model: {} (size: {:?})", model.name, model.size);
    }
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_batch_embeddings() {
    init_test_tracing();

    let client = create_integration_test_client();
    let texts = [
        "The clubhouse has a heated pool.",
        "Covered parking is included with every unit.",
        "Each tower has twelve floors.",
        "Prices start at the launch rate.",
        "Possession is planned for next year.",
        "The gym opens at six in the morning.",
    ];

    let vectors = client
        .embed_batch(&texts, EmbeddingRole::Document)
        .expect("Batch embedding should succeed");

    assert_eq!(vectors.len(), texts.len());
    for vector in &vectors {
        assert_eq!(vector.len(), client.dimension());
    }
    info!(
        "Generated {} embeddings with {} dimensions",
        vectors.len(),
        client.dimension()
    );
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_generation() {
    init_test_tracing();

    let client = create_integration_test_client();
    let reply = client
        .generate("Reply with the single word: ready")
        .expect("Generation should succeed");

    assert!(!reply.trim().is_empty());
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_answers_from_document() {
    init_test_tracing();

    let config = Config {
        provider: Provider::Ollama,
        ollama: integration_config(),
        ..Config::default()
    };
    let retriever = Retriever::from_config(&config).expect("retriever should build");
    let document = "Sunrise Towers is a residential project with three towers.\n\n\
        Each tower has twelve floors and two lifts. The clubhouse includes a heated pool.\n\n\
        Covered parking is available in the basement for every apartment.";

    let session = retriever
        .build_session(
            DocumentSource::Text(document.to_string()),
            &ChunkingConfig {
                chunk_size: 20,
                overlap: 5,
            },
        )
        .expect("session should build");
    let answer = retriever
        .answer(&session, "How many floors does each tower have?", 2)
        .expect("answer should succeed");

    info!("Answer: {}", answer.text);
    assert!(!answer.text.trim().is_empty());
    assert_eq!(answer.sources.len(), 2);
}
