use super::*;
use crate::providers::tests::{blocking, closed_port_url};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers /api/embed with one `[input length, 1.0]` vector per input
struct LengthEmbeddings;

impl Respond for LengthEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request body should be json");
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .expect("input should be an array")
            .iter()
            .map(|input| vec![input.as_str().map_or(0, str::len) as f32, 1.0])
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

fn mock_config(server: &MockServer) -> OllamaConfig {
    let address = server.address();
    OllamaConfig {
        host: address.ip().to_string(),
        port: address.port(),
        embedding_dimension: 2,
        ..OllamaConfig::default()
    }
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        embedding_model: "test-embed".to_string(),
        generation_model: "test-chat".to_string(),
        batch_size: 128,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.embedding_model, "test-embed");
    assert_eq!(client.generation_model, "test-chat");
    assert_eq!(client.preferred_batch_size(), 128);
    assert_eq!(client.dimension(), 768);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
}

#[test]
fn role_prefixes() {
    let client = OllamaClient::new(&OllamaConfig::default()).expect("Failed to create client");
    assert_eq!(client.prefix(EmbeddingRole::Document), "search_document: ");
    assert_eq!(client.prefix(EmbeddingRole::Query), "search_query: ");
}

#[test]
fn latest_tag_matches_untagged_name() {
    assert!(model_matches("nomic-embed-text:latest", "nomic-embed-text"));
    assert!(model_matches("nomic-embed-text:latest", "nomic-embed-text:latest"));
    assert!(model_matches("llama3.2:3b", "llama3.2:3b"));
    assert!(!model_matches("llama3.2:3b", "llama3.2"));
    assert!(!model_matches("nomic-embed-text-v2:latest", "nomic-embed-text"));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batch_splits_into_configured_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(LengthEmbeddings)
        .expect(2)
        .mount(&server)
        .await;

    let config = OllamaConfig {
        batch_size: 2,
        document_prefix: String::new(),
        ..mock_config(&server)
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    let vectors = blocking(move || client.embed_batch(&["a", "bbb", "cc"], EmbeddingRole::Document))
        .await
        .expect("batch should succeed");

    assert_eq!(
        vectors,
        vec![vec![1.0, 1.0], vec![3.0, 1.0], vec![2.0, 1.0]]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn query_embedding_uses_query_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({
            "model": "nomic-embed-text:latest",
            "input": ["search_query: what is the area?"],
            "dimensions": 2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "nomic-embed-text:latest",
            "embeddings": [[0.25, -0.5]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&mock_config(&server)).expect("Failed to create client");
    let vector = blocking(move || client.embed("what is the area?", EmbeddingRole::Query))
        .await
        .expect("embedding should succeed");

    assert_eq!(vector, vec![0.25, -0.5]);
}

#[tokio::test(flavor = "multi_thread")]
async fn response_count_mismatch_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 2.0]] })),
        )
        .mount(&server)
        .await;

    let client = OllamaClient::new(&mock_config(&server)).expect("Failed to create client");
    let error = blocking(move || client.embed_batch(&["one", "two"], EmbeddingRole::Document))
        .await
        .expect_err("count mismatch should fail");

    assert!(matches!(error, ServiceError::MalformedResponse(_)), "{:?}", error);
}

#[tokio::test(flavor = "multi_thread")]
async fn error_body_message_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "model \"missing\" not found, try pulling it first"
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&mock_config(&server)).expect("Failed to create client");
    let error = blocking(move || client.embed("text", EmbeddingRole::Document))
        .await
        .expect_err("404 should fail");

    match &error {
        ServiceError::Status { status, message } => {
            assert_eq!(*status, 404);
            assert!(message.contains("try pulling it first"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!error.is_transient());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&mock_config(&server)).expect("Failed to create client");
    let error = blocking(move || client.generate("prompt"))
        .await
        .expect_err("503 should fail");

    assert!(error.is_transient());
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_returns_response_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.2:latest",
            "prompt": "Say hi",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2:latest",
            "response": "  Hi there.\n",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&mock_config(&server)).expect("Failed to create client");
    let answer = blocking(move || client.generate("Say hi"))
        .await
        .expect("generation should succeed");

    assert_eq!(answer, "  Hi there.\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn model_validation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "nomic-embed-text:latest", "size": 274302450 },
                { "name": "llama3.2:latest", "details": { "family": "llama" } }
            ]
        })))
        .mount(&server)
        .await;

    let config = OllamaConfig {
        embedding_model: "nomic-embed-text".to_string(),
        ..mock_config(&server)
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");
    let missing = OllamaClient::new(&OllamaConfig {
        generation_model: "mistral".to_string(),
        ..config
    })
    .expect("Failed to create client");

    let (healthy, unhealthy, models) = blocking(move || {
        (
            client.health_check(),
            missing.validate_model(),
            client.list_models(),
        )
    })
    .await;

    assert!(healthy.is_ok(), "{:?}", healthy);
    assert!(unhealthy.is_err());
    let models = models.expect("models should list");
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].size, Some(274302450));
}

#[test]
fn ping_unreachable_server() {
    let url = closed_port_url("/");
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: url.port().expect("port"),
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(2));

    assert!(client.ping().is_err());
}
