#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{ServiceError, build_agent, execute, join_url, parse_response, to_json};
use crate::config::OllamaConfig;
use crate::embeddings::{EmbeddingResult, EmbeddingRole, EmbeddingVector, Embedder};
use crate::generation::{GenerationResult, Generator};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
    dimension: usize,
    batch_size: usize,
    document_prefix: String,
    query_prefix: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: Vec<String>,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ModelDetails {
    pub format: Option<String>,
    pub family: Option<String>,
    pub families: Option<Vec<String>>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|response| response.error)
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            dimension: config.embedding_dimension as usize,
            batch_size: config.batch_size as usize,
            document_prefix: config.document_prefix.clone(),
            query_prefix: config.query_prefix.clone(),
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Test connection to Ollama server and verify both models are available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;
        self.validate_model().context("Model validation failed")?;

        info!(
            "Health check passed for Ollama server at {} with models {} and {}",
            self.base_url, self.embedding_model, self.generation_model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = join_url(&self.base_url, "api/tags")?;

        debug!("Pinging Ollama server at {}", url);

        self.get(&url).context("Failed to ping Ollama server")?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Validate that the configured embedding and generation models are pulled
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models().context("Failed to list models")?;
        let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();

        for model in [&self.embedding_model, &self.generation_model] {
            debug!("Validating model: {}", model);

            if !available_models
                .iter()
                .any(|name| model_matches(name, model))
            {
                warn!(
                    "Model {} not found. Available models: {:?}",
                    model, available_models
                );
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    model,
                    available_models
                ));
            }
        }

        Ok(())
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = join_url(&self.base_url, "api/tags")?;

        debug!("Fetching available models from {}", url);

        let response_text = self.get(&url).context("Failed to fetch models")?;
        let models_response: ModelsResponse =
            parse_response(&response_text, "models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn get(&self, url: &Url) -> Result<String, ServiceError> {
        execute(url, || self.agent.get(url.as_str()).call(), error_message)
    }

    fn post(&self, url: &Url, body: &str) -> Result<String, ServiceError> {
        execute(
            url,
            || {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(body)
            },
            error_message,
        )
    }

    fn prefix(&self, role: EmbeddingRole) -> &str {
        match role {
            EmbeddingRole::Document => &self.document_prefix,
            EmbeddingRole::Query => &self.query_prefix,
        }
    }

    fn embed_single_batch(
        &self,
        texts: &[&str],
        role: EmbeddingRole,
    ) -> Result<Vec<EmbeddingVector>, ServiceError> {
        let prefix = self.prefix(role);
        let request = EmbedRequest {
            model: &self.embedding_model,
            inputs: texts
                .iter()
                .map(|text| format!("{}{}", prefix, text))
                .collect(),
            dimensions: self.dimension,
        };

        let url = join_url(&self.base_url, "api/embed")?;
        let response_text = self.post(&url, &to_json(&request, "embedding request")?)?;
        let response: EmbedResponse = parse_response(&response_text, "embedding response")?;

        if response.embeddings.len() != texts.len() {
            return Err(ServiceError::MalformedResponse(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

/// Ollama reports untagged models with an explicit `:latest` tag
fn model_matches(available: &str, configured: &str) -> bool {
    available == configured
        || available
            .strip_suffix(":latest")
            .is_some_and(|name| name == configured)
}

impl Embedder for OllamaClient {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn preferred_batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    fn embed(&self, text: &str, role: EmbeddingRole) -> EmbeddingResult {
        debug!(
            "Generating {} embedding for text (length: {})",
            role,
            text.len()
        );

        self.embed_single_batch(&[text], role)?
            .pop()
            .ok_or_else(|| ServiceError::MalformedResponse("No embedding returned".to_string()))
    }

    #[inline]
    fn embed_batch(
        &self,
        texts: &[&str],
        role: EmbeddingRole,
    ) -> Result<Vec<EmbeddingVector>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating {} embeddings for {} texts", role, texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Process in batches to avoid overwhelming the server
        for chunk in texts.chunks(self.batch_size.max(1)) {
            results.extend(self.embed_single_batch(chunk, role)?);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}

impl Generator for OllamaClient {
    #[inline]
    fn generate(&self, prompt: &str) -> GenerationResult {
        debug!(
            "Generating answer with {} (prompt length: {})",
            self.generation_model,
            prompt.len()
        );

        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
        };

        let url = join_url(&self.base_url, "api/generate")?;
        let response_text = self.post(&url, &to_json(&request, "generation request")?)?;
        let response: GenerateResponse = parse_response(&response_text, "generation response")?;

        Ok(response.response)
    }
}
