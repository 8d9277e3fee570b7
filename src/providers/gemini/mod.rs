
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ServiceError, build_agent, execute, join_url, parse_response, to_json};
use crate::config::GeminiConfig;
use crate::embeddings::{EmbeddingResult, EmbeddingRole, EmbeddingVector, Embedder};
use crate::generation::{GenerationResult, Generator};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for the Gemini embedding and content generation APIs
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    generation_model: String,
    dimension: usize,
    batch_size: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

impl From<EmbeddingRole> for TaskType {
    fn from(role: EmbeddingRole) -> Self {
        match role {
            EmbeddingRole::Document => Self::RetrievalDocument,
            EmbeddingRole::Query => Self::RetrievalQuery,
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: TaskType,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    status: Option<String>,
}

fn error_message(body: &str) -> Option<String> {
    let response: ErrorResponse = serde_json::from_str(body).ok()?;
    Some(match response.error.status {
        Some(status) => format!("{} ({})", response.error.message, status),
        None => response.error.message,
    })
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .context("Failed to parse Gemini base URL from config")?;
        let api_key = config
            .resolve_api_key()
            .context("Gemini requires an API key")?;

        Ok(Self {
            base_url,
            api_key,
            embedding_model: normalize_model(&config.embedding_model),
            generation_model: normalize_model(&config.generation_model),
            dimension: config.embedding_dimension as usize,
            batch_size: config.batch_size as usize,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    fn post(&self, url: &Url, body: &str) -> Result<String, ServiceError> {
        execute(
            url,
            || {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .header(API_KEY_HEADER, self.api_key.as_str())
                    .send(body)
            },
            error_message,
        )
    }

    fn embed_request<'a>(&self, text: &'a str, role: EmbeddingRole) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content::text(text),
            task_type: role.into(),
            output_dimensionality: self.dimension,
        }
    }

    fn embed_single_batch(
        &self,
        texts: &[&str],
        role: EmbeddingRole,
    ) -> Result<Vec<EmbeddingVector>, ServiceError> {
        if let [text] = texts {
            return Ok(vec![self.embed(text, role)?]);
        }

        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| self.embed_request(text, role))
                .collect(),
        };
        let url = join_url(
            &self.base_url,
            &format!("v1beta/models/{}:batchEmbedContents", self.embedding_model),
        )?;

        let body = self.post(&url, &to_json(&request, "batch embedding request")?)?;
        let response: BatchEmbedContentsResponse =
            parse_response(&body, "batch embedding response")?;

        if response.embeddings.len() != texts.len() {
            return Err(ServiceError::MalformedResponse(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }
}

impl Embedder for GeminiClient {
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

        let url = join_url(
            &self.base_url,
            &format!("v1beta/models/{}:embedContent", self.embedding_model),
        )?;
        let request = to_json(&self.embed_request(text, role), "embedding request")?;

        let body = self.post(&url, &request)?;
        let response: EmbedContentResponse = parse_response(&body, "embedding response")?;

        debug!(
            "Generated embedding with {} dimensions",
            response.embedding.values.len()
        );
        Ok(response.embedding.values)
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

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            vectors.extend(self.embed_single_batch(batch, role)?);
        }
        Ok(vectors)
    }
}

impl Generator for GeminiClient {
    #[inline]
    fn generate(&self, prompt: &str) -> GenerationResult {
        debug!(
            "Generating answer with {} (prompt length: {})",
            self.generation_model,
            prompt.len()
        );

        let url = join_url(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", self.generation_model),
        )?;
        let request = GenerateContentRequest {
            contents: vec![Content::text(prompt)],
        };

        let body = self.post(&url, &to_json(&request, "generation request")?)?;
        let response: GenerateContentResponse = parse_response(&body, "generation response")?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .unwrap_or_else(|| "unspecified".to_string());
            return Err(ServiceError::MalformedResponse(format!(
                "No candidates returned (block reason: {})",
                reason
            )));
        };

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(ServiceError::MalformedResponse(format!(
                "Candidate contained no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unspecified")
            )));
        }

        Ok(text)
    }
}

fn normalize_model(model: &str) -> String {
    model.trim().trim_start_matches("models/").to_string()
}
