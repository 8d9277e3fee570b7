// Retriever module
// Builds a session from a document and answers questions against it

mod session;


use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::{Config, Provider};
use crate::embeddings::{Chunk, ChunkingConfig, EmbeddingRole, Embedder, chunk_document};
use crate::generation::{Generator, build_prompt};
use crate::index::{QueryResult, VectorIndex, VectorIndexBuilder};
use crate::providers::{GeminiClient, OllamaClient};
use crate::{QaError, Result};

pub use session::{ChunkStore, Session};

/// Number of chunks placed in the answer context when the caller has no
/// preference
pub const DEFAULT_TOP_K: usize = 3;

/// Where a document's text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A UTF-8 file, read once when the session is built
    Path(PathBuf),
    /// Text already in memory
    Text(String),
}

impl DocumentSource {
    fn load(self) -> Result<(String, Option<PathBuf>)> {
        match self {
            Self::Path(path) => {
                let text = fs::read_to_string(&path)?;
                debug!("Read {} bytes from {}", text.len(), path.display());
                Ok((text, Some(path)))
            }
            Self::Text(text) => Ok((text, None)),
        }
    }
}

impl From<PathBuf> for DocumentSource {
    #[inline]
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// A generated answer and the chunks it was grounded on
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The generation service's reply, unmodified
    pub text: String,
    /// Chunks placed in the context, best match first
    pub sources: QueryResult,
}

/// Ties an embedding service and a generation service to documents
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl fmt::Debug for Retriever {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retriever")
            .field("dimension", &self.embedder.dimension())
            .field("batch_size", &self.embedder.preferred_batch_size())
            .finish_non_exhaustive()
    }
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            embedder,
            generator,
        }
    }

    /// Use the configured provider for both embedding and generation
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let to_config_error = |e: anyhow::Error| QaError::Config(format!("{:#}", e));

        let retriever = match config.provider {
            Provider::Gemini => {
                let client = Arc::new(GeminiClient::new(&config.gemini).map_err(to_config_error)?);
                Self::new(Arc::<GeminiClient>::clone(&client), client)
            }
            Provider::Ollama => {
                let client = Arc::new(OllamaClient::new(&config.ollama).map_err(to_config_error)?);
                Self::new(Arc::<OllamaClient>::clone(&client), client)
            }
        };

        info!("Using {} for embeddings and generation", config.provider);
        Ok(retriever)
    }

    /// Chunk, embed and index a document.
    ///
    /// The build is all or nothing: any failure discards everything done so
    /// far and is reported as [`QaError::IndexBuild`].
    #[inline]
    pub fn build_session(
        &self,
        source: DocumentSource,
        config: &ChunkingConfig,
    ) -> Result<Session> {
        let start = Instant::now();
        let (text, path) = source.load()?;

        let chunks = chunk_document(&text, config)
            .map_err(|e| QaError::index_build("failed to chunk document", Some(e)))?;
        if chunks.is_empty() {
            return Err(QaError::index_build(
                "document produced no chunks (is it empty?)",
                None,
            ));
        }

        let index = self.embed_chunks(&chunks)?;
        let session = Session::from_parts(chunks, index, path)?;

        info!(
            "Built session {} with {} chunks in {:?}",
            session.id(),
            session.len(),
            start.elapsed()
        );
        Ok(session)
    }

    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<VectorIndex> {
        let batch_size = self.embedder.preferred_batch_size().max(1);
        let mut builder = VectorIndexBuilder::with_dimension(self.embedder.dimension());

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(chunks.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
            let first = batch.first().map_or(0, |chunk| chunk.index);

            let vectors = self
                .embedder
                .embed_batch(&texts, EmbeddingRole::Document)
                .map_err(|e| {
                    QaError::index_build(
                        format!("failed to embed chunks starting at {}", first),
                        Some(QaError::EmbeddingService(e)),
                    )
                })?;

            if vectors.len() != texts.len() {
                return Err(QaError::index_build(
                    format!(
                        "embedding service returned {} vectors for {} chunks",
                        vectors.len(),
                        texts.len()
                    ),
                    None,
                ));
            }

            for vector in &vectors {
                builder.push(vector).map_err(|e| {
                    QaError::index_build("embedding has an unexpected dimension", Some(e))
                })?;
            }

            debug!("Embedded {} of {} chunks", builder.len(), chunks.len());
            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        Ok(builder.build())
    }

    /// Find the `top_k` chunks closest to `question`
    #[inline]
    pub fn retrieve(&self, session: &Session, question: &str, top_k: usize) -> Result<QueryResult> {
        if session.index().is_empty() {
            return Err(QaError::Retrieval(format!(
                "session {} has no indexed chunks",
                session.id()
            )));
        }

        let vector = self
            .embedder
            .embed(question, EmbeddingRole::Query)
            .map_err(QaError::EmbeddingService)?;

        session
            .index()
            .search(&vector, top_k)
            .map_err(|e| match e {
                QaError::EmptyIndex => {
                    QaError::Retrieval(format!("session {} has no indexed chunks", session.id()))
                }
                other => other,
            })
    }

    /// Answer `question` from the `top_k` closest chunks of the session
    #[inline]
    pub fn answer(&self, session: &Session, question: &str, top_k: usize) -> Result<Answer> {
        let start = Instant::now();

        let sources = self.retrieve(session, question, top_k)?;
        let context = session.context_for(&sources)?;
        let prompt = build_prompt(&context, question);

        let text = self
            .generator
            .generate(&prompt)
            .map_err(QaError::GenerationService)?;

        debug!(
            "Answered question against session {} from {} chunks in {:?}",
            session.id(),
            sources.len(),
            start.elapsed()
        );
        Ok(Answer { text, sources })
    }

    /// Answer `question`, returning only the generated text
    #[inline]
    pub fn query(&self, session: &Session, question: &str, top_k: usize) -> Result<String> {
        self.answer(session, question, top_k).map(|answer| answer.text)
    }
}
