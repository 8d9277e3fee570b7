// Embeddings module
// Chunking of the source document and the embedding service boundary

pub mod chunking;


use std::fmt;

use crate::providers::ServiceError;

pub use chunking::{
    Chunk, ChunkBuilder, ChunkingConfig, chunk_document, chunk_word_lists, split_paragraphs,
    split_sentences,
};

/// A fixed-dimension embedding of a chunk or a question
pub type EmbeddingVector = Vec<f32>;

/// Outcome of a single embedding call
pub type EmbeddingResult = Result<EmbeddingVector, ServiceError>;

/// Which side of retrieval a text is embedded for.
///
/// Services may compute asymmetric representations for indexed passages and
/// for queries, so the role is always forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingRole {
    Document,
    Query,
}

impl fmt::Display for EmbeddingRole {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Query => write!(f, "query"),
        }
    }
}

/// Converts text into embedding vectors through an external service
pub trait Embedder: Send + Sync {
    /// Dimension every returned vector is expected to have
    fn dimension(&self) -> usize;

    /// Embed one text. A single blocking call with no internal retry.
    fn embed(&self, text: &str, role: EmbeddingRole) -> EmbeddingResult;

    /// How many texts callers should hand to [`Embedder::embed_batch`] at once
    #[inline]
    fn preferred_batch_size(&self) -> usize {
        1
    }

    /// Embed several texts, returning vectors in input order.
    #[inline]
    fn embed_batch(
        &self,
        texts: &[&str],
        role: EmbeddingRole,
    ) -> Result<Vec<EmbeddingVector>, ServiceError> {
        texts.iter().map(|text| self.embed(text, role)).collect()
    }
}
