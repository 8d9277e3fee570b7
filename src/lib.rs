use thiserror::Error;

use crate::providers::ServiceError;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(#[source] ServiceError),

    #[error("Generation service error: {0}")]
    GenerationService(#[source] ServiceError),

    #[error("Dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector index is empty")]
    EmptyIndex,

    #[error("Index build failed: {reason}")]
    IndexBuild {
        reason: String,
        #[source]
        source: Option<Box<QaError>>,
    },

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl QaError {
    pub(crate) fn index_build(reason: impl Into<String>, source: Option<Self>) -> Self {
        Self::IndexBuild {
            reason: reason.into(),
            source: source.map(Box::new),
        }
    }

    /// Whether retrying the same call may succeed without any other change.
    #[inline]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::EmbeddingService(e) | Self::GenerationService(e) => e.is_transient(),
            Self::IndexBuild {
                source: Some(source),
                ..
            } => source.is_transient(),
            _ => false,
        }
    }
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod providers;
pub mod retriever;
