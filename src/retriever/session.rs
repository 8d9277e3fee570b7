use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use itertools::Itertools as _;
use uuid::Uuid;

use crate::embeddings::Chunk;
use crate::index::{SearchHit, VectorIndex};
use crate::{QaError, Result};

/// The chunks of one document in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    #[inline]
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }

    /// Words across all chunks, counting overlapped words once per chunk
    #[inline]
    pub fn total_words(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.word_count).sum()
    }
}

impl<'a> IntoIterator for &'a ChunkStore {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An indexed document, ready to answer questions.
///
/// A session never changes after it is built. Replacing the document means
/// building a new session and swapping it in; queries already running against
/// the old one are unaffected.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    built_at: DateTime<Utc>,
    source: Option<PathBuf>,
    chunks: ChunkStore,
    index: VectorIndex,
}

impl Session {
    /// Assemble a session from chunks and an index whose row `i` embeds
    /// chunk `i`
    #[inline]
    pub fn from_parts(
        chunks: Vec<Chunk>,
        index: VectorIndex,
        source: Option<PathBuf>,
    ) -> Result<Self> {
        if chunks.len() != index.len() {
            return Err(QaError::index_build(
                format!(
                    "{} chunks but {} indexed vectors",
                    chunks.len(),
                    index.len()
                ),
                None,
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            built_at: Utc::now(),
            source,
            chunks: ChunkStore::new(chunks),
            index,
        })
    }

    /// Record the file the document text was read from
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: PathBuf) -> Self {
        self.source = Some(source);
        self
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// File the document was read from, if it came from a file
    #[inline]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    #[inline]
    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Join the texts of the hit chunks with newlines, in hit order
    #[inline]
    pub fn context_for(&self, hits: &[SearchHit]) -> Result<String> {
        let texts = hits.iter().map(|hit| {
            self.chunks
                .get(hit.index)
                .map(|chunk| chunk.text.as_str())
                .ok_or_else(|| {
                    QaError::Retrieval(format!(
                        "hit {} is outside the {} stored chunks",
                        hit.index,
                        self.chunks.len()
                    ))
                })
        });

        itertools::process_results(texts, |mut texts| texts.join("\n"))
    }
}
