// Vector index module
// Exact nearest-neighbour search over the embeddings of one document


use tracing::debug;

use crate::{QaError, Result};

/// One search result: a row of the index and its distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Row in the index, equal to the chunk's position in the document
    pub index: usize,
    /// Squared Euclidean distance to the query vector
    pub distance: f32,
}

/// Hits in ascending distance order, best match first
pub type QueryResult = Vec<SearchHit>;

/// Collects rows for a [`VectorIndex`], checking that every vector has the
/// same dimension
#[derive(Debug, Default)]
pub struct VectorIndexBuilder {
    dimension: Option<usize>,
    rows: usize,
    data: Vec<f32>,
}

impl VectorIndexBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require every row to have `dimension` components instead of taking
    /// the dimension from the first row
    #[inline]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Append a row and return its index
    #[inline]
    pub fn push(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.is_empty() {
            return Err(QaError::index_build("embedding vector has no components", None));
        }

        let expected = *self.dimension.get_or_insert(vector.len());
        if vector.len() != expected {
            return Err(QaError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        self.data.extend_from_slice(vector);
        self.rows += 1;
        Ok(self.rows - 1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    pub fn build(self) -> VectorIndex {
        debug!(
            "Built vector index with {} rows of dimension {}",
            self.rows,
            self.dimension.unwrap_or(0)
        );
        VectorIndex {
            dimension: self.dimension,
            rows: self.rows,
            data: self.data,
        }
    }
}

/// Read-only matrix of embeddings, one row per chunk, stored row-major
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    rows: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from rows in order. Fails if any row's dimension
    /// differs from the first row's.
    #[inline]
    pub fn build<I, V>(vectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[f32]>,
    {
        let mut builder = VectorIndexBuilder::new();
        for vector in vectors {
            builder.push(vector.as_ref())?;
        }
        Ok(builder.build())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Dimension of every row, or `None` for an index with no rows and no
    /// declared dimension
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// The row at `index`, if present
    #[inline]
    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        self.dimension
            .filter(|_| index < self.rows)
            .and_then(|dimension| self.data.chunks_exact(dimension).nth(index))
    }

    /// Return the `k` rows closest to `query` by squared Euclidean distance.
    ///
    /// Results are sorted by ascending distance with ties broken by lower row
    /// index. Asking for more rows than exist returns every row.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<QueryResult> {
        let Some(dimension) = self.dimension.filter(|_| self.rows > 0) else {
            return Err(QaError::EmptyIndex);
        };

        if query.len() != dimension {
            return Err(QaError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(index, row)| SearchHit {
                index,
                distance: squared_l2(query, row),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.index.cmp(&b.index))
        });
        hits.truncate(k);

        Ok(hits)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).fold(0.0, |acc, (x, y)| {
        let diff = x - y;
        diff.mul_add(diff, acc)
    })
}
