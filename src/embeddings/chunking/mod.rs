#[cfg(test)]
mod tests;

use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::{QaError, Result};

/// One or more blank lines
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"));

/// Words after which a Unicode sentence boundary is not a real sentence end
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "e.g.", "i.e.", "approx.",
    "fig.",
];

/// Characters that can end a sentence
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '…'];

/// Characters allowed between a terminator and the end of a sentence
const CLOSING_PUNCTUATION: &[char] = &['"', '\'', '”', '’', ')', ']', '»'];

/// A chunk of the document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in the document, also its row in the vector index
    pub index: usize,
    /// The chunk's words joined by single spaces
    pub text: String,
    /// Number of whitespace-delimited words in the chunk
    pub word_count: usize,
}

/// Configuration for document chunking. Both sizes count words.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Word count above which a new chunk is started before the next sentence
    pub chunk_size: usize,
    /// Words carried over from the tail of a closed chunk into the next one
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 100,
        }
    }
}

/// Accumulates sentences into overlapping, word-bounded chunks.
///
/// Sentences are atomic: the size check happens before a sentence is added,
/// so a sentence longer than `chunk_size` lands whole in one chunk. When a
/// chunk closes, the next one is seeded with the last `overlap` words of the
/// closed chunk exactly as they were accumulated, which may include words that
/// were themselves carried over from the chunk before it.
#[derive(Debug)]
pub struct ChunkBuilder<'a> {
    chunk_size: usize,
    overlap: usize,
    current: Vec<&'a str>,
    closed: Vec<Vec<&'a str>>,
}

impl<'a> ChunkBuilder<'a> {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
            current: Vec::new(),
            closed: Vec::new(),
        }
    }

    /// Add one sentence, closing the current chunk first if it would overflow
    #[inline]
    pub fn push_sentence(&mut self, sentence: &'a str) {
        let words: Vec<&'a str> = sentence.split_whitespace().collect();
        if words.is_empty() {
            return;
        }

        // An empty accumulator is never closed, so no chunk is ever empty
        if !self.current.is_empty() && self.current.len() + words.len() > self.chunk_size {
            let closed = std::mem::take(&mut self.current);
            self.current = overlap_tail(&closed, self.overlap).to_vec();
            self.closed.push(closed);
        }

        self.current.extend(words);
    }

    /// Close the last chunk and return every chunk's word list in order
    #[inline]
    pub fn finish(mut self) -> Vec<Vec<&'a str>> {
        if !self.current.is_empty() {
            self.closed.push(self.current);
        }
        self.closed
    }
}

fn overlap_tail<'c, 'a>(closed: &'c [&'a str], overlap: usize) -> &'c [&'a str] {
    if overlap == 0 || closed.len() < overlap {
        return &[];
    }
    closed.split_at(closed.len() - overlap).1
}

/// Split a document into paragraphs on blank lines
#[inline]
#[expect(
    clippy::string_slice,
    reason = "offsets come from regex match boundaries"
)]
pub fn split_paragraphs(text: &str) -> Result<Vec<&str>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut paragraphs = Vec::new();
    let mut start = 0;
    for found in PARAGRAPH_BREAK.find_iter(text) {
        let found =
            found.map_err(|e| QaError::Chunking(format!("Failed to split paragraphs: {}", e)))?;
        paragraphs.push(&text[start..found.start()]);
        start = found.end();
    }
    paragraphs.push(&text[start..]);

    Ok(paragraphs)
}

/// Split a paragraph into sentences.
///
/// Boundaries follow Unicode sentence segmentation, keeping only those that
/// follow a terminator (`.`, `!`, `?` or `…`, optionally closed by quotes or
/// brackets) and do not follow a known abbreviation. Line breaks inside a
/// hard-wrapped sentence therefore never split it. Sentences are trimmed
/// slices of the input; text with no detectable boundary comes back as one
/// sentence.
#[inline]
#[expect(
    clippy::string_slice,
    reason = "offsets come from sentence boundary indices"
)]
pub fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut merge_from: Option<usize> = None;

    for (offset, segment) in paragraph.split_sentence_bound_indices() {
        let start = merge_from.take().unwrap_or(offset);
        if !ends_with_terminator(segment) || ends_with_abbreviation(segment) {
            merge_from = Some(start);
            continue;
        }
        push_trimmed(&mut sentences, &paragraph[start..offset + segment.len()]);
    }

    if let Some(start) = merge_from {
        push_trimmed(&mut sentences, &paragraph[start..]);
    }

    if sentences.is_empty() {
        push_trimmed(&mut sentences, paragraph);
    }

    sentences
}

fn push_trimmed<'a>(sentences: &mut Vec<&'a str>, sentence: &'a str) {
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}

fn ends_with_terminator(segment: &str) -> bool {
    segment
        .trim_end()
        .trim_end_matches(CLOSING_PUNCTUATION)
        .ends_with(SENTENCE_TERMINATORS)
}

fn ends_with_abbreviation(segment: &str) -> bool {
    segment.split_whitespace().next_back().is_some_and(|word| {
        let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
        ABBREVIATIONS
            .iter()
            .any(|abbreviation| word.eq_ignore_ascii_case(abbreviation))
    })
}

/// Chunk a document into per-chunk word lists, borrowing from `text`
#[inline]
pub fn chunk_word_lists<'a>(text: &'a str, config: &ChunkingConfig) -> Result<Vec<Vec<&'a str>>> {
    let mut builder = ChunkBuilder::new(config);

    for paragraph in split_paragraphs(text)? {
        for sentence in split_sentences(paragraph) {
            builder.push_sentence(sentence);
        }
    }

    Ok(builder.finish())
}

/// Chunk a document into embedding-ready chunks
#[inline]
pub fn chunk_document(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let chunks: Vec<Chunk> = chunk_word_lists(text, config)?
        .into_iter()
        .enumerate()
        .map(|(index, words)| Chunk {
            index,
            text: words.join(" "),
            word_count: words.len(),
        })
        .collect();

    debug!(
        "Chunked document into {} chunks (avg {} words, chunk_size {}, overlap {})",
        chunks.len(),
        chunks.iter().map(|c| c.word_count).sum::<usize>() / chunks.len().max(1),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}
