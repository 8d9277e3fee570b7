use anyhow::{Context, Result};
use console::style;
use itertools::{Itertools, MinMaxResult};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{ChunkingConfig, chunk_document};
use crate::retriever::{Answer, DocumentSource, Retriever, Session};

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const PREVIEW_WIDTH: usize = 96;

/// How often, and how patiently, to repeat a call that failed transiently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; zero behaves like one
    pub attempts: u32,
    /// Wait before the second attempt; doubles for each later attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based)
    #[inline]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of
    /// attempts
    #[inline]
    pub fn run<T, F>(&self, mut operation: F) -> crate::Result<T>
    where
        F: FnMut() -> crate::Result<T>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Transient failure on attempt {}/{}: {}; retrying in {:?}",
                        attempt, attempts, error, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Options shared by the question-answering commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub top_k: usize,
    pub show_sources: bool,
    pub retry: RetryPolicy,
}

/// Print chunk statistics for a document without calling any service
#[inline]
pub fn show_chunks(path: &Path, chunking: &ChunkingConfig, preview: bool) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let chunks = chunk_document(&text, chunking).context("Failed to chunk document")?;

    println!("Document: {}", path.display());
    println!(
        "  Chunk size: {} words, overlap: {} words",
        chunking.chunk_size, chunking.overlap
    );
    println!("  Words in document: {}", text.split_whitespace().count());
    println!("  Chunks: {}", chunks.len());

    match chunks.iter().map(|chunk| chunk.word_count).minmax() {
        MinMaxResult::NoElements => {}
        MinMaxResult::OneElement(words) => println!("  Words per chunk: {}", words),
        MinMaxResult::MinMax(min, max) => {
            let total: usize = chunks.iter().map(|chunk| chunk.word_count).sum();
            println!(
                "  Words per chunk: min {}, max {}, avg {}",
                min,
                max,
                total / chunks.len()
            );
        }
    }

    if preview {
        println!();
        for chunk in &chunks {
            println!(
                "[{}] ({} words) {}",
                chunk.index,
                chunk.word_count,
                preview_text(&chunk.text)
            );
        }
    }

    Ok(())
}

/// Read, check and index a document
#[inline]
pub fn load_session(
    retriever: &Retriever,
    path: &Path,
    config: &Config,
    retry: &RetryPolicy,
) -> Result<Session> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;

    let length = text.trim().chars().count();
    if length < config.session.min_document_chars {
        anyhow::bail!(
            "Document {} is too short to index ({} characters, at least {} required)",
            path.display(),
            length,
            config.session.min_document_chars
        );
    }

    info!("Indexing {} ({} characters)", path.display(), length);

    let session = retry
        .run(|| retriever.build_session(DocumentSource::Text(text.clone()), &config.chunking))
        .with_context(|| format!("Failed to index document: {}", path.display()))?;

    Ok(session.with_source(path.to_path_buf()))
}

/// Answer a question, retrying transient service failures
#[inline]
pub fn answer_with_retry(
    retriever: &Retriever,
    session: &Session,
    question: &str,
    options: &QueryOptions,
) -> crate::Result<Answer> {
    options
        .retry
        .run(|| retriever.answer(session, question, options.top_k))
}

/// Index a document and answer a single question about it
#[inline]
pub fn ask(config: &Config, path: &Path, question: &str, options: &QueryOptions) -> Result<()> {
    if question.trim().is_empty() {
        warn!("Ignoring blank question");
        eprintln!("{}", style("Please enter a question.").yellow());
        return Ok(());
    }

    let retriever = Retriever::from_config(config).context("Failed to set up services")?;
    let session = load_session(&retriever, path, config, &options.retry)?;

    let answer = answer_with_retry(&retriever, &session, question.trim(), options)
        .context("Failed to answer question")?;

    let stdout = io::stdout();
    write_answer(&mut stdout.lock(), &session, &answer, options.show_sources)?;
    Ok(())
}

/// Index a document and answer questions from standard input until `:quit`
#[inline]
pub fn chat(config: &Config, path: &Path, options: &QueryOptions) -> Result<()> {
    let retriever = Retriever::from_config(config).context("Failed to set up services")?;
    let session = load_session(&retriever, path, config, &options.retry)?;

    eprintln!(
        "{} {} ({} chunks)",
        style("Loaded").green(),
        path.display(),
        session.len()
    );
    eprintln!(
        "{}",
        style("Ask a question, or use :load <path>, :chunks, :quit").dim()
    );

    let stdin = io::stdin();
    run_chat(
        &retriever,
        Arc::new(session),
        config,
        options,
        stdin.lock(),
        io::stdout(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatInput<'a> {
    Empty,
    Quit,
    Chunks,
    Load(&'a str),
    Question(&'a str),
    Unknown(&'a str),
}

fn parse_chat_input(line: &str) -> ChatInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }

    let Some(command) = line.strip_prefix(':') else {
        return ChatInput::Question(line);
    };

    let (name, argument) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, argument)| (name, argument.trim()));

    match (name, argument) {
        ("quit" | "q" | "exit", _) => ChatInput::Quit,
        ("chunks", _) => ChatInput::Chunks,
        ("load", path) if !path.is_empty() => ChatInput::Load(path),
        _ => ChatInput::Unknown(line),
    }
}

/// Drive the chat loop over arbitrary input and output.
///
/// `:load` builds a complete new session before replacing the current one,
/// so a failed load leaves the previous document in place.
#[inline]
pub fn run_chat<R: BufRead, W: Write>(
    retriever: &Retriever,
    mut session: Arc<Session>,
    config: &Config,
    options: &QueryOptions,
    input: R,
    mut output: W,
) -> Result<()> {
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        let line = line.context("Failed to read input")?;

        match parse_chat_input(&line) {
            ChatInput::Quit => break,
            ChatInput::Empty => {}
            ChatInput::Chunks => write_session_summary(&mut output, &session)?,
            ChatInput::Load(path) => {
                match load_session(retriever, Path::new(path), config, &options.retry) {
                    Ok(loaded) => {
                        session = Arc::new(loaded);
                        writeln!(output, "Loaded {} ({} chunks)", path, session.len())?;
                    }
                    Err(e) => writeln!(output, "Could not load {}: {:#}", path, e)?,
                }
            }
            ChatInput::Question(question) => {
                match answer_with_retry(retriever, &session, question, options) {
                    Ok(answer) => write_answer(&mut output, &session, &answer, options.show_sources)?,
                    Err(e) => writeln!(output, "Error: {}", e)?,
                }
            }
            ChatInput::Unknown(command) => writeln!(
                output,
                "Unknown command: {} (try :load <path>, :chunks or :quit)",
                command
            )?,
        }

        write!(output, "> ")?;
        output.flush()?;
    }

    writeln!(output)?;
    Ok(())
}

fn write_answer<W: Write>(
    output: &mut W,
    session: &Session,
    answer: &Answer,
    show_sources: bool,
) -> io::Result<()> {
    writeln!(output, "{}", answer.text.trim_end())?;

    if show_sources {
        writeln!(output)?;
        writeln!(output, "Sources:")?;
        for (rank, hit) in answer.sources.iter().enumerate() {
            let text = session
                .chunks()
                .get(hit.index)
                .map_or("", |chunk| chunk.text.as_str());
            writeln!(
                output,
                "  {}. chunk {} (distance {:.4}) {}",
                rank + 1,
                hit.index,
                hit.distance,
                preview_text(text)
            )?;
        }
    }

    Ok(())
}

fn write_session_summary<W: Write>(output: &mut W, session: &Session) -> io::Result<()> {
    write!(output, "Session {}", session.id())?;
    if let Some(source) = session.source() {
        write!(output, " from {}", source.display())?;
    }
    writeln!(
        output,
        " built {}: {} chunks, {} words",
        session.built_at().format("%Y-%m-%d %H:%M:%S UTC"),
        session.len(),
        session.chunks().total_words()
    )
}

fn preview_text(text: &str) -> String {
    let single_line = text.split_whitespace().join(" ");
    console::truncate_str(&single_line, PREVIEW_WIDTH, "...").into_owned()
}
