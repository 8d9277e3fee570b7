use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docs_qa::commands::{QueryOptions, RetryPolicy, ask, chat, show_chunks};
use docs_qa::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "docs-qa")]
#[command(about = "Ask questions about a markdown document, answered only from its content")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and generation provider
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show how a document would be chunked, without calling any service
    Chunks {
        /// Path to the markdown document
        document: PathBuf,
        /// Target words per chunk
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Words repeated between consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,
        /// Print a one-line preview of every chunk
        #[arg(long)]
        preview: bool,
    },
    /// Answer one question about a document
    Ask {
        /// Path to the markdown document
        document: PathBuf,
        /// The question; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Number of chunks used as context
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        /// Also print the chunks the answer was based on
        #[arg(long)]
        sources: bool,
        /// Attempts for each service call that fails transiently
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
    /// Index a document and answer questions interactively
    Chat {
        /// Path to the markdown document
        document: PathBuf,
        /// Number of chunks used as context
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        /// Also print the chunks each answer was based on
        #[arg(long)]
        sources: bool,
        /// Attempts for each service call that fails transiently
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
}

fn query_options(
    config: &mut Config,
    top_k: Option<usize>,
    sources: bool,
    retries: u32,
) -> Result<QueryOptions> {
    if let Some(top_k) = top_k {
        config.set_top_k(top_k).context("Invalid --top-k")?;
    }

    Ok(QueryOptions {
        top_k: config.retrieval.top_k,
        show_sources: sources,
        retry: RetryPolicy {
            attempts: retries.max(1),
            base_delay: Duration::from_secs(1),
        },
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Chunks {
            document,
            chunk_size,
            overlap,
            preview,
        } => {
            let mut config = Config::load_default()?;
            let chunk_size = chunk_size.unwrap_or(config.chunking.chunk_size);
            let overlap = overlap.unwrap_or(config.chunking.overlap);
            config
                .set_chunking(chunk_size, overlap)
                .context("Invalid chunking options")?;
            show_chunks(&document, &config.chunking, preview)?;
        }
        Commands::Ask {
            document,
            question,
            top_k,
            sources,
            retries,
        } => {
            let mut config = Config::load_default()?;
            let options = query_options(&mut config, top_k, sources, retries)?;
            ask(&config, &document, &question.join(" "), &options)?;
        }
        Commands::Chat {
            document,
            top_k,
            sources,
            retries,
        } => {
            let mut config = Config::load_default()?;
            let options = query_options(&mut config, top_k, sources, retries)?;
            chat(&config, &document, &options)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn ask_command_joins_question() {
        let cli = Cli::try_parse_from([
            "docs-qa",
            "ask",
            "brochure.md",
            "How",
            "many",
            "floors?",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask {
                document,
                question,
                top_k,
                sources,
                retries,
            } = parsed.command
            {
                assert_eq!(document, PathBuf::from("brochure.md"));
                assert_eq!(question.join(" "), "How many floors?");
                assert_eq!(top_k, None);
                assert!(!sources);
                assert_eq!(retries, 3);
            }
        }
    }

    #[test]
    fn ask_requires_question() {
        let cli = Cli::try_parse_from(["docs-qa", "ask", "brochure.md"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn chat_command_with_options() {
        let cli = Cli::try_parse_from([
            "docs-qa",
            "chat",
            "brochure.md",
            "-k",
            "5",
            "--sources",
            "--retries",
            "1",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Chat {
                top_k,
                sources,
                retries,
                ..
            } = parsed.command
            {
                assert_eq!(top_k, Some(5));
                assert!(sources);
                assert_eq!(retries, 1);
            }
        }
    }

    #[test]
    fn chunks_command_overrides() {
        let cli = Cli::try_parse_from([
            "docs-qa",
            "chunks",
            "brochure.md",
            "--chunk-size",
            "200",
            "--overlap",
            "20",
            "--preview",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Chunks {
                chunk_size,
                overlap,
                preview,
                ..
            } = parsed.command
            {
                assert_eq!(chunk_size, Some(200));
                assert_eq!(overlap, Some(20));
                assert!(preview);
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["docs-qa", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn top_k_override_is_validated() {
        let mut config = Config::default();
        assert!(query_options(&mut config, Some(0), false, 3).is_err());

        let options = query_options(&mut config, Some(7), true, 0).expect("valid options");
        assert_eq!(options.top_k, 7);
        assert!(options.show_sources);
        assert_eq!(options.retry.attempts, 1);
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["docs-qa", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["docs-qa", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
