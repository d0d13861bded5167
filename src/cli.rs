//! Command-line interface for steadymark.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use steadymark_core::StrategyKind;

/// What to print while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Only the final HTML document
    #[default]
    Final,
    /// Every HTML snapshot as it is produced
    Html,
    /// Every event as a JSON line
    Json,
}

/// Steadymark - flicker-free incremental markdown to HTML.
///
/// Feeds input to a streaming session a few characters at a time, the way
/// a language model emits tokens, and prints the resulting HTML.
#[derive(Parser, Debug)]
#[command(
    name = "smd",
    author = "Steadymark Contributors",
    version,
    about = "Flicker-free incremental markdown to HTML for token streams",
    after_help = "Examples:\n  \
                  cat README.md | smd\n  \
                  smd --format json --chunk-size 1 notes.md\n  \
                  smd --strategy conservative -c custom.toml doc.md"
)]
pub struct Cli {
    /// Input files to process (reads from stdin if not provided)
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "loglevel", default_value = "warn")]
    pub log_level: String,

    /// Use a custom config file or inline TOML
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Boundary strategy (standard, conservative)
    #[arg(long = "strategy")]
    pub strategy: Option<StrategyKind>,

    /// Characters per write
    #[arg(long = "chunk-size", default_value = "8")]
    pub chunk_size: usize,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Final)]
    pub format: OutputFormat,

    /// Report tokenizer output as well
    #[arg(long = "tokens")]
    pub tokens: bool,

    /// Show configuration paths and exit
    #[arg(long = "paths")]
    pub show_paths: bool,
}

impl Cli {
    /// Check if we should read from stdin.
    pub fn should_read_stdin(&self) -> bool {
        self.files.is_empty()
    }
}

/// Split `text` into pieces of at most `size` characters.
pub fn chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let split = rest.char_indices().nth(size).map_or(rest.len(), |(i, _)| i);
        let (piece, tail) = rest.split_at(split);
        pieces.push(piece);
        rest = tail;
    }
    pieces
}

/// Show paths information.
pub fn show_paths() {
    use steadymark_config::Config;

    let config_path = Config::config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not found)".to_string());

    println!("paths:");
    println!("  config                {}", config_path);
}
