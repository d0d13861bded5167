//! Steadymark - flicker-free incremental markdown to HTML.
//!
//! This binary streams files or stdin through a steadymark session and
//! prints the HTML it produces.

mod cli;

use clap::Parser as ClapParser;
use cli::{Cli, OutputFormat};
use log::{debug, error, info, trace, LevelFilter};
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};

use steadymark_config::Config;
use steadymark_stream::{StreamEvent, StreamSession};

fn main() {
    let cli = <Cli as ClapParser>::parse();

    // Handle --paths flag
    if cli.show_paths {
        cli::show_paths();
        return;
    }

    // Set up logging
    setup_logging(&cli.log_level);
    info!("Steadymark v{}", env!("CARGO_PKG_VERSION"));

    // Run the main application
    if let Err(e) = run(&cli) {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Set up logging based on the log level argument.
fn setup_logging(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Warn,
    };

    env_logger::Builder::new()
        .filter_level(filter)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

/// Main application logic.
fn run(cli: &Cli) -> io::Result<()> {
    let config = load_config(cli);
    debug!("Loaded config: {:?}", config);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.should_read_stdin() {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            info!("Reading from terminal, finish with Ctrl-D");
        }
        process(stdin.lock(), &config, cli, &mut out)?;
    } else {
        for path in &cli.files {
            info!("Processing file: {}", path.display());
            let file = File::open(path)?;
            process(BufReader::new(file), &config, cli, &mut out)?;
        }
    }

    out.flush()
}

/// Load configuration with optional overrides.
fn load_config(cli: &Cli) -> Config {
    let mut config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load config: {}", e);
        Config::default()
    });

    // Apply config override if provided
    if let Some(ref config_arg) = cli.config {
        match Config::parse_override(config_arg) {
            Ok(override_config) => {
                config.merge(&override_config);
                debug!("Merged config override");
            }
            Err(e) => {
                error!("Failed to load config {}: {}", config_arg, e);
            }
        }
    }

    if let Some(strategy) = cli.strategy {
        config.stream.strategy = strategy;
    }
    if cli.tokens {
        config.stream.token_events = true;
    }

    config
}

/// Stream one input through a fresh session.
fn process<R: BufRead, W: Write>(
    mut reader: R,
    config: &Config,
    cli: &Cli,
    out: &mut W,
) -> io::Result<()> {
    let mut session = StreamSession::new(config);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        trace!("Input line: {:?}", line);

        for piece in cli::chunks(&line, cli.chunk_size) {
            let events = session.write(piece);
            emit(&events, cli.format, out)?;
        }
    }

    let events = session.end();
    emit(&events, cli.format, out)?;
    debug!("{:?}", session);

    if cli.format == OutputFormat::Final {
        out.write_all(session.html().as_bytes())?;
    }
    Ok(())
}

/// Print events in the requested format.
fn emit<W: Write>(events: &[StreamEvent], format: OutputFormat, out: &mut W) -> io::Result<()> {
    for event in events {
        match (format, event) {
            (OutputFormat::Json, _) => {
                let line = serde_json::to_string(event).map_err(io::Error::other)?;
                writeln!(out, "{}", line)?;
            }
            (
                OutputFormat::Html,
                StreamEvent::ContentParsed {
                    html,
                    committed,
                    optimistic,
                    ..
                },
            ) => {
                writeln!(out, "<!-- committed={} optimistic={} -->", committed, optimistic)?;
                out.write_all(html.as_bytes())?;
            }
            (OutputFormat::Html, StreamEvent::TokenGenerated { token, .. }) => {
                writeln!(out, "<!-- {} -->", token)?;
            }
            _ => {}
        }
    }
    out.flush()
}
