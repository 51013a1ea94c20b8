use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use owo_colors::OwoColorize;
use xxkcd_core::{ClientConfig, Comic, Key, KeyInput, MemoryTransport, RawMetadata, WhatIf, Xkcd, constants};

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: text, json", s)),
        }
    }
}

/// Accepts what the library accepts, so bad keys fail before any request.
fn parse_key(s: &str) -> Result<KeyInput, String> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("latest") {
        return Ok(KeyInput::Latest);
    }
    trimmed
        .parse::<i64>()
        .map(KeyInput::Number)
        .map_err(|_| format!("Invalid key: {s:?} (expected an integer or \"latest\")"))
}

/// Read xkcd comics and what-if articles
#[derive(Parser, Debug)]
#[command(name = "xxkcd")]
#[command(author = "Mital Ashok")]
#[command(version)]
#[command(about = "Read xkcd comics and what-if articles", long_about = None)]
struct Args {
    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS", global = true)]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA", global = true)]
    user_agent: Option<String>,

    /// Worker threads for bulk loading
    #[arg(long, default_value = "4", value_name = "NUM", global = true)]
    workers: usize,

    /// Serve comics from a JSON snapshot (an array of API records) instead of the network
    #[arg(long, value_name = "FILE", global = true)]
    snapshot: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one comic (default: the latest)
    Comic {
        /// Comic number, negative to count from the newest, or "latest"
        #[arg(value_name = "KEY", value_parser = parse_key, allow_negative_numbers = true)]
        key: Option<KeyInput>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_name = "FORMAT")]
        format: OutputFormat,
    },
    /// Download a comic's image
    Image {
        /// Comic number, negative to count from the newest, or "latest"
        #[arg(value_name = "KEY", value_parser = parse_key, allow_negative_numbers = true)]
        key: Option<KeyInput>,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// List comic titles
    Titles {
        /// First comic (default: 1)
        #[arg(long, value_name = "KEY", value_parser = parse_key, allow_negative_numbers = true)]
        from: Option<KeyInput>,

        /// Last comic, inclusive (default: latest)
        #[arg(long, value_name = "KEY", value_parser = parse_key, allow_negative_numbers = true)]
        to: Option<KeyInput>,

        /// Newest first
        #[arg(long)]
        reverse: bool,

        /// Fetch every comic up front using the worker pool
        #[arg(long)]
        preload: bool,
    },
    /// Show one what-if article (default: the latest)
    WhatIf {
        /// Article number, negative to count from the newest, or "latest"
        #[arg(value_name = "KEY", value_parser = parse_key, allow_negative_numbers = true)]
        key: Option<KeyInput>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_name = "FORMAT")]
        format: OutputFormat,
    },
    /// List every what-if article
    Archive,
    /// Generate a shell completion script
    Completions {
        #[arg(value_enum, value_name = "SHELL")]
        shell: Shell,
    },
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose { EnvFilter::new("xxkcd_core=debug,info") } else { EnvFilter::new("warn") }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn client_config(args: &Args) -> ClientConfig {
    let mut builder = ClientConfig::builder().timeout(args.timeout).workers(args.workers);
    if let Some(user_agent) = &args.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    builder.build()
}

fn xkcd_client(args: &Args) -> anyhow::Result<Xkcd> {
    let config = client_config(args);
    match &args.snapshot {
        Some(path) => load_snapshot(path, config),
        None => Xkcd::with_config(config).context("Failed to build HTTP client"),
    }
}

/// A client that never touches the network: every record in the snapshot is
/// pinned, and the newest one answers for the latest comic.
fn load_snapshot(path: &Path, config: ClientConfig) -> anyhow::Result<Xkcd> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let records: Vec<RawMetadata> =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;

    let transport = Arc::new(MemoryTransport::new());
    if let Some(newest) = records.iter().max_by_key(|record| record.num) {
        transport.insert(constants::XKCD_LATEST_JSON, serde_json::to_vec(newest)?);
    }

    let client = Xkcd::with_transport(config, transport);
    let count = records.len();
    for record in records {
        client.preload(record);
    }
    tracing::debug!(count, path = %path.display(), "loaded snapshot");
    Ok(client)
}

fn show_comic(client: &Xkcd, key: KeyInput, format: OutputFormat) -> anyhow::Result<()> {
    let comic = client.comic(key).context("Failed to look up comic")?;
    match format {
        OutputFormat::Json => {
            let metadata = comic.metadata().with_context(|| format!("Failed to load {comic}"))?;
            println!("{}", serde_json::to_string_pretty(&*metadata)?);
        }
        OutputFormat::Text => echo::print_comic(&comic).with_context(|| format!("Failed to load {comic}"))?,
    }
    Ok(())
}

fn save_image(client: &Xkcd, key: KeyInput, output: Option<PathBuf>) -> anyhow::Result<()> {
    let comic = client.comic(key).context("Failed to look up comic")?;
    match output {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("Failed to create file: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            let written = comic.copy_image_to(&mut writer).with_context(|| format!("Failed to download image of {comic}"))?;
            echo::print_success(&format!(
                "Wrote {} to {}",
                echo::format_size(written),
                path.display().bright_white()
            ));
        }
        None => {
            let mut stdout = io::stdout().lock();
            comic.copy_image_to(&mut stdout).with_context(|| format!("Failed to download image of {comic}"))?;
        }
    }
    Ok(())
}

fn list_titles(client: &Xkcd, from: KeyInput, to: KeyInput, reverse: bool, preload: bool) -> anyhow::Result<()> {
    if preload {
        client.load_all(true).context("Failed to load comics")?;
    }

    let last = client.comic(to).context("Failed to look up last comic")?.number()?;
    let comics = client.range(from, Key::Number(last.saturating_add(1)), 1)?;
    let comics: Box<dyn Iterator<Item = Comic>> = if reverse { Box::new(comics.rev()) } else { Box::new(comics) };

    let mut out = io::stdout().lock();
    for comic in comics {
        match comic.title() {
            Ok(title) => writeln!(out, "{:>5}  {}", comic.number()?, title)?,
            Err(err) => echo::print_warning(&format!("{comic}: {err}")),
        }
    }
    out.flush()?;
    Ok(())
}

fn show_article(client: &WhatIf, key: KeyInput, format: OutputFormat) -> anyhow::Result<()> {
    let article = client.article(key).context("Failed to look up article")?;
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "number": article.number()?,
                "title": article.title()?,
                "date": article.date()?.to_string(),
                "url": article.url(),
                "image": article.image()?,
                "question": article.question()?,
                "attribute": article.attribute()?,
                "body": article.body()?,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => echo::print_article(&article).with_context(|| format!("Failed to load {article}"))?,
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    let started = Instant::now();
    match &args.command {
        Command::Comic { key, format } => {
            let client = xkcd_client(&args)?;
            show_comic(&client, key.clone().unwrap_or(KeyInput::Latest), *format)?;
        }
        Command::Image { key, output } => {
            let client = xkcd_client(&args)?;
            save_image(&client, key.clone().unwrap_or(KeyInput::Latest), output.clone())?;
        }
        Command::Titles { from, to, reverse, preload } => {
            let client = xkcd_client(&args)?;
            let from = from.clone().unwrap_or(KeyInput::Number(1));
            let to = to.clone().unwrap_or(KeyInput::Latest);
            list_titles(&client, from, to, *reverse, *preload)?;
        }
        Command::WhatIf { key, format } => {
            let client = WhatIf::with_config(client_config(&args)).context("Failed to build HTTP client")?;
            show_article(&client, key.clone().unwrap_or(KeyInput::Latest), *format)?;
        }
        Command::Archive => {
            let client = WhatIf::with_config(client_config(&args)).context("Failed to build HTTP client")?;
            let archive = client.archive().context("Failed to load the what-if archive")?;
            echo::print_archive(&archive);
        }
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Args::command(), "xxkcd", &mut io::stdout());
        }
    }

    if args.verbose {
        eprintln!();
        echo::print_timing("Total", started.elapsed());
    }

    Ok(())
}
