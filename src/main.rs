//! search-relay CLI - drives the search orchestrator from the command line.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use search_relay::{NormalizedSearchResult, RelayConfig, Search, SearchQuery, ThrottledQueue};

/// search-relay - rate-limited multi-provider search
#[derive(Parser)]
#[command(name = "search-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the configured providers
    Search(SearchArgs),

    /// List configured providers
    Providers,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Maximum number of entries to display per section
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Also query the supplemental provider and merge its results
    #[arg(short, long)]
    supplemental: bool,

    /// Grace period in milliseconds before the fallback provider starts
    #[arg(short, long)]
    grace_ms: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = RelayConfig::from_env();

    match cli.command {
        Commands::Search(args) => {
            if let Some(grace_ms) = args.grace_ms {
                config.race.grace_period_ms = grace_ms;
            }
            run_search(&config, args).await
        }
        Commands::Providers => list_providers(&config),
    }
}

fn build(config: &RelayConfig) -> Result<(Search, Arc<ThrottledQueue>)> {
    let queue = Arc::new(ThrottledQueue::new(config.queue.clone())?);
    let search = Search::from_config(config, Arc::clone(&queue))?;
    Ok((search, queue))
}

fn list_providers(config: &RelayConfig) -> Result<()> {
    let (search, _queue) = build(config)?;
    println!("Configured providers:\n");
    if search.provider_count() == 0 {
        println!("  (none) set SEARCH_API_KEY, TAVILY_API_KEY or SEARXNG_URL");
    }
    for name in search.provider_names() {
        println!("  {}", name);
    }
    Ok(())
}

async fn run_search(config: &RelayConfig, args: SearchArgs) -> Result<()> {
    let (search, queue) = build(config)?;
    if search.provider_count() == 0 {
        anyhow::bail!("No providers configured");
    }

    let query = SearchQuery::new(&args.query);
    let results = if args.supplemental {
        search.search_all(query).await
    } else {
        search.search(query).await
    };
    queue.teardown();
    let results = results?;

    match args.format {
        OutputFormat::Text => print_text(&args.query, &results, args.limit),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Compact => {
            for result in results.web.iter().chain(&results.news).take(args.limit) {
                println!("{}\t{}", result.title, result.url);
            }
        }
    }

    Ok(())
}

fn print_text(query: &str, results: &NormalizedSearchResult, limit: usize) {
    println!("\nSearch results for \"{}\" ({} entries):\n", query, results.len());

    for (i, result) in results.web.iter().take(limit).enumerate() {
        println!("{}. {}", i + 1, result.title);
        println!("   URL: {}", result.url);
        if !result.content.is_empty() {
            let content: String = result.content.chars().take(150).collect();
            println!("   {}", content);
        }
        println!();
    }

    if !results.news.is_empty() {
        println!("News:");
        for result in results.news.iter().take(limit) {
            let date = result.published_date.as_deref().unwrap_or("-");
            println!("  [{}] {} - {}", date, result.title, result.url);
        }
        println!();
    }
    if !results.images.is_empty() {
        println!("Images:");
        for image in results.images.iter().take(limit) {
            println!("  {} ({})", image.url, image.alt_text);
        }
        println!();
    }
    if !results.videos.is_empty() {
        println!("Videos:");
        for video in results.videos.iter().take(limit) {
            println!("  {} [{}] {}", video.title, video.duration, video.url);
        }
    }
}
