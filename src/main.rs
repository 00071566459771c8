mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tagmem::config::TagmemConfig;

#[derive(Parser)]
#[command(name = "tagmem", version, about = "Conversational agent with tag-indexed memory")]
struct Cli {
    /// Config file (default: ~/.tagmem/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive conversation
    Chat,
    /// Rank stored content against tags (promotes returned rows)
    Search {
        #[arg(required = true)]
        tags: Vec<String>,
        /// Maximum rows (default: memory.long_term_top_results)
        #[arg(long)]
        limit: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one content item with its tags
    Inspect {
        id: i64,
        /// Print the item as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show tag store statistics
    Stats {
        /// Number of most-used tags to list
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Permanently delete one content item
    Forget { id: i64 },
    /// Delete all content and tags of the agent
    Reset,
    /// Check database integrity
    Doctor {
        /// Print the health report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TagmemConfig::load_from(path)?,
        None => TagmemConfig::load()?,
    };

    // Log to stderr so replies on stdout stay readable.
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Chat => cli::chat::chat(&config).await?,
        Command::Search { tags, limit, json } => {
            cli::search::search(&config, &tags, limit, json)?
        }
        Command::Inspect { id, json } => cli::inspect::inspect(&config, id, json)?,
        Command::Stats { top, json } => cli::stats::stats(&config, top, json)?,
        Command::Forget { id } => cli::forget::forget(&config, id)?,
        Command::Reset => cli::reset::reset(&config)?,
        Command::Doctor { json } => cli::doctor::doctor(&config, json)?,
    }

    Ok(())
}
