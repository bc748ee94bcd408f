//! wikidb CLI
//!
//! Command-line tools for wikidb stores.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics
//! - `search` - Run a query clause against a wiki
//! - `backlinks` - List the pages linking to a page
//! - `compact` - Fold the journal into a single snapshot

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// wikidb command-line store tools.
#[derive(Parser)]
#[command(name = "wikidb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a query clause and print the matching page names
    Search {
        /// Clause, e.g. "where doc.space = ? order by doc.name"
        clause: String,

        /// Positional parameter, repeatable
        #[arg(long = "param")]
        params: Vec<String>,

        /// Wiki to search (defaults to the main wiki)
        #[arg(short, long)]
        wiki: Option<String>,

        /// Maximum number of results (0 for all)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Number of results to skip
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Allow class property columns
        #[arg(long)]
        mapped: bool,

        /// Return one row per translation
        #[arg(long)]
        distinct: bool,

        /// Print the match count instead of the names
        #[arg(long)]
        count: bool,
    },

    /// List the pages linking to a page
    Backlinks {
        /// Page reference, e.g. "Main.WebHome"
        reference: String,

        /// Wiki to look in (defaults to the main wiki)
        #[arg(short, long)]
        wiki: Option<String>,
    },

    /// Fold the journal into a single snapshot
    Compact {
        /// Dry run - show the journal size only
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Search {
            clause,
            params,
            wiki,
            limit,
            offset,
            mapped,
            distinct,
            count,
        } => {
            let path = cli.path.ok_or("Store path required for search")?;
            let args = commands::search::SearchArgs {
                clause,
                params,
                wiki,
                limit,
                offset,
                mapped,
                distinct,
                count,
            };
            commands::search::run(&path, &args)?;
        }
        Commands::Backlinks { reference, wiki } => {
            let path = cli.path.ok_or("Store path required for backlinks")?;
            commands::backlinks::run(&path, &reference, wiki.as_deref())?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("wikidb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("wikidb core v{}", wikidb_core::VERSION);
        }
    }

    Ok(())
}
