//! Kitsu CLI - Command-line interface for Kitsu
//!
//! Loads process data into a local store and answers questions about
//! it: where the bottleneck is, what the critical path looks like, and
//! how individual machines and steps are performing.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "kitsu")]
#[command(author = "Kitsu Contributors")]
#[command(version)]
#[command(about = "Bottleneck and flow analysis for manufacturing process graphs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Store location (overrides .kitsu/config.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Kitsu in the current directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Import graphs and events from a JSON dataset
    Import {
        /// Dataset file
        file: PathBuf,
    },

    /// List stored graphs
    List {
        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Rank the machines most likely to be bottlenecks
    Bottlenecks {
        /// Graph to analyze
        graph: String,

        /// Sample window in hours (default from config)
        #[arg(short, long)]
        window: Option<f64>,

        /// Number of machines to report (default from config)
        #[arg(short, long)]
        top: Option<usize>,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show the longest chain of expected work
    CriticalPath {
        /// Graph to analyze
        graph: String,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show graph-level statistics
    Summary {
        /// Graph to analyze
        graph: String,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show detailed metrics for one machine
    Node {
        /// Graph the machine belongs to
        graph: String,

        /// Machine id
        node: String,

        /// Sample window in hours (default from config)
        #[arg(short, long)]
        window: Option<f64>,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show detailed metrics for one process step
    Edge {
        /// Graph the step belongs to
        graph: String,

        /// Process step id
        edge: String,

        /// Sample window in hours (default from config)
        #[arg(short, long)]
        window: Option<f64>,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Start the Kitsu server
    Serve {
        /// Port to listen on (default from config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Headless mode: bind to 0.0.0.0 for remote access
        #[arg(long)]
        headless: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Init { path } = &cli.command {
        return commands::init(path);
    }

    let ctx = commands::Context::load(&std::env::current_dir()?, cli.store)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Import { file } => commands::import(&ctx, &file),
        Commands::List { json } => commands::list(&ctx, json),
        Commands::Bottlenecks {
            graph,
            window,
            top,
            json,
        } => commands::bottlenecks(&ctx, &graph, window, top, json),
        Commands::CriticalPath { graph, json } => commands::critical_path(&ctx, &graph, json),
        Commands::Summary { graph, json } => commands::summary(&ctx, &graph, json),
        Commands::Node {
            graph,
            node,
            window,
            json,
        } => commands::node(&ctx, &graph, &node, window, json),
        Commands::Edge {
            graph,
            edge,
            window,
            json,
        } => commands::edge(&ctx, &graph, &edge, window, json),
        Commands::Serve { port, headless } => commands::serve(&ctx, port, headless).await,
    }
}
