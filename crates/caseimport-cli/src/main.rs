//! CLI application for importing medical cases from document forms.

mod commands;
mod import_log;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, config, import, inspect, stats, templates};

/// Case import - match filled-in document forms to templates and extract cases
#[derive(Parser)]
#[command(name = "caseimport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a single document
    Import(import::ImportArgs),

    /// Import every document matching a pattern
    Batch(batch::BatchArgs),

    /// Show which templates fit which documents
    Stats(stats::StatsArgs),

    /// Dump the extracted tables of a document
    Inspect(inspect::InspectArgs),

    /// List and check template definitions
    Templates(templates::TemplatesArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Import(args) => import::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Stats(args) => stats::run(args, config_path).await,
        Commands::Inspect(args) => inspect::run(args, config_path).await,
        Commands::Templates(args) => templates::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
