//! CLI application for résumé extraction.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, config, extract, info, merge};

/// Résumé extraction - turn CVs into structured, mergeable profiles
#[derive(Parser)]
#[command(name = "vitae")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from a single résumé
    Extract(extract::ExtractArgs),

    /// Extract fields from many résumés concurrently
    Batch(batch::BatchArgs),

    /// Merge a new résumé or profile into an existing profile
    Merge(merge::MergeArgs),

    /// Manage configuration
    Config(config::ConfigArgs),

    /// Show supported formats, languages and model availability
    Info(info::InfoArgs),
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

    match cli.command {
        Commands::Extract(args) => extract::run(args, cli.config.as_deref()).await,
        Commands::Batch(args) => batch::run(args, cli.config.as_deref()).await,
        Commands::Merge(args) => merge::run(args, cli.config.as_deref()).await,
        Commands::Config(args) => config::run(args).await,
        Commands::Info(args) => info::run(args, cli.config.as_deref()).await,
    }
}
