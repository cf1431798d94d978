use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sitebudget", version, about = "Per-domain time budgets")]
struct Cli {
    /// Directory for config.toml and sitebudget.db (default ~/.config/sitebudget)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tracked domains and their budgets
    Domain {
        #[command(subcommand)]
        action: commands::domain::DomainAction,
    },
    /// Usage statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Track focus events read from stdin (one JSON object per line)
    Run(commands::run::RunArgs),
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging() {
    let filter = EnvFilter::try_from_env("SITEBUDGET_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let ctx = commands::Context::new(cli.data_dir);
    let result = match cli.command {
        Commands::Domain { action } => commands::domain::run(&ctx, action),
        Commands::Stats { action } => commands::stats::run(&ctx, action),
        Commands::Config { action } => commands::config::run(&ctx, action),
        Commands::Run(args) => commands::run::run(&ctx, args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
