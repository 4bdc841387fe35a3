//! Parley CLI - Command line interface for Parley
//!
//! Structured negotiation between AI personas, ending in a stress-tested
//! joint artifact.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parley_core::{CliOverrides, ProviderKind};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CompareArgs, ConfigArgs, Context, NegotiateArgs, PersonasArgs, PreflightArgs};

/// Parley: structured negotiation between AI personas
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Model to use on the default provider (overrides config and env)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Provider tried after each persona's own preference
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    /// Config file to use instead of ~/.config/parley/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Run a negotiation on a topic
    #[command(visible_alias = "n")]
    Negotiate(NegotiateArgs),

    /// Run a topic under both round orders and compare
    Compare(CompareArgs),

    /// Ping providers and show where the cast would run
    Preflight(PreflightArgs),

    /// List available personas
    Personas(PersonasArgs),

    /// Show current configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let ctx = Context {
        verbose: cli.verbose,
        config_path: cli.config.clone(),
        overrides: CliOverrides {
            provider: cli.provider,
            model: cli.model.clone(),
            ..Default::default()
        },
    };

    match cli.command {
        Some(Commands::Version) => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Negotiate(args)) => {
            args.execute(&ctx).await?;
        }
        Some(Commands::Compare(args)) => {
            args.execute(&ctx).await?;
        }
        Some(Commands::Preflight(args)) => {
            args.execute(&ctx).await?;
        }
        Some(Commands::Personas(args)) => {
            args.execute(&ctx).await?;
        }
        Some(Commands::Config(args)) => {
            args.execute(&ctx).await?;
        }
        None => {
            println!("Parley - Structured negotiation between AI personas");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
