//! RM-Bridge: synchronise requirements-tool snapshots into a model.
//!
//! # Usage
//!
//! ```text
//! rm-bridge sync -c <config> -s <snapshot> [--dry-run] [--force] [--no-gather-logs]
//!                [--output-dir <dir>] [--error-log <file>]
//! rm-bridge changeset -c <config> -s <snapshot> [--force]
//! ```

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{changeset::ChangesetArgs, sync::SyncArgs};

#[derive(Parser, Debug)]
#[command(
    name = "rm-bridge",
    version,
    about = "Synchronise requirements-management snapshots into a requirements model",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile, write and apply the change sets of every module.
    Sync(SyncArgs),

    /// Print the change set of every module without touching any file.
    Changeset(ChangesetArgs),
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Changeset(args) => args.run(),
    }
}
