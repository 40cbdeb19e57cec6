//! pathsync: keep local run directories in step with a cluster and submit
//! them to its scheduler.
//!
//! # Usage
//!
//! ```text
//! pathsync download <path> [--archive] [--exclude N]... [--include N]... [--exclude-dir N]... [--force] [--no-recursive] [--dry-run]
//! pathsync upload <path> [same flags]
//! pathsync mirror <dir1> <dir2> [filters] [--dry-run]
//! pathsync jobs list [--days N] [--all] [--json]
//! pathsync jobs history <path> [--days N] [--json]
//! pathsync submit <path> [--force] [--no-refresh] [--incremental] [--days N]
//! pathsync check <path> --max-age-days D [--force]
//! pathsync config show [--json]
//! ```
//!
//! Connection flags (`--cluster`, `--host`, `--user`, `--local-root`,
//! `--remote-root`, `--no-agent`, `--keepalive`) apply to every subcommand.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs,
    config::ConfigCommand,
    jobs::JobsCommand,
    mirror::MirrorArgs,
    submit::SubmitArgs,
    transfer::{Direction, TransferArgs},
    ConnectionArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pathsync",
    version,
    about = "Sync run directories with a remote cluster and manage their jobs",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring a local directory up to date with the cluster.
    Download(TransferArgs),

    /// Push a local directory to the cluster.
    Upload(TransferArgs),

    /// Two-way sync of two local directories.
    Mirror(MirrorArgs),

    /// Inspect scheduler jobs.
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },

    /// Upload a directory and submit it, unless its last job forbids it.
    Submit(SubmitArgs),

    /// Report whether a local directory is due for a sync.
    Check(CheckArgs),

    /// Inspect the resolved configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Download(args) => args.run(&cli.connection, Direction::Download),
        Commands::Upload(args) => args.run(&cli.connection, Direction::Upload),
        Commands::Mirror(args) => args.run(),
        Commands::Jobs { command } => commands::jobs::run(command, &cli.connection),
        Commands::Submit(args) => args.run(&cli.connection),
        Commands::Check(args) => args.run(),
        Commands::Config { command } => commands::config::run(command, &cli.connection),
    }
}
