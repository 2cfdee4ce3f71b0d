mod commands;
mod context;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    destroy::{DestroyArgs, handle_destroy},
    init::{InitArgs, handle_init},
    resolve::{ResolveArgs, handle_resolve},
    status::{StatusArgs, handle_status},
    unlock::{UnlockArgs, handle_unlock},
};
use context::{ConnectionFlags, OperatorContext};
use output::{Output, OutputFormat};

/// Inspect and repair a lockledger migration ledger and its lock.
#[derive(Parser)]
#[command(name = "lockledger", version)]
struct Cli {
    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", global = true)]
    redis_url: Option<String>,

    /// Key prefix shared by every lockledger key
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Ledger collection; the lock lives in `<collection>_lock`
    #[arg(long, global = true)]
    collection: Option<String>,

    /// TOML file with [target] and [redis] settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    output: OutputFormat,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log lock and ledger activity (same as RUST_LOG=lockledger=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the ledger collection
    Init(InitArgs),
    /// Show ledger entries and the current lock holder
    Status(StatusArgs),
    /// Force-release the lock, whoever holds it
    Unlock(UnlockArgs),
    /// Mark a dirty migration as finished or remove its entry
    Resolve(ResolveArgs),
    /// Drop the ledger collection
    Destroy(DestroyArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "lockledger=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = execute(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let output = Output {
        format: cli.output,
        quiet: cli.quiet,
        color: !cli.no_color && colored::control::SHOULD_COLORIZE.should_colorize(),
    };
    let ctx = OperatorContext::resolve(ConnectionFlags {
        redis_url: cli.redis_url,
        prefix: cli.prefix,
        collection: cli.collection,
        config: cli.config,
    })?;

    match cli.command {
        Commands::Init(args) => handle_init(args, &ctx, &output).await,
        Commands::Status(args) => handle_status(args, &ctx, &output).await,
        Commands::Unlock(args) => handle_unlock(args, &ctx, &output).await,
        Commands::Resolve(args) => handle_resolve(args, &ctx, &output).await,
        Commands::Destroy(args) => handle_destroy(args, &ctx, &output).await,
    }
}
