mod cmd;
mod error;
mod output;
mod preflight;
mod root;

use clap::{Parser, Subcommand};
use cmd::init::RunArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "persistency",
    about = "Scaffold and refresh a versioned knowledge layer for AI agents",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .persistency-path or .git/)
    #[arg(long, global = true, env = "PERSISTENCY_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or refresh the knowledge layer and regenerate the migration brief
    Init(RunArgs),

    /// Show the last run's record and whether the layer is stale
    Status {
        /// Exit non-zero when a freshness threshold is exceeded
        #[arg(long)]
        fail_on_stale: bool,
    },

    /// Classify the layer's directories without writing anything
    Analyze {
        /// Layer directory (default: pointer file, then last run, then config)
        #[arg(long)]
        dir: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init(args) => cmd::init::run(&root, args, cli.json),
        Commands::Status { fail_on_stale } => cmd::status::run(&root, fail_on_stale, cli.json),
        Commands::Analyze { dir } => cmd::analyze::run(&root, dir.as_deref(), cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(error::exit_code(&e));
    }
}
