//! passcut CLI: partition shader blocks into passes and manage target profiles.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "passcut", version, about = "Multi-pass shader partitioner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a block into passes that fit a target
    Partition {
        /// Input block (.json)
        input: PathBuf,
        /// Target profile name
        #[arg(long, default_value = "arb-fragment")]
        target: String,
        /// Directory of additional .target.toml profiles (default: ./targets if present)
        #[arg(long)]
        targets_dir: Option<PathBuf>,
        /// Partitioner configuration (.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Search strategy (greedy, heuristic, exhaustive)
        #[arg(long)]
        strategy: Option<String>,
        /// Output format (text, json)
        #[arg(long)]
        format: Option<String>,
        /// Check the passes against the original block with the interpreter
        #[arg(long)]
        verify: bool,
        /// Write the output here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Manage target profiles
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    /// List available target profiles
    List {
        /// Directory of additional .target.toml profiles
        #[arg(long)]
        targets_dir: Option<PathBuf>,
    },
    /// Show the limits of a target profile
    Describe {
        /// Profile name
        name: String,
        /// Directory of additional .target.toml profiles
        #[arg(long)]
        targets_dir: Option<PathBuf>,
        /// Output format (default: human-readable, "toml" for TOML)
        #[arg(long)]
        format: Option<String>,
    },
    /// Validate a .target.toml file
    Validate {
        /// Profile file
        path: PathBuf,
    },
    /// Write a .target.toml template to start a custom profile from
    Template {
        /// Profile name
        name: String,
        /// Directory to write into (default: ./targets)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "warn,passcut=info,passcut_partition=info,passcut_targets=info",
                )
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Partition {
            input,
            target,
            targets_dir,
            config,
            strategy,
            format,
            verify,
            output,
        } => commands::partition::run(&commands::partition::PartitionArgs {
            input: &input,
            target: &target,
            targets_dir: targets_dir.as_deref(),
            config: config.as_deref(),
            strategy: strategy.as_deref(),
            format: format.as_deref(),
            verify,
            output: output.as_deref(),
            cwd: &cwd,
        }),

        Commands::Target { action } => match action {
            TargetAction::List { targets_dir } => {
                commands::target::list(&cwd, targets_dir.as_deref())
            }
            TargetAction::Describe {
                name,
                targets_dir,
                format,
            } => commands::target::describe(&name, &cwd, targets_dir.as_deref(), format.as_deref()),
            TargetAction::Validate { path } => commands::target::validate(&path),
            TargetAction::Template { name, dir } => {
                let dir = dir.unwrap_or_else(|| cwd.join("targets"));
                commands::target::template(&name, &dir)
            }
        },
    }
}
