//! CLI for the shardfetch download pipeline.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use shardfetch_core::config;
use std::path::PathBuf;

use commands::{
    run_completions, run_fetch, run_find, run_init, run_man, run_organize, run_probe, run_status,
    run_stop,
};

/// Top-level CLI for shardfetch.
#[derive(Debug, Parser)]
#[command(name = "shardfetch")]
#[command(about = "Resumable, folder-sharded, concurrent video download pipeline", long_about = None)]
pub struct Cli {
    /// Base directory for download logs, staging and shard folders.
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Initialize the ledger from an id list and print totals.
    Init {
        /// Text file with one id per line.
        #[arg(long, value_name = "FILE")]
        ids: PathBuf,
    },

    /// Download every pending item into shard folders.
    Run(RunArgs),

    /// Move the files of an existing flat folder into shard folders.
    Organize {
        /// Folder holding the files to sort.
        #[arg(long, value_name = "DIR")]
        src: PathBuf,
        /// Maximum files per shard folder.
        #[arg(long, value_name = "C")]
        per_shard_capacity: Option<usize>,
    },

    /// Show ledger counts and the last progress snapshot.
    Status {
        /// List every failed id with its reason.
        #[arg(long)]
        failures: bool,
    },

    /// Print the shard path of an id.
    Find {
        /// Item id.
        id: String,
    },

    /// Ask a running `shardfetch run` to stop dispatching new downloads.
    Stop,

    /// Print the duration of media files using the probe tool.
    Probe {
        /// Files to probe.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },

    /// Print the man page (roff) to stdout.
    Man,
}

/// Options of `shardfetch run`; unset values come from config.toml.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Id list (one per line). Defaults to the pending list written by `init`.
    #[arg(long, value_name = "FILE")]
    pub ids: Option<PathBuf>,
    /// JSON mapping of id -> entry holding the source URL.
    #[arg(long, value_name = "FILE")]
    pub urls: PathBuf,
    /// Concurrent downloads.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
    /// Per-item timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Maximum files per shard folder.
    #[arg(long, value_name = "C")]
    pub per_shard_capacity: Option<usize>,
    /// Stop dispatching after N successful downloads.
    #[arg(long, value_name = "N")]
    pub target: Option<u64>,
    /// Stop dispatching after this many GiB were downloaded.
    #[arg(long, value_name = "GB")]
    pub target_gb: Option<f64>,
    /// Skip the first N items of the id list.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub start: usize,
    /// Dispatch at most N items.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
    /// Do not retry ids that failed in an earlier run.
    #[arg(long)]
    pub no_retry_failed: bool,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let root = cli.root;

        match cli.command {
            CliCommand::Completions { shell } => return run_completions(shell),
            CliCommand::Man => return run_man(),
            CliCommand::Stop => return run_stop().await,
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Init { ids } => run_init(&root, &cfg, &ids)?,
            CliCommand::Run(args) => run_fetch(&root, &cfg, args).await?,
            CliCommand::Organize {
                src,
                per_shard_capacity,
            } => run_organize(&root, &cfg, &src, per_shard_capacity)?,
            CliCommand::Status { failures } => run_status(&root, &cfg, failures)?,
            CliCommand::Find { id } => run_find(&root, &cfg, &id)?,
            CliCommand::Probe { files } => run_probe(&cfg, &files).await?,
            CliCommand::Completions { .. } | CliCommand::Man | CliCommand::Stop => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
