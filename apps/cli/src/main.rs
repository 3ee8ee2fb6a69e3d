//! PAJ Fetcher CLI
//!
//! Downloads the statistics spreadsheets published by the Petroleum
//! Association of Japan into a target directory, one subdirectory per
//! dataset group. Already downloaded files are skipped on later runs.

mod commands;
mod logging;
mod output;
mod progress;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use paj_core::events::StoreKind;
use paj_types::FetcherConfig;
use std::path::{Path, PathBuf};

/// PAJ Fetcher - statistics downloader
#[derive(Parser)]
#[command(name = "paj-fetcher")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Level of logging messages
    #[arg(long, global = true, default_value = "warn", env = "PAJ_LOG")]
    log: String,

    /// Display HTTP client debug messages
    #[arg(long, global = true)]
    debug_http: bool,

    /// Index page listing the dataset files
    #[arg(long, global = true, env = "PAJ_INDEX_URL")]
    index_url: Option<String>,

    /// Site root prepended to the links found on the index page
    #[arg(long, global = true, env = "PAJ_BASE_URL")]
    base_url: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Table,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum StatusStoreArg {
    Jsonl,
    Sqlite,
}

impl From<StatusStoreArg> for StoreKind {
    fn from(arg: StatusStoreArg) -> Self {
        match arg {
            StatusStoreArg::Jsonl => StoreKind::Jsonl,
            StatusStoreArg::Sqlite => StoreKind::Sqlite,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download every listed spreadsheet that is not already downloaded
    Download {
        /// Directory receiving the files and the status log
        target_dir: PathBuf,

        /// Only process these resource ids
        #[arg(long = "only", value_name = "ID")]
        only: Vec<String>,

        /// Skip these resource ids
        #[arg(long = "exclude", value_name = "ID")]
        exclude: Vec<String>,

        /// Process at most this many resources
        #[arg(long)]
        limit: Option<usize>,

        /// Delete group directories and download everything again
        #[arg(long)]
        force: bool,

        /// Stop at the first failed resource
        #[arg(long)]
        fail_fast: bool,

        /// Number of files downloaded in parallel
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// Where completed resources are recorded
        #[arg(long, default_value = "jsonl")]
        status_store: StatusStoreArg,

        /// Do not draw progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// List the resources on the index page without downloading
    List {
        /// Directory the files would be written to
        target_dir: PathBuf,
    },

    /// Show the last recorded outcome of every resource
    Status {
        /// Directory holding the status log
        target_dir: PathBuf,

        /// Where completed resources are recorded
        #[arg(long, default_value = "jsonl")]
        status_store: StatusStoreArg,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

impl Cli {
    fn config(&self) -> FetcherConfig {
        let mut config = FetcherConfig::default();
        if let Some(ref url) = self.index_url {
            config.index_url = url.clone();
        }
        if let Some(ref url) = self.base_url {
            config.base_url = url.clone();
        }
        config
    }
}

/// Exit with a usage error unless `path` is an existing directory
fn require_target_dir(path: &Path) {
    if !path.is_dir() {
        Cli::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Target directory {:?} not found", path.display().to_string()),
            )
            .exit();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log, cli.debug_http)?;

    let config = cli.config();

    match cli.command {
        Commands::Download {
            target_dir,
            only,
            exclude,
            limit,
            force,
            fail_fast,
            jobs,
            status_store,
            no_progress,
        } => {
            require_target_dir(&target_dir);
            let options = paj_core::ProcessOptions {
                only,
                exclude,
                limit,
                force,
                fail_fast,
                jobs,
            };
            commands::download(
                config,
                &target_dir,
                &options,
                status_store.into(),
                !no_progress,
                cli.output,
            )
            .await?
        }

        Commands::List { target_dir } => {
            require_target_dir(&target_dir);
            commands::list_resources(config, &target_dir, cli.output).await?
        }

        Commands::Status {
            target_dir,
            status_store,
        } => {
            require_target_dir(&target_dir);
            commands::show_status(config, &target_dir, status_store.into(), cli.output).await?
        }

        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "paj-fetcher",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
