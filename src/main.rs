//! # OAI Harvest CLI (`oaih`)
//!
//! ## Usage
//!
//! ```bash
//! oaih --config ./config/oaih.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `oaih init` | Create the SQLite database and run schema migrations |
//! | `oaih harvest [--query Q]` | Harvest the configured source |
//! | `oaih resume <run_id>` | Continue the unfinished items of a run |
//! | `oaih runs` | List runs with item counts by stage |
//! | `oaih items <run_id>` | List the work items of a run |
//! | `oaih errors <run_id>` | Show the error ledger of a run |
//! | `oaih dataset <name>` | Show a catalog dataset |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use oai_harvest::{config, dataset, harvest, logging, migrate, status};

/// OAI Harvest CLI: harvest repository metadata into a dataset catalog.
#[derive(Parser)]
#[command(
    name = "oaih",
    about = "OAI Harvest: harvest repository metadata into a dataset catalog",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/oaih.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Harvest the configured source.
    ///
    /// Discovers the repository's sets, creates one work item per set and
    /// drives every item through fetch and import.
    Harvest {
        /// Only harvest sets whose name contains this text (case-sensitive).
        /// Overrides `[source].query`.
        #[arg(long)]
        query: Option<String>,
    },

    /// Continue the unfinished work items of a previous run.
    Resume {
        /// Run UUID.
        run_id: String,
    },

    /// List harvest runs, newest first.
    Runs,

    /// List the work items of a run.
    Items {
        /// Run UUID.
        run_id: String,
    },

    /// Show the error ledger of a run.
    Errors {
        /// Run UUID.
        run_id: String,
    },

    /// Show a catalog dataset with its tags, resource and collections.
    Dataset {
        /// Dataset name (slug).
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.log)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Harvest { query } => {
            harvest::run_harvest(&cfg, query.as_deref()).await?;
        }
        Commands::Resume { run_id } => {
            harvest::run_resume(&cfg, &run_id).await?;
        }
        Commands::Runs => {
            status::run_runs(&cfg).await?;
        }
        Commands::Items { run_id } => {
            status::run_items(&cfg, &run_id).await?;
        }
        Commands::Errors { run_id } => {
            status::run_errors(&cfg, &run_id).await?;
        }
        Commands::Dataset { name } => {
            dataset::run_dataset(&cfg, &name).await?;
        }
    }

    Ok(())
}
