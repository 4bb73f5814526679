//! `oaih harvest` and `oaih resume`.
//!
//! Wires the configured snapshot source, the SQLite catalog and the SQLite
//! ledger into a [`Harvester`] and prints the run report.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use oai_harvest_core::{Harvester, RunReport};

use crate::config::Config;
use crate::db;
use crate::snapshot::SnapshotClient;
use crate::sqlite_catalog::SqliteCatalog;
use crate::sqlite_ledger::SqliteLedger;

type SqliteHarvester = Harvester<SnapshotClient, SqliteCatalog, SqliteLedger>;

async fn open_harvester(config: &Config) -> Result<(SqliteHarvester, SqlitePool)> {
    let snapshot = match &config.source.snapshot {
        Some(path) => path,
        None => bail!(
            "source.snapshot is not set for {}: only captured snapshots can be harvested",
            config.source.url
        ),
    };
    let client = SnapshotClient::open(snapshot);
    tracing::debug!(snapshot = %client.path().display(), "opened snapshot source");

    let pool = db::connect(config).await?;
    let harvester = Harvester::new(
        client,
        SqliteCatalog::new(pool.clone()),
        SqliteLedger::new(pool.clone()),
        config.harvest_options()?,
    );
    Ok((harvester, pool))
}

/// Run a full harvest of the configured source.
///
/// Returns an error when discovery gathered nothing, so that the process
/// exits non-zero.
pub async fn run_harvest(config: &Config, query: Option<&str>) -> Result<()> {
    let source = config.harvest_source(query);
    let (harvester, pool) = open_harvester(config).await?;

    let report = harvester.run(&source).await;
    pool.close().await;
    let report = report?;

    print_report("Harvest", &source.url, &report);

    if report.is_fatal() {
        bail!("Could not gather anything from {}", source.url);
    }
    Ok(())
}

/// Continue the unfinished items of a previous run.
pub async fn run_resume(config: &Config, run_id: &str) -> Result<()> {
    let (harvester, pool) = open_harvester(config).await?;

    let report = harvester.resume(run_id).await;
    pool.close().await;
    let report = report?;

    print_report("Resume", &config.source.url, &report);
    Ok(())
}

fn print_report(kind: &str, url: &str, report: &RunReport) {
    println!("{} of {}", kind, url);
    println!("  run:       {}", report.run_id);
    println!("  domain:    {}", report.domain.as_deref().unwrap_or("-"));
    println!("  items:     {}", report.item_ids.len());
    println!("  imported:  {}", report.imported);
    println!("  failed:    {}", report.failed);
    if report.pending > 0 {
        println!("  pending:   {}", report.pending);
    }

    if !report.errors.is_empty() {
        println!();
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!(
                "  [{}] {} {}",
                err.scope,
                err.item_id.as_deref().unwrap_or("-"),
                err.message
            );
        }
    }
}
