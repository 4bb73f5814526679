//! Ledger inspection: `oaih runs`, `oaih items` and `oaih errors`.

use anyhow::{bail, Result};

use oai_harvest_core::ledger::Ledger;
use oai_harvest_core::models::Stage;

use crate::config::Config;
use crate::db;
use crate::sqlite_ledger::SqliteLedger;

/// List every run, newest first, with item counts by stage.
pub async fn run_runs(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let ledger = SqliteLedger::new(pool.clone());

    let runs = ledger.list_runs().await?;
    if runs.is_empty() {
        println!("No harvest runs.");
        pool.close().await;
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:>5} {:>8} {:>7} {:>8} {:>6}  SOURCE",
        "RUN", "STARTED", "ITEMS", "GATHERED", "FETCHED", "IMPORTED", "FAILED"
    );
    for run in &runs {
        let items = ledger.items_for_run(&run.id).await?;
        let count = |stage: Stage| items.iter().filter(|i| i.stage == stage).count();
        let source = match &run.source.query {
            Some(q) => format!("{} (query: {})", run.source.url, q),
            None => run.source.url.clone(),
        };
        println!(
            "{:<36}  {:<20}  {:>5} {:>8} {:>7} {:>8} {:>6}  {}",
            run.id,
            run.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
            items.len(),
            count(Stage::Gathered),
            count(Stage::Fetched),
            count(Stage::Imported),
            count(Stage::Failed),
            source
        );
    }

    pool.close().await;
    Ok(())
}

/// List the work items of a run in creation order.
pub async fn run_items(config: &Config, run_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let ledger = SqliteLedger::new(pool.clone());

    if ledger.get_run(run_id).await?.is_none() {
        pool.close().await;
        bail!("harvest run not found: {}", run_id);
    }

    let items = ledger.items_for_run(run_id).await?;
    println!(
        "{:<36}  {:<9} {:>7} {:>6}  SET",
        "ITEM", "STAGE", "RECORDS", "ERRORS"
    );
    for item in &items {
        let errors = ledger.errors_for_item(&item.id).await?;
        println!(
            "{:<36}  {:<9} {:>7} {:>6}  {} ({})",
            item.id,
            item.stage.as_str(),
            item.record_count(),
            errors.len(),
            item.payload.set_name,
            item.payload.set_id
        );
    }

    pool.close().await;
    Ok(())
}

/// Print the error ledger of a run.
pub async fn run_errors(config: &Config, run_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let ledger = SqliteLedger::new(pool.clone());

    if ledger.get_run(run_id).await?.is_none() {
        pool.close().await;
        bail!("harvest run not found: {}", run_id);
    }

    let errors = ledger.errors_for_run(run_id).await?;
    if errors.is_empty() {
        println!("No errors recorded for run {}.", run_id);
    }
    for err in &errors {
        println!(
            "{}  [{}] {}  {}",
            err.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
            err.scope,
            err.item_id.as_deref().unwrap_or("-"),
            err.message
        );
    }

    pool.close().await;
    Ok(())
}
