//! Work-item ledger: persisted runs, work items and errors.
//!
//! The ledger is what makes a harvest resumable. Every stage transition is
//! saved before the next stage starts, so a crashed run can be picked up by
//! reprocessing the items that have not reached a terminal stage.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{HarvestErrorRecord, HarvestRun, HarvestSource, WorkItem, WorkPayload};

/// Storage for runs, work items and the error ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn create_run(&self, source: &HarvestSource) -> Result<HarvestRun>;

    async fn get_run(&self, run_id: &str) -> Result<Option<HarvestRun>>;

    /// All runs, newest first.
    async fn list_runs(&self) -> Result<Vec<HarvestRun>>;

    /// Persist a new item in stage `Gathered`.
    async fn insert_item(&self, run_id: &str, payload: WorkPayload) -> Result<WorkItem>;

    /// Overwrite an item's stage and payload.
    async fn save_item(&self, item: &WorkItem) -> Result<()>;

    async fn get_item(&self, id: &str) -> Result<Option<WorkItem>>;

    /// Items of a run in creation order.
    async fn items_for_run(&self, run_id: &str) -> Result<Vec<WorkItem>>;

    async fn record_error(&self, error: &HarvestErrorRecord) -> Result<()>;

    async fn errors_for_run(&self, run_id: &str) -> Result<Vec<HarvestErrorRecord>>;

    /// Errors filed against one work item, oldest first.
    async fn errors_for_item(&self, item_id: &str) -> Result<Vec<HarvestErrorRecord>>;
}
