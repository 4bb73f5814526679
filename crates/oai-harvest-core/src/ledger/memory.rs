//! In-memory [`Ledger`] implementation for testing.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::Ledger;
use crate::models::{
    HarvestErrorRecord, HarvestRun, HarvestSource, Stage, WorkItem, WorkPayload,
};

/// In-memory ledger.
pub struct InMemoryLedger {
    runs: RwLock<Vec<HarvestRun>>,
    items: RwLock<Vec<WorkItem>>,
    errors: RwLock<Vec<HarvestErrorRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(Vec::new()),
            items: RwLock::new(Vec::new()),
            errors: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_run(&self, source: &HarvestSource) -> Result<HarvestRun> {
        let run = HarvestRun {
            id: Uuid::new_v4().to_string(),
            source: source.clone(),
            created_at: Utc::now(),
        };
        self.runs.write().unwrap().push(run.clone());
        Ok(run)
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<HarvestRun>> {
        let runs = self.runs.read().unwrap();
        Ok(runs.iter().find(|r| r.id == run_id).cloned())
    }

    async fn list_runs(&self) -> Result<Vec<HarvestRun>> {
        let runs = self.runs.read().unwrap();
        Ok(runs.iter().rev().cloned().collect())
    }

    async fn insert_item(&self, run_id: &str, payload: WorkPayload) -> Result<WorkItem> {
        let item = WorkItem {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            stage: Stage::Gathered,
            payload,
        };
        self.items.write().unwrap().push(item.clone());
        Ok(item)
    }

    async fn save_item(&self, item: &WorkItem) -> Result<()> {
        let mut items = self.items.write().unwrap();
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(stored) => {
                *stored = item.clone();
                Ok(())
            }
            None => bail!("work item not found: {}", item.id),
        }
    }

    async fn get_item(&self, id: &str) -> Result<Option<WorkItem>> {
        let items = self.items.read().unwrap();
        Ok(items.iter().find(|i| i.id == id).cloned())
    }

    async fn items_for_run(&self, run_id: &str) -> Result<Vec<WorkItem>> {
        let items = self.items.read().unwrap();
        Ok(items.iter().filter(|i| i.run_id == run_id).cloned().collect())
    }

    async fn record_error(&self, error: &HarvestErrorRecord) -> Result<()> {
        self.errors.write().unwrap().push(error.clone());
        Ok(())
    }

    async fn errors_for_run(&self, run_id: &str) -> Result<Vec<HarvestErrorRecord>> {
        let errors = self.errors.read().unwrap();
        Ok(errors.iter().filter(|e| e.run_id == run_id).cloned().collect())
    }

    async fn errors_for_item(&self, item_id: &str) -> Result<Vec<HarvestErrorRecord>> {
        let errors = self.errors.read().unwrap();
        Ok(errors
            .iter()
            .filter(|e| e.item_id.as_deref() == Some(item_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorScope;

    #[tokio::test]
    async fn test_items_start_gathered_and_can_advance() {
        let ledger = InMemoryLedger::new();
        let run = ledger
            .create_run(&HarvestSource::new("http://repo"))
            .await
            .unwrap();
        let mut item = ledger
            .insert_item(
                &run.id,
                WorkPayload {
                    set_id: "s1".into(),
                    set_name: "Papers".into(),
                    domain: "Repo".into(),
                    records: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(item.stage, Stage::Gathered);

        item.stage = Stage::Fetched;
        ledger.save_item(&item).await.unwrap();
        let stored = ledger.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::Fetched);
        assert_eq!(ledger.items_for_run(&run.id).await.unwrap().len(), 1);
        assert!(ledger.items_for_run("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_unknown_item_fails() {
        let ledger = InMemoryLedger::new();
        let item = WorkItem {
            id: "nope".into(),
            run_id: "r".into(),
            stage: Stage::Gathered,
            payload: WorkPayload {
                set_id: "1".into(),
                set_name: "Default".into(),
                domain: "Repo".into(),
                records: None,
            },
        };
        assert!(ledger.save_item(&item).await.is_err());
    }

    #[tokio::test]
    async fn test_errors_by_item() {
        let ledger = InMemoryLedger::new();
        ledger
            .record_error(&HarvestErrorRecord::new("r", None, ErrorScope::Gather, "run-wide"))
            .await
            .unwrap();
        ledger
            .record_error(&HarvestErrorRecord::new("r", Some("a"), ErrorScope::Fetch, "first"))
            .await
            .unwrap();
        ledger
            .record_error(&HarvestErrorRecord::new("r", Some("b"), ErrorScope::Fetch, "other"))
            .await
            .unwrap();
        ledger
            .record_error(&HarvestErrorRecord::new("r", Some("a"), ErrorScope::Import, "second"))
            .await
            .unwrap();

        let messages: Vec<_> = ledger
            .errors_for_item("a")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert!(ledger.errors_for_item("c").await.unwrap().is_empty());
        assert_eq!(ledger.errors_for_run("r").await.unwrap().len(), 4);
    }
}
