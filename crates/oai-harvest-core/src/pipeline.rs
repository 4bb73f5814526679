//! Harvest orchestration.
//!
//! [`Harvester`] ties a protocol client, a catalog and a ledger together and
//! drives work items through gather → fetch → import:
//!
//! ```text
//!            ┌──────────┐   one item per set   ┌─────────┐   ┌──────────┐
//! source ──▶ │  gather  │ ───────────────────▶ │  fetch  │──▶│  import  │──▶ catalog
//!            └──────────┘                      └─────────┘   └──────────┘
//!                 │                                 │              │
//!                 └────────────── ledger (stage, payload, errors) ─┘
//! ```
//!
//! Items are independent: they are processed on a bounded pool and a failed
//! item never stops the others. Within an item the stages run strictly in
//! order. Nothing is retried; a failed stage ends the item and leaves an
//! entry in the error ledger.

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::discover::discover;
use crate::error::HarvestError;
use crate::fetch::{fetch_records, FetchPolicy};
use crate::import::import_records;
use crate::ledger::Ledger;
use crate::models::{
    ErrorScope, HarvestErrorRecord, HarvestRun, HarvestSource, Stage, WorkItem, WorkPayload,
};
use crate::protocol::{MetadataProfile, ProtocolClient};

/// Tunables for a [`Harvester`].
#[derive(Debug, Clone, Copy)]
pub struct HarvestOptions {
    pub profile: MetadataProfile,
    /// Maximum number of work items in flight.
    pub concurrency: usize,
    pub fetch_policy: FetchPolicy,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            profile: MetadataProfile::default(),
            concurrency: 4,
            fetch_policy: FetchPolicy::Lenient,
        }
    }
}

/// Summary of a run (or of a resumed run).
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    /// `None` when discovery never reached the source.
    pub domain: Option<String>,
    pub item_ids: Vec<String>,
    pub imported: usize,
    pub failed: usize,
    /// Items left in a non-terminal stage (only after ledger failures).
    pub pending: usize,
    pub errors: Vec<HarvestErrorRecord>,
}

impl RunReport {
    /// True when discovery failed and no work was produced.
    pub fn is_fatal(&self) -> bool {
        self.domain.is_none() && self.item_ids.is_empty()
    }
}

/// The harvest pipeline.
pub struct Harvester<P, C, L> {
    client: P,
    catalog: C,
    ledger: L,
    options: HarvestOptions,
}

impl<P, C, L> Harvester<P, C, L>
where
    P: ProtocolClient,
    C: Catalog,
    L: Ledger,
{
    pub fn new(client: P, catalog: C, ledger: L, options: HarvestOptions) -> Self {
        Self {
            client,
            catalog,
            ledger,
            options,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Harvest `source` from scratch: create a run, gather, then fetch and
    /// import every item.
    pub async fn run(&self, source: &HarvestSource) -> anyhow::Result<RunReport> {
        let run = self.ledger.create_run(source).await?;
        info!(run_id = %run.id, url = %source.url, "starting harvest run");

        let (domain, item_ids) = match self.gather(&run).await {
            Ok(gathered) => gathered,
            Err(HarvestError::Ledger(e)) => return Err(e),
            Err(_) => (None, Vec::new()),
        };

        self.drive(&run, &item_ids).await;
        self.report(&run, domain, item_ids).await
    }

    /// Continue a previous run: every item not yet `Imported` or `Failed`
    /// picks up from its persisted stage.
    pub async fn resume(&self, run_id: &str) -> anyhow::Result<RunReport> {
        let run = match self.ledger.get_run(run_id).await? {
            Some(run) => run,
            None => anyhow::bail!("harvest run not found: {}", run_id),
        };
        let items = self.ledger.items_for_run(run_id).await?;
        let domain = items.first().map(|i| i.payload.domain.clone());
        let unfinished: Vec<String> = items
            .iter()
            .filter(|i| !i.stage.is_terminal())
            .map(|i| i.id.clone())
            .collect();
        info!(
            run_id = %run.id,
            items = items.len(),
            unfinished = unfinished.len(),
            "resuming harvest run"
        );

        self.drive(&run, &unfinished).await;
        let all_ids = items.into_iter().map(|i| i.id).collect();
        self.report(&run, domain, all_ids).await
    }

    /// Gather stage: discover sets and persist one `Gathered` item per set.
    ///
    /// Returns the domain and the new item ids. An unreachable source is
    /// recorded as a gather error and returned as `Err`.
    pub async fn gather(
        &self,
        run: &HarvestRun,
    ) -> Result<(Option<String>, Vec<String>), HarvestError> {
        let discovery = match discover(&self.client, &run.source).await {
            Ok(d) => d,
            Err(e) => {
                error!(run_id = %run.id, error = %e, "gather failed");
                self.file_error(&run.id, None, e.scope(), &e.to_string())
                    .await;
                return Err(e);
            }
        };

        for warning in &discovery.warnings {
            self.file_error(&run.id, None, ErrorScope::Gather, warning)
                .await;
        }

        let mut ids = Vec::with_capacity(discovery.sets.len());
        for set in discovery.sets {
            let payload = WorkPayload {
                set_id: set.id,
                set_name: set.name,
                domain: discovery.domain.clone(),
                records: None,
            };
            let item = self
                .ledger
                .insert_item(&run.id, payload)
                .await
                .map_err(HarvestError::Ledger)?;
            ids.push(item.id);
        }

        info!(run_id = %run.id, domain = %discovery.domain, items = ids.len(), "gathered sets");
        Ok((Some(discovery.domain), ids))
    }

    /// Fetch stage for one item. Returns `true` if the item is now `Fetched`.
    pub async fn fetch_item(&self, run: &HarvestRun, item_id: &str) -> bool {
        let mut item = match self.load(item_id).await {
            Some(item) => item,
            None => return false,
        };

        let result = fetch_records(
            &self.client,
            &self.options.profile,
            self.options.fetch_policy,
            &mut item,
        )
        .await;
        if let Ok(n) = &result {
            info!(item_id = %item_id, set = %item.payload.set_name, records = *n, "fetched set");
        }
        self.settle(run, &item, result.map(|_| ())).await
    }

    /// Import stage for one item. Returns `true` if the item is now `Imported`.
    pub async fn import_item(&self, run: &HarvestRun, item_id: &str) -> bool {
        let mut item = match self.load(item_id).await {
            Some(item) => item,
            None => return false,
        };

        let result = import_records(
            &self.catalog,
            &run.source.url,
            &self.options.profile,
            &mut item,
        )
        .await;
        if let Ok(report) = &result {
            info!(
                item_id = %item_id,
                set = %item.payload.set_name,
                datasets = report.datasets,
                "imported set"
            );
        }
        self.settle(run, &item, result.map(|_| ())).await
    }

    /// Advance one item as far as it goes from its current stage.
    async fn process(&self, run: &HarvestRun, item_id: &str) -> Option<Stage> {
        let stage = self.load(item_id).await?.stage;
        if stage == Stage::Gathered && !self.fetch_item(run, item_id).await {
            return self.load(item_id).await.map(|i| i.stage);
        }
        if !stage.is_terminal() {
            self.import_item(run, item_id).await;
        }
        self.load(item_id).await.map(|i| i.stage)
    }

    async fn drive(&self, run: &HarvestRun, item_ids: &[String]) {
        let width = self.options.concurrency.max(1);
        stream::iter(item_ids)
            .map(|id| self.process(run, id))
            .buffer_unordered(width)
            .collect::<Vec<_>>()
            .await;
    }

    async fn load(&self, item_id: &str) -> Option<WorkItem> {
        match self.ledger.get_item(item_id).await {
            Ok(Some(item)) => Some(item),
            Ok(None) => {
                error!(item_id = %item_id, "work item not found");
                None
            }
            Err(e) => {
                error!(item_id = %item_id, error = %e, "failed to load work item");
                None
            }
        }
    }

    /// Persist the item after a stage and file the error, if any.
    async fn settle(
        &self,
        run: &HarvestRun,
        item: &WorkItem,
        result: Result<(), HarvestError>,
    ) -> bool {
        let ok = match result {
            Ok(()) => true,
            Err(HarvestError::InvalidStage { .. }) => {
                warn!(item_id = %item.id, stage = %item.stage, "skipping item in unexpected stage");
                return false;
            }
            Err(e) => {
                warn!(item_id = %item.id, set = %item.payload.set_name, error = %e, "stage failed");
                self.file_error(&run.id, Some(&item.id), e.scope(), &e.to_string())
                    .await;
                false
            }
        };

        if let Err(e) = self.ledger.save_item(item).await {
            error!(item_id = %item.id, error = %e, "failed to persist work item");
            return false;
        }
        ok
    }

    async fn file_error(&self, run_id: &str, item_id: Option<&str>, scope: ErrorScope, msg: &str) {
        let record = HarvestErrorRecord::new(run_id, item_id, scope, msg);
        if let Err(e) = self.ledger.record_error(&record).await {
            error!(run_id = %run_id, error = %e, "failed to record harvest error");
        }
    }

    async fn report(
        &self,
        run: &HarvestRun,
        domain: Option<String>,
        item_ids: Vec<String>,
    ) -> anyhow::Result<RunReport> {
        let items = self.ledger.items_for_run(&run.id).await?;
        let count = |stage: Stage| items.iter().filter(|i| i.stage == stage).count();
        let report = RunReport {
            run_id: run.id.clone(),
            domain,
            imported: count(Stage::Imported),
            failed: count(Stage::Failed),
            pending: items.iter().filter(|i| !i.stage.is_terminal()).count(),
            item_ids,
            errors: self.ledger.errors_for_run(&run.id).await?,
        };
        info!(
            run_id = %report.run_id,
            imported = report.imported,
            failed = report.failed,
            errors = report.errors.len(),
            "harvest run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::InMemoryCatalog;
    use crate::ledger::memory::InMemoryLedger;
    use crate::testing::{record, tombstone, StaticClient};

    type TestHarvester = Harvester<StaticClient, InMemoryCatalog, InMemoryLedger>;

    fn harvester(client: StaticClient) -> TestHarvester {
        Harvester::new(
            client,
            InMemoryCatalog::new(),
            InMemoryLedger::new(),
            HarvestOptions::default(),
        )
    }

    fn example_client() -> StaticClient {
        StaticClient::new("ExampleRepo").with_set("s1", "Papers").with_record(
            "s1",
            record(
                "rec1",
                &[
                    ("title", &["Hello World!!"]),
                    ("creator", &["A. Author"]),
                    ("subject", &["physics"]),
                    ("identifier", &["http://example.org/rec1"]),
                ],
            ),
        )
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let h = harvester(example_client());
        let report = h
            .run(&HarvestSource::new("http://repo.example.org/oai"))
            .await
            .unwrap();

        assert_eq!(report.domain.as_deref(), Some("ExampleRepo"));
        assert_eq!(report.item_ids.len(), 1);
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 0);
        assert!(report.errors.is_empty());

        let ds = h.catalog().get_dataset("hello_world").await.unwrap().unwrap();
        assert_eq!(ds.fields.title, "Hello World!!");
        assert_eq!(ds.fields.author, "A. Author");
        assert_eq!(ds.tags, vec!["physics"]);
        assert_eq!(ds.resources[0].url, "http://example.org/rec1");
        assert_eq!(ds.collections, vec!["ExampleRepo", "ExampleRepo - Papers"]);
    }

    #[tokio::test]
    async fn test_unreachable_source_produces_no_items() {
        let h = harvester(StaticClient::unreachable());
        let report = h.run(&HarvestSource::new("http://down")).await.unwrap();
        assert!(report.is_fatal());
        assert!(report.item_ids.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].scope, ErrorScope::Gather);
        assert!(report.errors[0].item_id.is_none());
    }

    #[tokio::test]
    async fn test_no_set_hierarchy_runs_default_set() {
        let client = StaticClient::new("Flat")
            .without_sets()
            .with_record("1", record("r1", &[("title", &["Only One"])]));
        let h = harvester(client);
        let report = h.run(&HarvestSource::new("http://flat")).await.unwrap();
        assert_eq!(report.item_ids.len(), 1);
        assert_eq!(report.imported, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].scope, ErrorScope::Gather);
        assert!(!report.is_fatal());

        let items = h.ledger().items_for_run(&report.run_id).await.unwrap();
        assert_eq!(items[0].payload.set_id, "1");
        assert_eq!(items[0].payload.set_name, "Default");
        assert_eq!(
            h.catalog().collection_members("Flat - Default").await.unwrap().unwrap(),
            vec!["only_one"]
        );
    }

    #[tokio::test]
    async fn test_failed_set_does_not_block_others() {
        let client = example_client()
            .with_set("s2", "Empty")
            .with_record("s2", tombstone("gone"))
            .with_set("s3", "Broken")
            .broken_listing("s3");
        let h = harvester(client);
        let report = h.run(&HarvestSource::new("http://repo")).await.unwrap();

        assert_eq!(report.item_ids.len(), 3);
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 2);
        let fetch_errors: Vec<_> = report
            .errors
            .iter()
            .filter(|e| e.scope == ErrorScope::Fetch)
            .collect();
        assert_eq!(fetch_errors.len(), 2);
        assert!(fetch_errors.iter().all(|e| e.item_id.is_some()));
        assert_eq!(h.catalog().dataset_count().await.unwrap(), 1);
        assert!(h
            .catalog()
            .collection_members("ExampleRepo - Empty")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_resume_continues_unfinished_items() {
        let h = harvester(example_client());
        let run = h
            .ledger()
            .create_run(&HarvestSource::new("http://repo"))
            .await
            .unwrap();
        let (_, ids) = h.gather(&run).await.unwrap();
        assert!(h.fetch_item(&run, &ids[0]).await);
        assert_eq!(h.catalog().dataset_count().await.unwrap(), 0);

        let report = h.resume(&run.id).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.pending, 0);
        assert_eq!(h.catalog().dataset_count().await.unwrap(), 1);

        // terminal items are left alone
        let again = h.resume(&run.id).await.unwrap();
        assert_eq!(again.imported, 1);
        assert!(again.errors.is_empty());
    }

    #[tokio::test]
    async fn test_resume_unknown_run() {
        let h = harvester(example_client());
        assert!(h.resume("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_two_sets_share_domain_collection() {
        let client = example_client().with_set("s2", "Theses").with_record(
            "s2",
            record("rec9", &[("title", &["Another Work"]), ("subject", &["Physics"])]),
        );
        let h = Harvester::new(
            client,
            InMemoryCatalog::new(),
            InMemoryLedger::new(),
            HarvestOptions {
                concurrency: 2,
                ..Default::default()
            },
        );
        let report = h.run(&HarvestSource::new("http://repo")).await.unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(
            h.catalog().collection_members("ExampleRepo").await.unwrap().unwrap(),
            vec!["another_work", "hello_world"]
        );
        assert_eq!(h.catalog().tag_names().await.unwrap(), vec!["physics"]);
    }
}
