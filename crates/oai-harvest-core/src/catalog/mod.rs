//! Catalog abstraction: datasets, tags and collections.
//!
//! The import stage never writes to the catalog entity by entity. It builds
//! an [`ImportBatch`] for one work item and hands it to [`Catalog::apply`],
//! which commits the whole batch or nothing.
//!
//! Backends implement the per-entity primitives on a transaction handle
//! ([`CatalogTx`]); [`apply_batch`] replays a batch through them in a fixed
//! order so every backend wires relationships the same way.
//!
//! | Primitive | Semantics |
//! |-----------|-----------|
//! | [`upsert_dataset`](CatalogTx::upsert_dataset) | create by name or update in place |
//! | [`upsert_tag`](CatalogTx::upsert_tag) | insert-or-fetch by name |
//! | [`attach_tag`](CatalogTx::attach_tag) | idempotent dataset ↔ tag link |
//! | [`upsert_collection`](CatalogTx::upsert_collection) | insert-or-fetch by name |
//! | [`add_member`](CatalogTx::add_member) | idempotent membership by dataset name |
//! | [`attach_resource`](CatalogTx::attach_resource) | replace the dataset's sole resource |
//! | [`clear_resource`](CatalogTx::clear_resource) | drop the dataset's resource, if any |

pub mod memory;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Scalar dataset attributes written on every upsert.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DatasetFields {
    pub title: String,
    pub author: String,
    pub author_email: String,
    pub notes: String,
    pub url: String,
    pub extras: BTreeMap<String, String>,
}

/// A downloadable resource attached to a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub url: String,
    pub name: String,
    pub description: String,
}

/// A collection a dataset must belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CollectionRef {
    pub name: String,
    pub description: String,
}

impl CollectionRef {
    /// Collections are described by their own name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
        }
    }
}

/// Everything the import stage wants written for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetImport {
    pub name: String,
    pub fields: DatasetFields,
    pub tags: BTreeSet<String>,
    pub resource: Option<Resource>,
    pub collections: Vec<CollectionRef>,
}

/// All entity mutations for one work item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBatch {
    pub datasets: Vec<DatasetImport>,
}

impl ImportBatch {
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Counts from a committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub datasets: usize,
    pub tags: usize,
    pub resources: usize,
    pub memberships: usize,
}

/// A dataset as read back from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetView {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub fields: DatasetFields,
    pub tags: Vec<String>,
    pub resources: Vec<Resource>,
    pub collections: Vec<String>,
}

/// Per-entity write primitives, valid inside one transaction.
#[async_trait]
pub trait CatalogTx: Send {
    /// Create the dataset `name` or overwrite its fields. Returns its id.
    async fn upsert_dataset(&mut self, name: &str, fields: &DatasetFields) -> Result<String>;

    /// Fetch the tag `name`, creating it if absent. Returns its id.
    async fn upsert_tag(&mut self, name: &str) -> Result<String>;

    async fn attach_tag(&mut self, dataset_id: &str, tag_id: &str) -> Result<()>;

    /// Fetch the collection `name`, creating it if absent. Returns its id.
    async fn upsert_collection(&mut self, name: &str, description: &str) -> Result<String>;

    async fn add_member(&mut self, collection_id: &str, dataset_name: &str) -> Result<()>;

    /// Make `resource` the dataset's only resource.
    async fn attach_resource(&mut self, dataset_id: &str, resource: &Resource) -> Result<()>;

    /// Remove the dataset's resource. No-op when it has none.
    async fn clear_resource(&mut self, dataset_id: &str) -> Result<()>;
}

/// Catalog backend: atomic batch writes plus the reads the CLI and tests need.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Apply every mutation in `batch` in one transaction.
    async fn apply(&self, batch: &ImportBatch) -> Result<ApplyReport>;

    async fn get_dataset(&self, name: &str) -> Result<Option<DatasetView>>;

    /// Member dataset names, or `None` if the collection does not exist.
    async fn collection_members(&self, name: &str) -> Result<Option<Vec<String>>>;

    /// Description recorded when the collection was created.
    async fn collection_description(&self, name: &str) -> Result<Option<String>>;

    async fn dataset_count(&self) -> Result<usize>;

    async fn tag_names(&self) -> Result<Vec<String>>;
}

/// Replay `batch` through a backend's primitives.
///
/// Order per dataset: dataset, tags, resource, collections. Collection ids
/// are resolved once per batch.
pub async fn apply_batch<T>(tx: &mut T, batch: &ImportBatch) -> Result<ApplyReport>
where
    T: CatalogTx + ?Sized,
{
    let mut report = ApplyReport::default();
    let mut collection_ids: HashMap<String, String> = HashMap::new();

    for ds in &batch.datasets {
        let dataset_id = tx.upsert_dataset(&ds.name, &ds.fields).await?;
        report.datasets += 1;

        for tag in &ds.tags {
            let tag_id = tx.upsert_tag(tag).await?;
            tx.attach_tag(&dataset_id, &tag_id).await?;
            report.tags += 1;
        }

        match ds.resource {
            Some(ref resource) => {
                tx.attach_resource(&dataset_id, resource).await?;
                report.resources += 1;
            }
            None => tx.clear_resource(&dataset_id).await?,
        }

        for coll in &ds.collections {
            let coll_id = match collection_ids.get(&coll.name) {
                Some(id) => id.clone(),
                None => {
                    let id = tx.upsert_collection(&coll.name, &coll.description).await?;
                    collection_ids.insert(coll.name.clone(), id.clone());
                    id
                }
            };
            tx.add_member(&coll_id, &ds.name).await?;
            report.memberships += 1;
        }
    }

    Ok(report)
}
