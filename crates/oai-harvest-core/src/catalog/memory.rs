//! In-memory [`Catalog`] implementation for testing.
//!
//! A batch is applied to a copy of the current state under an async mutex;
//! the copy replaces the live state only if every primitive succeeded.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::lock::Mutex;
use uuid::Uuid;

use super::{
    apply_batch, ApplyReport, Catalog, CatalogTx, DatasetFields, DatasetView, ImportBatch,
    Resource,
};

#[derive(Debug, Clone)]
struct StoredDataset {
    id: String,
    fields: DatasetFields,
    tag_ids: BTreeSet<String>,
    resource: Option<Resource>,
}

#[derive(Debug, Clone)]
struct StoredCollection {
    id: String,
    description: String,
    members: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    /// Keyed by dataset name.
    datasets: BTreeMap<String, StoredDataset>,
    /// Tag name → id.
    tags: BTreeMap<String, String>,
    /// Keyed by collection name.
    collections: BTreeMap<String, StoredCollection>,
}

impl CatalogState {
    fn dataset_by_id_mut(&mut self, id: &str) -> Result<&mut StoredDataset> {
        match self.datasets.values_mut().find(|d| d.id == id) {
            Some(d) => Ok(d),
            None => bail!("unknown dataset id: {}", id),
        }
    }
}

/// In-memory catalog.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
    /// Dataset names whose upsert fails.
    #[cfg(test)]
    rejected: BTreeSet<String>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make any batch that writes dataset `name` fail.
    #[cfg(test)]
    pub(crate) fn reject_dataset(mut self, name: impl Into<String>) -> Self {
        self.rejected.insert(name.into());
        self
    }
}

struct MemoryTx {
    state: CatalogState,
    #[cfg(test)]
    rejected: BTreeSet<String>,
}

#[async_trait]
impl CatalogTx for MemoryTx {
    async fn upsert_dataset(&mut self, name: &str, fields: &DatasetFields) -> Result<String> {
        #[cfg(test)]
        if self.rejected.contains(name) {
            bail!("dataset '{}' rejected by catalog", name);
        }
        let entry = self
            .state
            .datasets
            .entry(name.to_string())
            .or_insert_with(|| StoredDataset {
                id: Uuid::new_v4().to_string(),
                fields: DatasetFields::default(),
                tag_ids: BTreeSet::new(),
                resource: None,
            });
        entry.fields = fields.clone();
        Ok(entry.id.clone())
    }

    async fn upsert_tag(&mut self, name: &str) -> Result<String> {
        Ok(self
            .state
            .tags
            .entry(name.to_string())
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone())
    }

    async fn attach_tag(&mut self, dataset_id: &str, tag_id: &str) -> Result<()> {
        self.state
            .dataset_by_id_mut(dataset_id)?
            .tag_ids
            .insert(tag_id.to_string());
        Ok(())
    }

    async fn upsert_collection(&mut self, name: &str, description: &str) -> Result<String> {
        Ok(self
            .state
            .collections
            .entry(name.to_string())
            .or_insert_with(|| StoredCollection {
                id: Uuid::new_v4().to_string(),
                description: description.to_string(),
                members: BTreeSet::new(),
            })
            .id
            .clone())
    }

    async fn add_member(&mut self, collection_id: &str, dataset_name: &str) -> Result<()> {
        match self
            .state
            .collections
            .values_mut()
            .find(|c| c.id == collection_id)
        {
            Some(c) => {
                c.members.insert(dataset_name.to_string());
                Ok(())
            }
            None => bail!("unknown collection id: {}", collection_id),
        }
    }

    async fn attach_resource(&mut self, dataset_id: &str, resource: &Resource) -> Result<()> {
        self.state.dataset_by_id_mut(dataset_id)?.resource = Some(resource.clone());
        Ok(())
    }

    async fn clear_resource(&mut self, dataset_id: &str) -> Result<()> {
        self.state.dataset_by_id_mut(dataset_id)?.resource = None;
        Ok(())
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn apply(&self, batch: &ImportBatch) -> Result<ApplyReport> {
        let mut live = self.state.lock().await;
        let mut tx = MemoryTx {
            state: live.clone(),
            #[cfg(test)]
            rejected: self.rejected.clone(),
        };
        let report = apply_batch(&mut tx, batch).await?;
        *live = tx.state;
        Ok(report)
    }

    async fn get_dataset(&self, name: &str) -> Result<Option<DatasetView>> {
        let state = self.state.lock().await;
        let stored = match state.datasets.get(name) {
            Some(d) => d,
            None => return Ok(None),
        };
        let tags = state
            .tags
            .iter()
            .filter(|(_, id)| stored.tag_ids.contains(*id))
            .map(|(name, _)| name.clone())
            .collect();
        let collections = state
            .collections
            .iter()
            .filter(|(_, c)| c.members.contains(name))
            .map(|(name, _)| name.clone())
            .collect();
        Ok(Some(DatasetView {
            id: stored.id.clone(),
            name: name.to_string(),
            fields: stored.fields.clone(),
            tags,
            resources: stored.resource.iter().cloned().collect(),
            collections,
        }))
    }

    async fn collection_members(&self, name: &str) -> Result<Option<Vec<String>>> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(name)
            .map(|c| c.members.iter().cloned().collect()))
    }

    async fn collection_description(&self, name: &str) -> Result<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.collections.get(name).map(|c| c.description.clone()))
    }

    async fn dataset_count(&self) -> Result<usize> {
        Ok(self.state.lock().await.datasets.len())
    }

    async fn tag_names(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().await.tags.keys().cloned().collect())
    }
}
