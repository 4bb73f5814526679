//! Metadata transform and upsert: the import stage.
//!
//! Maps every fetched Dublin Core record of a work item onto catalog
//! entities and commits them as one batch.
//!
//! Per record:
//!
//! - title: first `title`, else the record identifier
//! - name: slug of the title, else the record identifier
//! - author / author email: first `creator`
//! - notes: first `description`
//! - url: `GetRecord` URL for the record
//! - `subject` and `type` values become tags, every other non-empty field
//!   becomes an extra (values joined with a space)
//! - the last `http://` value of `identifier` becomes the sole resource;
//!   a record without one loses any resource it had
//! - membership in the domain collection and in `"<domain> - <set>"`

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::catalog::{
    ApplyReport, Catalog, CollectionRef, DatasetFields, DatasetImport, ImportBatch, Resource,
};
use crate::error::HarvestError;
use crate::models::{RawRecord, Stage, WorkItem, WorkPayload};
use crate::protocol::{get_record_url, MetadataProfile};
use crate::slug::{dataset_name, munge_tag};

/// Fields whose values become tags rather than extras.
const TAG_FIELDS: &[&str] = &["subject", "type"];

/// Name of the per-set sub-collection.
pub fn set_collection_name(domain: &str, set_name: &str) -> String {
    format!("{} - {}", domain, set_name)
}

/// Map one record onto the catalog entities it produces.
///
/// Returns `None` for records without metadata.
pub fn record_to_import(
    base_url: &str,
    profile: &MetadataProfile,
    payload: &WorkPayload,
    record: &RawRecord,
) -> Option<DatasetImport> {
    let metadata = record.metadata.as_ref()?;

    let title = record
        .first("title")
        .unwrap_or(record.identifier.as_str())
        .to_string();
    let name = dataset_name(&title, &record.identifier);
    let creator = record.first("creator").unwrap_or_default().to_string();
    let description = record.first("description").unwrap_or_default().to_string();

    let mut extras = BTreeMap::new();
    let mut tags = BTreeSet::new();
    for (key, values) in metadata {
        if values.is_empty() {
            continue;
        }
        if TAG_FIELDS.contains(&key.as_str()) {
            tags.extend(
                values
                    .iter()
                    .filter(|v| !v.is_empty())
                    .map(|v| munge_tag(v)),
            );
        } else {
            extras.insert(key.clone(), values.join(" "));
        }
    }

    let resource = metadata
        .get("identifier")
        .and_then(|ids| ids.iter().rev().find(|id| id.starts_with("http://")))
        .map(|url| Resource {
            url: url.clone(),
            name: title.clone(),
            description: description.clone(),
        });

    Some(DatasetImport {
        name,
        fields: DatasetFields {
            title,
            author: creator.clone(),
            author_email: creator,
            notes: description,
            url: get_record_url(base_url, &record.identifier, profile),
            extras,
        },
        tags,
        resource,
        collections: vec![
            CollectionRef::named(payload.domain.clone()),
            CollectionRef::named(set_collection_name(&payload.domain, &payload.set_name)),
        ],
    })
}

/// Build the batch for a work item's payload.
pub fn build_batch(
    base_url: &str,
    profile: &MetadataProfile,
    payload: &WorkPayload,
) -> Result<ImportBatch, HarvestError> {
    let records = match payload.records {
        Some(ref records) if !records.is_empty() => records,
        _ => return Err(HarvestError::NothingToImport),
    };

    let datasets = records
        .iter()
        .filter_map(|r| record_to_import(base_url, profile, payload, r))
        .collect();
    Ok(ImportBatch { datasets })
}

/// Run the import stage on `item`.
///
/// On success the item is `Imported`; on any failure other than
/// [`HarvestError::InvalidStage`] it is `Failed`. Nothing is written to the
/// catalog unless the whole batch commits.
pub async fn import_records<C>(
    catalog: &C,
    base_url: &str,
    profile: &MetadataProfile,
    item: &mut WorkItem,
) -> Result<ApplyReport, HarvestError>
where
    C: Catalog + ?Sized,
{
    if item.stage.is_terminal() {
        return Err(HarvestError::InvalidStage {
            id: item.id.clone(),
            stage: item.stage,
            expected: Stage::Fetched,
        });
    }

    let batch = match build_batch(base_url, profile, &item.payload) {
        Ok(batch) => batch,
        Err(e) => {
            item.stage = Stage::Failed;
            return Err(e);
        }
    };

    let report = if batch.is_empty() {
        ApplyReport::default()
    } else {
        match catalog.apply(&batch).await {
            Ok(report) => report,
            Err(e) => {
                item.stage = Stage::Failed;
                return Err(HarvestError::Commit(e));
            }
        }
    };

    debug!(
        set = %item.payload.set_name,
        datasets = report.datasets,
        tags = report.tags,
        "imported work item"
    );
    item.stage = Stage::Imported;
    Ok(report)
}
