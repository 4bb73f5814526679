//! Record retrieval: the fetch stage.
//!
//! Lists every record of a work item's set and attaches the ones that carry
//! metadata to the item's payload.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::HarvestError;
use crate::models::{Stage, WorkItem};
use crate::protocol::{MetadataProfile, ProtocolClient};

/// What to do when `ListRecords` itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPolicy {
    /// Treat the failure as an empty listing. The item then fails with
    /// "no records for set" and the transport error is only logged.
    #[default]
    Lenient,
    /// Fail the item with the listing error itself.
    Strict,
}

/// Run the fetch stage on `item`.
///
/// On success the item is in stage `Fetched` with its records attached and
/// the number of records is returned. On failure the item is in stage
/// `Failed`, except for [`HarvestError::InvalidStage`] which leaves it
/// untouched.
pub async fn fetch_records<P>(
    client: &P,
    profile: &MetadataProfile,
    policy: FetchPolicy,
    item: &mut WorkItem,
) -> Result<usize, HarvestError>
where
    P: ProtocolClient + ?Sized,
{
    if item.stage != Stage::Gathered {
        return Err(HarvestError::InvalidStage {
            id: item.id.clone(),
            stage: item.stage,
            expected: Stage::Gathered,
        });
    }

    let set_name = item.payload.set_name.clone();
    let listed = match client.list_records(profile, &item.payload.set_id).await {
        Ok(records) => records,
        Err(e) => match policy {
            FetchPolicy::Lenient => {
                warn!(set = %set_name, error = %e, "record listing failed, treating as empty");
                Vec::new()
            }
            FetchPolicy::Strict => {
                item.stage = Stage::Failed;
                return Err(HarvestError::Listing {
                    set: set_name,
                    source: e,
                });
            }
        },
    };

    let total = listed.len();
    let records: Vec<_> = listed.into_iter().filter(|r| r.metadata.is_some()).collect();
    debug!(
        set = %set_name,
        listed = total,
        kept = records.len(),
        "fetched records"
    );

    if records.is_empty() {
        item.stage = Stage::Failed;
        return Err(HarvestError::NoRecords {
            set_id: item.payload.set_id.clone(),
            set_name,
        });
    }

    let count = records.len();
    item.payload.records = Some(records);
    item.stage = Stage::Fetched;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkPayload;
    use crate::protocol::OAI_DC;
    use crate::testing::{record, tombstone, StaticClient};

    fn gathered(set_id: &str, set_name: &str) -> WorkItem {
        WorkItem {
            id: "item-1".into(),
            run_id: "run-1".into(),
            stage: Stage::Gathered,
            payload: WorkPayload {
                set_id: set_id.into(),
                set_name: set_name.into(),
                domain: "ExampleRepo".into(),
                records: None,
            },
        }
    }

    #[tokio::test]
    async fn test_tombstones_are_dropped() {
        let client = StaticClient::new("ExampleRepo")
            .with_record("s1", record("rec1", &[("title", &["One"])]))
            .with_record("s1", tombstone("rec2"));
        let mut item = gathered("s1", "Papers");
        let n = fetch_records(&client, &OAI_DC, FetchPolicy::Lenient, &mut item)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(item.stage, Stage::Fetched);
        assert_eq!(item.payload.records.as_ref().unwrap()[0].identifier, "rec1");
    }

    #[tokio::test]
    async fn test_only_tombstones_fails_item() {
        let client = StaticClient::new("ExampleRepo").with_record("s1", tombstone("rec1"));
        let mut item = gathered("s1", "Papers");
        let err = fetch_records(&client, &OAI_DC, FetchPolicy::Lenient, &mut item)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no records for set 's1' (Papers)");
        assert_eq!(item.stage, Stage::Failed);
        assert!(item.payload.records.is_none());
    }

    #[tokio::test]
    async fn test_lenient_policy_swallows_listing_failure() {
        let client = StaticClient::new("ExampleRepo").broken_listing("s1");
        let mut item = gathered("s1", "Papers");
        let err = fetch_records(&client, &OAI_DC, FetchPolicy::Lenient, &mut item)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::NoRecords { .. }));
        assert_eq!(item.stage, Stage::Failed);
    }

    #[tokio::test]
    async fn test_strict_policy_surfaces_listing_failure() {
        let client = StaticClient::new("ExampleRepo").broken_listing("s1");
        let mut item = gathered("s1", "Papers");
        let err = fetch_records(&client, &OAI_DC, FetchPolicy::Strict, &mut item)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Listing { .. }));
        assert!(err.to_string().contains("read timed out"));
        assert_eq!(item.stage, Stage::Failed);
    }

    #[tokio::test]
    async fn test_refuses_items_past_gather() {
        let client = StaticClient::new("ExampleRepo");
        let mut item = gathered("s1", "Papers");
        item.stage = Stage::Imported;
        let err = fetch_records(&client, &OAI_DC, FetchPolicy::Lenient, &mut item)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::InvalidStage { .. }));
        assert_eq!(item.stage, Stage::Imported);
    }
}
