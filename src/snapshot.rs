//! Snapshot protocol client.
//!
//! Replays a repository captured as JSON instead of talking to a live
//! endpoint:
//!
//! ```json
//! {
//!   "repository_name": "Example Repository",
//!   "sets": [{ "id": "s1", "name": "Science" }],
//!   "records": {
//!     "s1": [
//!       { "identifier": "oai:example:1", "metadata": { "title": ["Hello World"] } },
//!       { "identifier": "oai:example:2", "metadata": null }
//!     ]
//!   }
//! }
//! ```
//!
//! `"sets": null` describes a repository without a set hierarchy. A missing
//! or unreadable file surfaces as a transport failure on the first call, the
//! same way an unreachable endpoint would.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use oai_harvest_core::models::{Identity, RawRecord, SetSpec};
use oai_harvest_core::protocol::{MetadataProfile, ProtocolClient, OAI_DC};
use oai_harvest_core::ProtocolError;

#[derive(Debug, Clone, Deserialize)]
struct Snapshot {
    repository_name: String,
    #[serde(default)]
    sets: Option<Vec<SetSpec>>,
    #[serde(default)]
    records: HashMap<String, Vec<RawRecord>>,
}

pub struct SnapshotClient {
    path: PathBuf,
    snapshot: Result<Snapshot, ProtocolError>,
}

impl SnapshotClient {
    /// Read and parse `path`. Failures are kept and reported by every
    /// protocol call.
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            snapshot: load(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Result<&Snapshot, ProtocolError> {
        self.snapshot.as_ref().map_err(Clone::clone)
    }
}

fn load(path: &Path) -> Result<Snapshot, ProtocolError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ProtocolError::Transport(format!("cannot read snapshot {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ProtocolError::Protocol(format!("malformed snapshot {}: {}", path.display(), e))
    })
}

#[async_trait]
impl ProtocolClient for SnapshotClient {
    async fn identify(&self) -> Result<Identity, ProtocolError> {
        Ok(Identity {
            repository_name: self.snapshot()?.repository_name.clone(),
        })
    }

    async fn list_sets(&self) -> Result<Vec<SetSpec>, ProtocolError> {
        self.snapshot()?
            .sets
            .clone()
            .ok_or(ProtocolError::NoSetHierarchy)
    }

    async fn list_records(
        &self,
        profile: &MetadataProfile,
        set_id: &str,
    ) -> Result<Vec<RawRecord>, ProtocolError> {
        if *profile != OAI_DC {
            return Err(ProtocolError::Protocol(format!(
                "cannot disseminate format '{}'",
                profile.prefix
            )));
        }
        // An unknown set is an empty listing, like `noRecordsMatch`.
        Ok(self
            .snapshot()?
            .records
            .get(set_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_snapshot(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("repo.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_replays_sets_and_records() {
        let tmp = TempDir::new().unwrap();
        let path = write_snapshot(
            &tmp,
            r#"{
                "repository_name": "Example Repository",
                "sets": [{"id": "s1", "name": "Science"}],
                "records": {
                    "s1": [
                        {"identifier": "oai:x:1", "metadata": {"title": ["Hello World"]}},
                        {"identifier": "oai:x:2", "metadata": null}
                    ]
                }
            }"#,
        );
        let client = SnapshotClient::open(&path);

        let identity = client.identify().await.unwrap();
        assert_eq!(identity.repository_name, "Example Repository");

        let sets = client.list_sets().await.unwrap();
        assert_eq!(sets, vec![SetSpec::new("s1", "Science")]);

        let records = client.list_records(&OAI_DC, "s1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].first("title"), Some("Hello World"));
        assert!(records[1].metadata.is_none());

        let none = client.list_records(&OAI_DC, "s9").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_null_sets_means_no_hierarchy() {
        let tmp = TempDir::new().unwrap();
        let path = write_snapshot(&tmp, r#"{"repository_name": "Flat", "sets": null}"#);
        let client = SnapshotClient::open(&path);

        assert_eq!(
            client.list_sets().await.unwrap_err(),
            ProtocolError::NoSetHierarchy
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_transport_error() {
        let tmp = TempDir::new().unwrap();
        let client = SnapshotClient::open(&tmp.path().join("nope.json"));

        match client.identify().await {
            Err(ProtocolError::Transport(msg)) => assert!(msg.contains("nope.json")),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_file_is_protocol_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_snapshot(&tmp, "{ not json");
        let client = SnapshotClient::open(&path);

        assert!(matches!(
            client.identify().await,
            Err(ProtocolError::Protocol(_))
        ));
    }
}
