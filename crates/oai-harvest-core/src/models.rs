//! Core data models used throughout the harvester.
//!
//! These types represent the harvest source, the per-set work items that
//! flow through gather → fetch → import, the raw records retrieved from the
//! repository, and the structured error records kept in the ledger.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The repository being harvested. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSource {
    pub url: String,
    /// Case-sensitive substring a set name must contain to be harvested.
    #[serde(default)]
    pub query: Option<String>,
}

impl HarvestSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// Repository identity returned by `Identify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub repository_name: String,
}

/// A set advertised by `ListSets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSpec {
    pub id: String,
    pub name: String,
}

impl SetSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Field name → ordered values, as delivered by the Dublin Core reader.
pub type FieldMap = BTreeMap<String, Vec<String>>;

/// A record returned by `ListRecords`.
///
/// `metadata` is `None` for deleted records (tombstones).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub identifier: String,
    pub metadata: Option<FieldMap>,
}

impl RawRecord {
    /// First value of `field`, if the field is present and non-empty.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(field))
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Pipeline stage of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Gathered,
    Fetched,
    Imported,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Gathered => "gathered",
            Stage::Fetched => "fetched",
            Stage::Imported => "imported",
            Stage::Failed => "failed",
        }
    }

    /// `Imported` and `Failed` end an item's journey.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Imported | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gathered" => Ok(Stage::Gathered),
            "fetched" => Ok(Stage::Fetched),
            "imported" => Ok(Stage::Imported),
            "failed" => Ok(Stage::Failed),
            other => anyhow::bail!("unknown work item stage: '{}'", other),
        }
    }
}

/// Opaque payload carried by a work item between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPayload {
    pub set_id: String,
    pub set_name: String,
    pub domain: String,
    /// Present once the fetch stage has run successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RawRecord>>,
}

/// One set's journey through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub run_id: String,
    pub stage: Stage,
    pub payload: WorkPayload,
}

impl WorkItem {
    pub fn record_count(&self) -> usize {
        self.payload.records.as_ref().map_or(0, Vec::len)
    }
}

/// A harvest run: one pass over a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRun {
    pub id: String,
    pub source: HarvestSource,
    pub created_at: DateTime<Utc>,
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorScope {
    Gather,
    Fetch,
    Import,
}

impl ErrorScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorScope::Gather => "gather",
            ErrorScope::Fetch => "fetch",
            ErrorScope::Import => "import",
        }
    }
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gather" => Ok(ErrorScope::Gather),
            "fetch" => Ok(ErrorScope::Fetch),
            "import" => Ok(ErrorScope::Import),
            other => anyhow::bail!("unknown error scope: '{}'", other),
        }
    }
}

/// Entry in the error ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestErrorRecord {
    pub run_id: String,
    pub item_id: Option<String>,
    pub scope: ErrorScope,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl HarvestErrorRecord {
    pub fn new(
        run_id: &str,
        item_id: Option<&str>,
        scope: ErrorScope,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            item_id: item_id.map(str::to_string),
            scope,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_round_trips_through_str() {
        for stage in [Stage::Gathered, Stage::Fetched, Stage::Imported, Stage::Failed] {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert!("pending".parse::<Stage>().is_err());
    }

    #[test]
    fn test_payload_omits_records_until_fetched() {
        let payload = WorkPayload {
            set_id: "s1".into(),
            set_name: "Papers".into(),
            domain: "ExampleRepo".into(),
            records: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("records"));
        let back: WorkPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_first_value_of_missing_field() {
        let rec = RawRecord {
            identifier: "rec1".into(),
            metadata: Some(FieldMap::from([("title".to_string(), vec![])])),
        };
        assert_eq!(rec.first("title"), None);
        assert_eq!(rec.first("creator"), None);
    }
}
