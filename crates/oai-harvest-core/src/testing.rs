//! Scripted protocol client for unit tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::ProtocolError;
use crate::models::{FieldMap, Identity, RawRecord, SetSpec};
use crate::protocol::{MetadataProfile, ProtocolClient};

#[derive(Default)]
pub struct StaticClient {
    name: String,
    sets: Option<Vec<SetSpec>>,
    records: HashMap<String, Vec<RawRecord>>,
    broken_sets: HashSet<String>,
    unreachable: bool,
}

impl StaticClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sets: Some(Vec::new()),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn with_set(mut self, id: &str, name: &str) -> Self {
        self.sets
            .get_or_insert_with(Vec::new)
            .push(SetSpec::new(id, name));
        self
    }

    pub fn without_sets(mut self) -> Self {
        self.sets = None;
        self
    }

    pub fn with_record(mut self, set_id: &str, record: RawRecord) -> Self {
        self.records
            .entry(set_id.to_string())
            .or_default()
            .push(record);
        self
    }

    /// `ListRecords` for `set_id` fails with a transport error.
    pub fn broken_listing(mut self, set_id: &str) -> Self {
        self.broken_sets.insert(set_id.to_string());
        self
    }
}

#[async_trait]
impl ProtocolClient for StaticClient {
    async fn identify(&self) -> Result<Identity, ProtocolError> {
        if self.unreachable {
            return Err(ProtocolError::Transport("connection refused".into()));
        }
        Ok(Identity {
            repository_name: self.name.clone(),
        })
    }

    async fn list_sets(&self) -> Result<Vec<SetSpec>, ProtocolError> {
        self.sets.clone().ok_or(ProtocolError::NoSetHierarchy)
    }

    async fn list_records(
        &self,
        _profile: &MetadataProfile,
        set_id: &str,
    ) -> Result<Vec<RawRecord>, ProtocolError> {
        if self.broken_sets.contains(set_id) {
            return Err(ProtocolError::Transport("read timed out".into()));
        }
        Ok(self.records.get(set_id).cloned().unwrap_or_default())
    }
}

/// Build a record from `(field, values)` pairs.
pub fn record(identifier: &str, fields: &[(&str, &[&str])]) -> RawRecord {
    let metadata: FieldMap = fields
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect();
    RawRecord {
        identifier: identifier.to_string(),
        metadata: Some(metadata),
    }
}

pub fn tombstone(identifier: &str) -> RawRecord {
    RawRecord {
        identifier: identifier.to_string(),
        metadata: None,
    }
}
