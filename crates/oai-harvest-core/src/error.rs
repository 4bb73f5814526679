//! Error types for the harvest pipeline.

use thiserror::Error;

use crate::models::{ErrorScope, Stage};

/// Failure reported by a protocol client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The repository could not be reached at all.
    #[error("transport error: {0}")]
    Transport(String),

    /// The repository answered with a protocol-level error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// `ListSets` is not supported by the repository.
    #[error("repository has no set hierarchy")]
    NoSetHierarchy,
}

/// Failure of a single pipeline stage.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Could not gather anything from {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: ProtocolError,
    },

    #[error("no records for set '{set_id}' ({set_name})")]
    NoRecords { set_id: String, set_name: String },

    #[error("record listing failed for set '{set}': {source}")]
    Listing {
        set: String,
        #[source]
        source: ProtocolError,
    },

    #[error("nothing to import")]
    NothingToImport,

    #[error("work item {id} is in stage {stage}, expected {expected}")]
    InvalidStage {
        id: String,
        stage: Stage,
        expected: Stage,
    },

    #[error("catalog commit failed: {0}")]
    Commit(#[source] anyhow::Error),

    #[error("ledger error: {0}")]
    Ledger(#[source] anyhow::Error),
}

impl HarvestError {
    /// Ledger scope an error is filed under.
    pub fn scope(&self) -> ErrorScope {
        match self {
            HarvestError::Unreachable { .. } => ErrorScope::Gather,
            HarvestError::NoRecords { .. } | HarvestError::Listing { .. } => ErrorScope::Fetch,
            HarvestError::NothingToImport | HarvestError::Commit(_) => ErrorScope::Import,
            HarvestError::InvalidStage { expected, .. } => match expected {
                Stage::Gathered => ErrorScope::Fetch,
                _ => ErrorScope::Import,
            },
            HarvestError::Ledger(_) => ErrorScope::Import,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes() {
        let err = HarvestError::Unreachable {
            url: "http://x".into(),
            source: ProtocolError::Transport("refused".into()),
        };
        assert_eq!(err.scope(), ErrorScope::Gather);
        assert!(err.to_string().starts_with("Could not gather anything from http://x"));
        assert_eq!(HarvestError::NothingToImport.scope(), ErrorScope::Import);
    }

    #[test]
    fn test_no_records_names_set_id_and_name() {
        let err = HarvestError::NoRecords {
            set_id: "s2".into(),
            set_name: "Withdrawn".into(),
        };
        assert_eq!(err.scope(), ErrorScope::Fetch);
        assert_eq!(err.to_string(), "no records for set 's2' (Withdrawn)");
    }
}
