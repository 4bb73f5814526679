//! Protocol client capability set.
//!
//! The harvester does not speak OAI-PMH itself. It needs three verbs from
//! whatever client it is handed: `Identify`, `ListSets` and `ListRecords`.
//! Verb encoding, XML parsing and resumption tokens belong to the client.

use async_trait::async_trait;

use crate::error::ProtocolError;
use crate::models::{Identity, RawRecord, SetSpec};

/// Metadata profile requested from `ListRecords`.
///
/// Passed explicitly into every retrieval call; there is no global reader
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataProfile {
    /// Value of the `metadataPrefix` argument.
    pub prefix: &'static str,
}

/// Unqualified Dublin Core, the only profile the import stage understands.
pub const OAI_DC: MetadataProfile = MetadataProfile { prefix: "oai_dc" };

const SUPPORTED: &[MetadataProfile] = &[OAI_DC];

impl MetadataProfile {
    /// Look up a supported profile by its prefix.
    pub fn from_prefix(prefix: &str) -> Option<MetadataProfile> {
        SUPPORTED.iter().copied().find(|p| p.prefix == prefix)
    }
}

impl Default for MetadataProfile {
    fn default() -> Self {
        OAI_DC
    }
}

/// A client able to answer the three verbs the pipeline uses.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// `Identify`: the repository's declared name becomes the domain
    /// collection.
    async fn identify(&self) -> Result<Identity, ProtocolError>;

    /// `ListSets`. Returns [`ProtocolError::NoSetHierarchy`] when the
    /// repository does not organise records into sets.
    async fn list_sets(&self) -> Result<Vec<SetSpec>, ProtocolError>;

    /// `ListRecords` for one set, all pages. Deleted records come back with
    /// `metadata: None`.
    async fn list_records(
        &self,
        profile: &MetadataProfile,
        set_id: &str,
    ) -> Result<Vec<RawRecord>, ProtocolError>;
}

/// Reconstruct the `GetRecord` URL for a record.
pub fn get_record_url(base_url: &str, identifier: &str, profile: &MetadataProfile) -> String {
    format!(
        "{}?verb=GetRecord&identifier={}&metadataPrefix={}",
        base_url, identifier, profile.prefix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_oai_dc_is_supported() {
        assert_eq!(MetadataProfile::from_prefix("oai_dc"), Some(OAI_DC));
        assert_eq!(MetadataProfile::from_prefix("marc21"), None);
    }

    #[test]
    fn test_get_record_url() {
        assert_eq!(
            get_record_url("http://repo.example.org/oai", "rec1", &OAI_DC),
            "http://repo.example.org/oai?verb=GetRecord&identifier=rec1&metadataPrefix=oai_dc"
        );
    }
}
