//! Set discovery: the gather stage.
//!
//! Asks the repository who it is and which sets it exposes. Each surviving
//! set becomes one unit of work.

use tracing::{debug, warn};

use crate::error::{HarvestError, ProtocolError};
use crate::models::{HarvestSource, SetSpec};
use crate::protocol::ProtocolClient;

/// Set id of the synthetic set used when a repository has no sets.
pub const DEFAULT_SET_ID: &str = "1";
/// Set name of the synthetic set used when a repository has no sets.
pub const DEFAULT_SET_NAME: &str = "Default";

/// Result of a successful discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Repository name; also the name of the domain-level collection.
    pub domain: String,
    pub sets: Vec<SetSpec>,
    /// Recoverable problems to file in the error ledger.
    pub warnings: Vec<String>,
}

/// Keep the sets whose name contains `query`. No query, or an empty one,
/// keeps everything. Order and duplicates are preserved.
pub fn filter_sets(sets: Vec<SetSpec>, query: Option<&str>) -> Vec<SetSpec> {
    match query {
        Some(q) if !q.is_empty() => sets.into_iter().filter(|s| s.name.contains(q)).collect(),
        _ => sets,
    }
}

/// Discover the domain and the sets to harvest.
///
/// Fails only when the repository cannot be queried at all. A repository
/// without a set hierarchy yields the single synthetic `Default` set and a
/// warning.
pub async fn discover<P>(client: &P, source: &HarvestSource) -> Result<Discovery, HarvestError>
where
    P: ProtocolClient + ?Sized,
{
    let unreachable = |source_err: ProtocolError| HarvestError::Unreachable {
        url: source.url.clone(),
        source: source_err,
    };

    let identity = client.identify().await.map_err(unreachable)?;
    let domain = identity.repository_name;
    debug!(domain = %domain, query = ?source.query, "identified repository");

    let mut warnings = Vec::new();
    let sets = match client.list_sets().await {
        Ok(sets) => filter_sets(sets, source.query.as_deref()),
        Err(ProtocolError::NoSetHierarchy) => {
            warn!(url = %source.url, "repository has no set hierarchy, using default set");
            warnings.push("Could not fetch sets: repository has no set hierarchy".to_string());
            vec![SetSpec::new(DEFAULT_SET_ID, DEFAULT_SET_NAME)]
        }
        Err(e) => return Err(unreachable(e)),
    };

    Ok(Discovery {
        domain,
        sets,
        warnings,
    })
}
