//! # oai-harvest core
//!
//! Runtime-agnostic logic for harvesting an OAI-PMH repository into a
//! catalog of datasets, tags and collections.
//!
//! This crate contains no sqlx, tokio runtime or filesystem I/O. Protocol
//! access, catalog storage and the work-item ledger are capability traits;
//! in-memory implementations of the latter two live alongside them.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Harvest source, work items, raw records, error records |
//! | [`slug`] | Dataset names from titles, tag sanitizing |
//! | [`protocol`] | `ProtocolClient` trait and the Dublin Core profile |
//! | [`catalog`] | `Catalog` trait, import batches, in-memory catalog |
//! | [`ledger`] | `Ledger` trait, in-memory ledger |
//! | [`discover`] | Gather stage |
//! | [`fetch`] | Fetch stage |
//! | [`import`] | Import stage |
//! | [`pipeline`] | `Harvester`: runs, resumption, bounded worker pool |

pub mod catalog;
pub mod discover;
pub mod error;
pub mod fetch;
pub mod import;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod protocol;
pub mod slug;

#[cfg(test)]
mod testing;

pub use error::{HarvestError, ProtocolError};
pub use pipeline::{HarvestOptions, Harvester, RunReport};
