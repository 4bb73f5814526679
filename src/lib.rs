//! # OAI Harvest
//!
//! Harvests metadata records from an OAI-PMH style repository into a
//! dataset catalog.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────────┐   ┌──────────┐
//! │  Protocol   │──▶│ gather ─▶ fetch ─▶ import │──▶│ Catalog  │
//! │  (snapshot) │   │      (work items)        │   │ (SQLite) │
//! └─────────────┘   └────────────┬─────────────┘   └──────────┘
//!                                ▼
//!                          ┌──────────┐
//!                          │  Ledger  │
//!                          │ (SQLite) │
//!                          └──────────┘
//! ```
//!
//! The stage logic lives in `oai-harvest-core`; this crate supplies the
//! SQLite backends, the snapshot client, configuration and the `oaih` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! oaih init                     # create database
//! oaih harvest                  # harvest the configured source
//! oaih harvest --query Science  # only sets whose name contains "Science"
//! oaih runs                     # list runs and item stages
//! oaih errors <run_id>          # inspect failures
//! oaih resume <run_id>          # continue unfinished items
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_catalog`] | Transactional SQLite catalog |
//! | [`sqlite_ledger`] | SQLite run, work item and error ledger |
//! | [`snapshot`] | Protocol client replaying a captured repository |
//! | [`harvest`] | `harvest` and `resume` commands |
//! | [`status`] | `runs`, `items` and `errors` commands |
//! | [`dataset`] | `dataset` command |

pub mod config;
pub mod dataset;
pub mod db;
pub mod harvest;
pub mod logging;
pub mod migrate;
pub mod snapshot;
pub mod sqlite_catalog;
pub mod sqlite_ledger;
pub mod status;
