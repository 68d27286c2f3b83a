//! Metadata store for Modeltable.
//!
//! Defines the store traits consumed by the model manager, the scheduler and
//! the executor, with two implementations: [`MetaDb`], a DuckDB database
//! (default `target/meta.duckdb`) migrated from embedded DDL, and
//! [`MemoryStore`] for tests and ephemeral sessions.

pub mod connection;
pub mod ddl;
pub mod error;
mod jobs;
pub mod memory;
pub mod migration;
mod models;
pub(crate) mod row_helpers;
pub mod store;
mod views;

pub use connection::MetaDb;
pub use error::{MetaError, MetaResult};
pub use memory::MemoryStore;
pub use store::{JobStore, MetaStore, ModelStore, ViewRecord, ViewStore};
