//! mt-db - Data-source adapters for Modeltable
//!
//! This crate provides the `DataSource` trait through which the executor
//! reads physical tables, and three implementations: a DuckDB database, a
//! directory of csv/json/parquet files read through DuckDB, and an
//! in-process source of registered batches.

pub(crate) mod convert;
pub mod duckdb;
pub mod error;
pub mod files;
pub mod memory;
pub mod traits;

pub use crate::duckdb::DuckDbSource;
pub use error::{DbError, DbResult};
pub use files::{FileSource, ALLOWED_EXTENSIONS};
pub use memory::MemorySource;
pub use traits::DataSource;
