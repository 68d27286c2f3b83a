//! mt-sql - SQL layer for Modeltable
//!
//! Wraps sqlparser-rs with the DuckDB dialect, rewrites predictor version
//! pins (`model.3`) into a form the parser accepts, and renders the template
//! variables available to scheduled job queries.

pub mod dialect;
pub mod error;
pub mod parser;
pub mod template;

pub use dialect::DuckDbDialect;
pub use error::{SqlError, SqlResult};
pub use parser::{normalize_version_pins, SqlParser};
pub use template::{render_job_query, JobTemplateVars};
