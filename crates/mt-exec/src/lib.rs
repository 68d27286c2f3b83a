//! mt-exec - Query execution for Modeltable
//!
//! A parsed SELECT is lowered into a [`Plan`], its FROM-clause
//! relations are bound by the [`Resolver`] (tables, inlined views,
//! predictors pinned to a version, project system tables), and the
//! [`Executor`] evaluates the plan bottom-up over fully materialized row
//! batches. [`QueryEngine`] ties these together behind `execute_sql`.

pub mod engine;
pub mod error;
pub mod executor;
pub mod lowering;
pub mod plan;
pub mod resolver;
pub mod system;

pub use engine::QueryEngine;
pub use error::{ExecError, ExecResult};
pub use executor::Executor;
pub use lowering::lower_statement;
pub use plan::{Expr, JoinKind, Plan, RelationRef, ScanSource};
pub use resolver::{Resolved, Resolver};
pub use system::SystemTable;
