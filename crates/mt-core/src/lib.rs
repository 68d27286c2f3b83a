//! mt-core - Core library for Modeltable
//!
//! This crate provides the shared vocabulary used by every other Modeltable
//! crate: strongly-typed names, scalar values and row batches, the model and
//! job records kept in the metadata store, recurrence schedules, per-key
//! async locks, an injectable clock, configuration parsing, and the error
//! taxonomy.

pub mod batch;
pub mod clock;
pub mod config;
pub mod error;
pub mod job;
pub mod locks;
pub mod model;
pub mod names;
mod newtype_string;
pub mod value;

pub use batch::{lookup_column, ColumnId, ColumnLookup, RowBatch};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use job::{Job, JobHistoryEntry, JobId, Schedule};
pub use locks::KeyedLocks;
pub use model::{ModelId, ModelRecord, ModelVersion, TrainingParams, VersionStatus};
pub use names::{JobName, ModelName, ProjectName, ViewName};
pub use value::{parse_timestamp, GroupKey, ScalarType, Value, TIMESTAMP_FORMAT};
