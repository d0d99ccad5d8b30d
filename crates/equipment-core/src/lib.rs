//! Equipment dataset ingestion, aggregation and retention.
//!
//! Raw CSV bytes are decoded and checked for the required columns, reduced to
//! per-dataset aggregates, persisted atomically with their rows, and each
//! owner's history is trimmed to a fixed number of recent uploads.

pub mod error;
pub mod schema;
pub mod validator;
pub mod aggregate;
pub mod store;
pub mod retention;
pub mod views;
pub mod service;

pub use error::*;
pub use schema::*;
pub use validator::{Table, validate_columns, validate_equipment_table};
pub use aggregate::{aggregate, Aggregate};
pub use store::{DatasetStore, MemoryStore, prepare};
pub use retention::{RetentionPolicy, DEFAULT_KEEP};
pub use views::{brief, full, BriefView, EquipmentView, FullView};
pub use service::{EquipmentService, FetchPolicy, DEFAULT_HISTORY_LIMIT};
