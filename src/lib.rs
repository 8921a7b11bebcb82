//! Telemetry-Store: segmented persistence and querying for security telemetry
//!
//! Records (CSP violations, network requests and other security events)
//! are bucketed into daily segments per record type.
//!
//! # Core Concepts
//!
//! - **Ingest buffer**: batches records per segment key and flushes them on
//!   a size threshold or a shared timer, re-queueing failed batches
//! - **Storage adapter**: the pluggable persistence seam; a filesystem
//!   implementation ships with the crate
//! - **Indexed store**: an in-memory store answering paginated queries
//!   through timestamp-index cursors
//! - **Retention**: deletion of whole daily segments older than a cutoff
//!
//! # Example
//!
//! ```no_run
//! use telemetry_store::prelude::*;
//!
//! # async fn example() -> telemetry_store::error::Result<()> {
//! let db = TelemetryDB::open(&StoreConfig::default()).await?;
//!
//! let page = db.get_violations(&QueryOptions::new().limit(20)).await?;
//! println!("{} of {} violations", page.data.len(), page.total);
//!
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod index;
pub mod query;
pub mod storage;

/// Main database type
pub mod db;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::core::*;
    pub use crate::db::{Page, TelemetryDB};
    pub use crate::error::{Error, Result};
    pub use crate::query::{QueryOptions, QueryResult, SortOrder, StoreStats};
    pub use crate::storage::{FileSystemAdapter, ReportStore, StorageAdapter};
}
