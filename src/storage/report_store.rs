//! Report store: the read/write surface shared by both storage paths

use crate::core::record::EventRecord;
use crate::core::temporal::Timestamp;
use crate::error::Result;
use crate::query::options::{QueryOptions, QueryResult, StoreStats};
use async_trait::async_trait;

/// Trait for telemetry store implementations
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Accept records for persistence.
    ///
    /// Returns once the records are accepted, not once they are durable.
    async fn insert_reports(&self, records: Vec<EventRecord>) -> Result<()>;

    /// Filtered, paginated read. See [`QueryResult`] for when `total` is exact.
    async fn query(&self, options: &QueryOptions) -> Result<QueryResult>;

    /// Exact number of records matching `options`, ignoring pagination
    async fn count(&self, options: &QueryOptions) -> Result<usize>;

    /// Every record within the bounds, newest first
    async fn get_all_by_range(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
    ) -> Result<Vec<EventRecord>>;

    /// Aggregate counts
    async fn stats(&self) -> Result<StoreStats>;

    /// Delete records older than `before`; returns how many segments or
    /// records were removed, depending on the store's granularity
    async fn delete_before(&self, before: Timestamp) -> Result<usize>;

    /// Remove everything, including unflushed records
    async fn clear_all(&self) -> Result<()>;

    /// Make every accepted record durable
    async fn flush(&self) -> Result<()>;

    /// Flush and release resources
    async fn close(&self) -> Result<()>;
}
