//! Main database implementation

use crate::config::StoreConfig;
use crate::core::record::{EventRecord, RecordKind};
use crate::core::temporal::Timestamp;
use crate::error::Result;
use crate::index::store::IndexedStore;
use crate::query::options::{QueryOptions, QueryResult, StoreStats};
use crate::storage::report_store::ReportStore;
use crate::storage::segment_store::SegmentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// One page of a query, as returned by the `get_*` methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<EventRecord>,
    pub total: usize,
    pub has_more: bool,
    pub total_is_exact: bool,
}

impl From<QueryResult> for Page {
    fn from(result: QueryResult) -> Self {
        Self {
            data: result.records,
            total: result.total,
            has_more: result.has_more,
            total_is_exact: result.total_is_exact,
        }
    }
}

/// Telemetry database
#[derive(Clone)]
pub struct TelemetryDB {
    store: Arc<dyn ReportStore>,
}

impl TelemetryDB {
    /// Create a new in-memory database
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(IndexedStore::new()))
    }

    /// Open a database persisting daily segments under `config.root_dir`
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let store = SegmentStore::open_dir(config).await?;
        info!(root = %config.root_dir.display(), "opened segment store");
        Ok(Self::with_store(Arc::new(store)))
    }

    pub fn with_store(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    /// Hand records to the store. Persistence happens in the background;
    /// errors surfaced here are a closed store or a record whose day cannot
    /// be bucketed.
    pub async fn insert_reports(&self, records: Vec<EventRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.store.insert_reports(records).await
    }

    pub async fn get_reports(&self, options: &QueryOptions) -> Result<Page> {
        Ok(self.store.query(options).await?.into())
    }

    pub async fn get_violations(&self, options: &QueryOptions) -> Result<Page> {
        self.get_of_kind(RecordKind::Violation, options).await
    }

    pub async fn get_network_requests(&self, options: &QueryOptions) -> Result<Page> {
        self.get_of_kind(RecordKind::NetworkRequest, options).await
    }

    async fn get_of_kind(&self, kind: RecordKind, options: &QueryOptions) -> Result<Page> {
        let options = options.clone().types([kind]);
        self.get_reports(&options).await
    }

    pub async fn get_stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    /// Every record at or after `since`, newest first
    pub async fn get_reports_since(&self, since: Timestamp) -> Result<Vec<EventRecord>> {
        self.store.get_all_by_range(Some(since), None).await
    }

    pub async fn delete_old_reports(&self, before: Timestamp) -> Result<usize> {
        self.store.delete_before(before).await
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear_all().await
    }

    /// Flush pending writes
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}
