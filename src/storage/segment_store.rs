//! Segment-backed report store.
//!
//! Writes go through the [`IngestBuffer`]; reads force a flush of every
//! pending key first and then work from the adapter's listing APIs, so a
//! query always sees every record accepted before it started. Totals on
//! this path are always exact because the matching segments are decoded in
//! full.

use crate::config::StoreConfig;
use crate::core::record::{EventRecord, RecordKind};
use crate::core::temporal::Timestamp;
use crate::error::Result;
use crate::query::filter::{compute_stats, RecordFilter};
use crate::query::options::{QueryOptions, QueryResult, SortOrder, StoreStats};
use crate::storage::adapter::StorageAdapter;
use crate::storage::fs_adapter::FileSystemAdapter;
use crate::storage::ingest::IngestBuffer;
use crate::storage::report_store::ReportStore;
use crate::storage::retention::RetentionManager;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

/// Report store persisting daily segments through a [`StorageAdapter`]
pub struct SegmentStore {
    ingest: IngestBuffer,
    retention: RetentionManager,
}

impl SegmentStore {
    /// Open a store over any adapter
    pub async fn open(adapter: Arc<dyn StorageAdapter>, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        adapter.init().await?;

        let ingest = IngestBuffer::new(adapter, config);
        Ok(Self {
            retention: RetentionManager::new(ingest.clone()),
            ingest,
        })
    }

    /// Open a filesystem-backed store at `config.root_dir`
    pub async fn open_dir(config: &StoreConfig) -> Result<Self> {
        let adapter = Arc::new(FileSystemAdapter::new(&config.root_dir));
        Self::open(adapter, config).await
    }

    pub fn ingest(&self) -> &IngestBuffer {
        &self.ingest
    }

    pub fn retention(&self) -> &RetentionManager {
        &self.retention
    }

    /// Flush before a read. A failed flush leaves its records buffered for
    /// retry; the read proceeds on what is already persisted.
    async fn flush_for_read(&self) {
        if let Err(e) = self.ingest.flush_all().await {
            warn!(
                error = %e,
                pending = self.ingest.pending_count(),
                "read proceeding without unflushed records"
            );
        }
    }

    /// Decode every persisted record matching `options`, sorted per `options.order`
    async fn load_matching(&self, options: &QueryOptions) -> Result<Vec<EventRecord>> {
        let mut kinds = if options.types.is_empty() {
            RecordKind::ALL.to_vec()
        } else {
            options.types.clone()
        };
        kinds.sort();
        kinds.dedup();

        let filter = RecordFilter::from_options(options);
        let adapter = self.ingest.adapter();
        let mut records = Vec::new();

        for kind in kinds {
            let segment_type = kind.segment_type();
            let segments = match (options.since, options.until) {
                (None, None) => adapter.list_by_type(segment_type).await?,
                (since, until) => {
                    let start = since.map_or(NaiveDate::MIN, |ts| ts.date());
                    let end = until.map_or(NaiveDate::MAX, |ts| ts.date());
                    adapter.list_by_date_range(segment_type, start, end).await?
                }
            };

            for segment in segments {
                records.extend(
                    segment
                        .records()?
                        .into_iter()
                        .filter(|r| options.in_bounds(r.timestamp) && filter.matches(r)),
                );
            }
        }

        records.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        if options.order == SortOrder::Desc {
            records.reverse();
        }
        Ok(records)
    }
}

#[async_trait]
impl ReportStore for SegmentStore {
    async fn insert_reports(&self, records: Vec<EventRecord>) -> Result<()> {
        self.ingest.insert(records)
    }

    async fn query(&self, options: &QueryOptions) -> Result<QueryResult> {
        self.flush_for_read().await;

        let matching = self.load_matching(options).await?;
        let total = matching.len();
        let page: Vec<EventRecord> = matching
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect();

        Ok(QueryResult {
            has_more: options.offset.saturating_add(page.len()) < total,
            records: page,
            total,
            total_is_exact: true,
        })
    }

    async fn count(&self, options: &QueryOptions) -> Result<usize> {
        self.flush_for_read().await;
        Ok(self.load_matching(options).await?.len())
    }

    async fn get_all_by_range(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
    ) -> Result<Vec<EventRecord>> {
        self.flush_for_read().await;

        let mut options = QueryOptions::new().order(SortOrder::Desc);
        options.since = since;
        options.until = until;
        self.load_matching(&options).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.flush_for_read().await;
        let records = self.load_matching(&QueryOptions::new()).await?;
        Ok(compute_stats(&records))
    }

    /// Deletes whole daily segments dated before `before`'s day; records
    /// earlier on that same day are kept.
    async fn delete_before(&self, before: Timestamp) -> Result<usize> {
        self.flush_for_read().await;
        self.retention.delete_all_before(before.date()).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.retention.clear_all().await
    }

    async fn flush(&self) -> Result<()> {
        self.ingest.flush_all().await
    }

    async fn close(&self) -> Result<()> {
        self.ingest.close().await
    }
}
