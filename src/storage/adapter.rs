//! Storage adapter: pluggable backend for persisted segments

use crate::error::Result;
use crate::storage::retention;
use crate::storage::segment::{Segment, SegmentKey};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;

/// Backend contract for segment persistence.
///
/// Missing segments are not errors: `load` returns `Ok(None)` and
/// `delete` of an absent key succeeds. Listing a store that has never been
/// written to yields an empty list.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Prepare the backend (create directories, tables, ...)
    async fn init(&self) -> Result<()>;

    /// Persist a segment, replacing any previous segment with the same key
    async fn save(&self, segment: &Segment) -> Result<()>;

    /// Load a segment by key
    async fn load(&self, key: &SegmentKey) -> Result<Option<Segment>>;

    /// All segments of one type
    async fn list_by_type(&self, segment_type: &str) -> Result<Vec<Segment>>;

    /// Segments of one type whose date bucket is within `[start, end]`
    async fn list_by_date_range(
        &self,
        segment_type: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Segment>> {
        let segments = self.list_by_type(segment_type).await?;
        Ok(segments
            .into_iter()
            .filter(|s| s.meta.date >= start && s.meta.date <= end)
            .collect())
    }

    /// Delete a segment; absent keys are ignored
    async fn delete(&self, key: &SegmentKey) -> Result<()>;

    /// Delete every segment of `segment_type` dated strictly before `before`
    async fn delete_before_date(&self, segment_type: &str, before: NaiveDate) -> Result<usize> {
        retention::delete_segments_before(self, segment_type, before).await
    }

    /// Remove every segment
    async fn clear(&self) -> Result<()>;

    /// Release backend resources
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory adapter (for testing and ephemeral stores)
#[derive(Default)]
pub struct MemoryAdapter {
    segments: DashMap<SegmentKey, Segment>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, segment: &Segment) -> Result<()> {
        self.segments.insert(segment.key(), segment.clone());
        Ok(())
    }

    async fn load(&self, key: &SegmentKey) -> Result<Option<Segment>> {
        Ok(self.segments.get(key).map(|s| s.value().clone()))
    }

    async fn list_by_type(&self, segment_type: &str) -> Result<Vec<Segment>> {
        let mut segments: Vec<Segment> = self
            .segments
            .iter()
            .filter(|entry| entry.key().segment_type == segment_type)
            .map(|entry| entry.value().clone())
            .collect();
        segments.sort_by_key(|s| s.meta.date);
        Ok(segments)
    }

    async fn delete(&self, key: &SegmentKey) -> Result<()> {
        self.segments.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.segments.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::codec::DEFAULT_COMPRESSION_LEVEL;

    fn segment(segment_type: &str, date: &str) -> Segment {
        let key = SegmentKey::new(segment_type, date.parse().unwrap());
        Segment::build(&key, &[], None, DEFAULT_COMPRESSION_LEVEL).unwrap()
    }

    #[tokio::test]
    async fn test_memory_adapter_crud() {
        let adapter = MemoryAdapter::new();
        adapter.init().await.unwrap();

        let seg = segment("network-requests", "2024-01-30");
        adapter.save(&seg).await.unwrap();

        assert_eq!(adapter.load(&seg.key()).await.unwrap(), Some(seg.clone()));
        assert_eq!(adapter.list_by_type("network-requests").await.unwrap().len(), 1);
        assert!(adapter.list_by_type("network").await.unwrap().is_empty());

        adapter.delete(&seg.key()).await.unwrap();
        adapter.delete(&seg.key()).await.unwrap();
        assert_eq!(adapter.load(&seg.key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_by_date_range_is_inclusive() {
        let adapter = MemoryAdapter::new();
        for date in ["2024-01-30", "2024-01-31", "2024-02-01", "2024-02-02"] {
            adapter.save(&segment("csp-violations", date)).await.unwrap();
        }

        let listed = adapter
            .list_by_date_range(
                "csp-violations",
                "2024-01-31".parse().unwrap(),
                "2024-02-01".parse().unwrap(),
            )
            .await
            .unwrap();
        let dates: Vec<String> = listed.iter().map(|s| s.meta.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-31", "2024-02-01"]);
    }

    #[tokio::test]
    async fn test_default_delete_before_date() {
        let adapter = MemoryAdapter::new();
        for date in ["2024-01-30", "2024-01-31", "2024-02-01"] {
            adapter.save(&segment("csp-violations", date)).await.unwrap();
        }
        adapter.save(&segment("network-requests", "2024-01-01")).await.unwrap();

        let deleted = adapter
            .delete_before_date("csp-violations", "2024-02-01".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(adapter.len(), 2);
    }
}
