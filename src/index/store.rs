//! In-memory indexed report store.
//!
//! Records are held in a map keyed by ID with a [`TimestampIndex`] beside it.
//! Reads go through the cursor executor. The store can optionally be backed
//! by a snapshot file, loaded on open and rewritten by [`IndexedStore::persist`].

use crate::core::record::{EventRecord, RecordId};
use crate::core::temporal::Timestamp;
use crate::error::Result;
use crate::index::temporal::{TimeRange, TimestampIndex};
use crate::query::executor;
use crate::query::filter::compute_stats;
use crate::query::options::{QueryOptions, QueryResult, StoreStats};
use crate::storage::codec::{decode_records, encode_records, DEFAULT_COMPRESSION_LEVEL};
use crate::storage::report_store::ReportStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Collection {
    records: HashMap<RecordId, EventRecord>,
    index: TimestampIndex,
}

impl Collection {
    fn insert(&mut self, record: EventRecord) {
        if let Some(previous) = self.records.get(&record.id) {
            self.index.remove(previous.timestamp, &previous.id);
        }
        self.index.insert(record.timestamp, record.id.clone());
        self.records.insert(record.id.clone(), record);
    }
}

/// Report store holding every record in memory behind a timestamp index
#[derive(Debug)]
pub struct IndexedStore {
    collection: RwLock<Collection>,
    snapshot_path: Option<PathBuf>,
    compression_level: i32,
}

impl Default for IndexedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexedStore {
    /// Volatile store with no snapshot
    pub fn new() -> Self {
        Self {
            collection: RwLock::new(Collection::default()),
            snapshot_path: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Store backed by a snapshot file; loads it if it exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut collection = Collection::default();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                for record in decode_records(&bytes)? {
                    collection.insert(record);
                }
                info!(path = %path.display(), records = collection.records.len(), "loaded snapshot");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no snapshot, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            collection: RwLock::new(collection),
            snapshot_path: Some(path),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        })
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.collection.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, id: &str) -> Option<EventRecord> {
        self.collection.read().await.records.get(id).cloned()
    }

    /// Write the snapshot, if this store has one
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let payload = {
            let collection = self.collection.read().await;
            let ordered: Vec<EventRecord> = collection
                .index
                .range(TimeRange::all())
                .filter_map(|id| collection.records.get(id).cloned())
                .collect();
            encode_records(&ordered, self.compression_level)?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &payload).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), bytes = payload.len(), "snapshot written");
        Ok(())
    }
}

#[async_trait]
impl ReportStore for IndexedStore {
    /// A record whose ID is already present replaces the stored one
    async fn insert_reports(&self, records: Vec<EventRecord>) -> Result<()> {
        let mut collection = self.collection.write().await;
        for record in records {
            collection.insert(record);
        }
        Ok(())
    }

    async fn query(&self, options: &QueryOptions) -> Result<QueryResult> {
        let collection = self.collection.read().await;
        Ok(executor::execute(&collection.index, &collection.records, options))
    }

    async fn count(&self, options: &QueryOptions) -> Result<usize> {
        let collection = self.collection.read().await;
        Ok(executor::count(&collection.index, &collection.records, options))
    }

    async fn get_all_by_range(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
    ) -> Result<Vec<EventRecord>> {
        let collection = self.collection.read().await;
        let mut records: Vec<EventRecord> = collection
            .index
            .range(TimeRange::new(since, until))
            .filter_map(|id| collection.records.get(id).cloned())
            .collect();
        records.reverse();
        Ok(records)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let collection = self.collection.read().await;
        Ok(compute_stats(collection.records.values()))
    }

    /// Deletes individual records strictly older than `before`
    async fn delete_before(&self, before: Timestamp) -> Result<usize> {
        let mut collection = self.collection.write().await;
        let drained = collection.index.drain_before(before);
        for id in &drained {
            collection.records.remove(id);
        }
        info!(before = %before, deleted = drained.len(), "deleted old records");
        Ok(drained.len())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut collection = self.collection.write().await;
        collection.records.clear();
        collection.index.clear();
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.persist().await
    }

    async fn close(&self) -> Result<()> {
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{Disposition, RecordKind, ViolationDetails};
    use crate::query::options::SortOrder;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn violation(id: &str, millis: i64, domain: &str) -> EventRecord {
        EventRecord::violation(
            domain,
            Timestamp::from_millis(millis),
            ViolationDetails {
                directive: "img-src".to_string(),
                blocked_url: "https://pixel.test".to_string(),
                disposition: Disposition::Enforce,
                source_file: None,
                line_number: None,
                column_number: None,
                status_code: None,
            },
        )
        .with_id(id)
    }

    fn event(id: &str, millis: i64, domain: &str) -> EventRecord {
        EventRecord::generic_event(domain, Timestamp::from_millis(millis), BTreeMap::new()).with_id(id)
    }

    fn ids(records: &[EventRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id()).collect()
    }

    async fn seeded() -> IndexedStore {
        let store = IndexedStore::new();
        store
            .insert_reports(vec![
                violation("a", 100, "x.test"),
                event("b", 200, "y.test"),
                violation("c", 300, "y.test"),
                event("d", 400, "x.test"),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_query_and_count() {
        let store = seeded().await;

        let page = store.query(&QueryOptions::new().limit(2)).await.unwrap();
        assert_eq!(ids(&page.records), ["d", "c"]);
        assert_eq!(page.total, 4);
        assert!(page.has_more);

        let only_violations = QueryOptions::new().types([RecordKind::Violation]);
        assert_eq!(store.count(&only_violations).await.unwrap(), 2);
        let asc = store
            .query(&only_violations.clone().order(SortOrder::Asc))
            .await
            .unwrap();
        assert_eq!(ids(&asc.records), ["a", "c"]);
        assert!(asc.total_is_exact);
    }

    #[tokio::test]
    async fn test_duplicate_id_replaces_record() {
        let store = seeded().await;
        store.insert_reports(vec![violation("a", 500, "z.test")]).await.unwrap();

        assert_eq!(store.len().await, 4);
        let newest = store.query(&QueryOptions::new().limit(1)).await.unwrap();
        assert_eq!(newest.records[0].domain, "z.test");
        assert_eq!(
            store
                .count(&QueryOptions::new().until(Timestamp::from_millis(150)))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_range_delete_and_stats() {
        let store = seeded().await;

        let range = store
            .get_all_by_range(Some(Timestamp::from_millis(200)), Some(Timestamp::from_millis(300)))
            .await
            .unwrap();
        assert_eq!(ids(&range), ["c", "b"]);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.violation_count, 2);
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.unique_domain_count, 2);

        assert_eq!(store.delete_before(Timestamp::from_millis(300)).await.unwrap(), 2);
        assert!(store.get("b").await.is_none());
        assert_eq!(store.len().await, 2);

        store.clear_all().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snap").join("records.bin");

        let store = IndexedStore::open(&path).await.unwrap();
        assert!(store.is_empty().await);
        store
            .insert_reports(vec![violation("a", 100, "x.test"), event("b", 200, "y.test")])
            .await
            .unwrap();
        store.close().await.unwrap();
        assert!(path.exists());

        let reopened = IndexedStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        assert_eq!(reopened.get("a").await, store.get("a").await);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.bin");
        tokio::fs::write(&path, b"not a snapshot").await.unwrap();

        assert!(IndexedStore::open(&path).await.is_err());
    }
}
