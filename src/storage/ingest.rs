//! Ingest buffer and flush controller.
//!
//! Incoming records are appended to an in-memory list per segment key and
//! merged into the persisted segment for that key by a flush. A flush runs
//! either immediately, when a key's pending list reaches `buffer_size`, or
//! from a single timer shared by the whole store.
//!
//! ## Flush of one key
//!
//! ```text
//! lock(key)                     ← serializes flushes of the same key only
//!     ↓
//! detach buffer[key]            ← swap in an empty list; racing inserts land there
//!     ↓
//! load existing segment
//!     ↓
//! save(existing ++ detached)
//!     ↓ ok                          ↓ err
//! drop buffer[key] if empty     buffer[key] = detached ++ buffer[key]
//!                               re-arm timer
//! ```
//!
//! The buffer map itself is never locked across adapter I/O.
//!
//! A key whose flush is running, or whose last flush failed, is not flushed
//! again by the threshold path: further inserts only arm the shared timer,
//! which owns every retry.

use crate::config::StoreConfig;
use crate::core::record::EventRecord;
use crate::error::{Error, Result};
use crate::storage::adapter::StorageAdapter;
use crate::storage::segment::{Segment, SegmentKey};
use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Write buffer with coalesced, retrying flushes to a [`StorageAdapter`].
///
/// Cloning is cheap and every clone shares the same buffer and timer.
/// Methods that spawn background flushes must be called from within a
/// tokio runtime.
#[derive(Clone)]
pub struct IngestBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    adapter: Arc<dyn StorageAdapter>,
    /// Pending, unflushed records per segment key
    buffer: DashMap<SegmentKey, Vec<EventRecord>>,
    /// Per-key flush serialization, pruned once a key is drained
    flush_locks: DashMap<SegmentKey, Arc<tokio::sync::Mutex<()>>>,
    /// Keys with a flush in flight or a failed flush awaiting the timer
    busy: DashSet<SegmentKey>,
    /// The single shared flush timer
    timer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    buffer_size: usize,
    flush_interval: Duration,
    compression_level: i32,
}

impl IngestBuffer {
    pub fn new(adapter: Arc<dyn StorageAdapter>, config: &StoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                adapter,
                buffer: DashMap::new(),
                flush_locks: DashMap::new(),
                busy: DashSet::new(),
                timer: Mutex::new(None),
                closed: AtomicBool::new(false),
                buffer_size: config.buffer_size.max(1),
                flush_interval: config.flush_interval(),
                compression_level: config.compression_level,
            }),
        }
    }

    /// The adapter flushed segments are written to
    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.inner.adapter
    }

    /// Accept records into the buffer without waiting for any write.
    ///
    /// Keys that reach `buffer_size` are flushed in a background task
    /// unless that key is already busy; otherwise the shared timer is armed.
    /// Flush failures are logged and retried, never reported here.
    ///
    /// Fails once the buffer is closed, or when a record's day cannot be
    /// expressed as a segment key; nothing from the batch is buffered then.
    pub fn insert(&self, records: Vec<EventRecord>) -> Result<()> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        if records.is_empty() {
            return Ok(());
        }

        let mut grouped: BTreeMap<SegmentKey, Vec<EventRecord>> = BTreeMap::new();
        for record in records {
            let key = SegmentKey::for_record(&record)?;
            grouped.entry(key).or_default().push(record);
        }

        let mut needs_timer = false;
        for (key, batch) in grouped {
            let full = {
                let mut pending = self.inner.buffer.entry(key.clone()).or_default();
                pending.extend(batch);
                pending.len() >= self.inner.buffer_size
            };

            if full && self.inner.busy.insert(key.clone()) {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    // Failures are requeued and logged inside flush_key.
                    let _ = inner.flush_key(&key).await;
                });
            } else {
                needs_timer = true;
            }
        }

        if needs_timer {
            self.inner.arm_timer();
        }
        Ok(())
    }

    /// Flush one segment key. A key with nothing pending is a no-op.
    pub async fn flush_key(&self, key: &SegmentKey) -> Result<()> {
        self.inner.flush_key(key).await
    }

    /// Flush every key with pending records.
    ///
    /// Keys are flushed independently; the last error is returned after
    /// all of them have been attempted.
    pub async fn flush_all(&self) -> Result<()> {
        self.inner.flush_all().await
    }

    /// Stop accepting records, drain the buffer and release the adapter.
    pub async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.cancel_timer();

        let flushed = self.inner.flush_all().await;
        if let Err(e) = &flushed {
            error!(
                error = %e,
                pending = self.pending_count(),
                "could not drain write buffer on close"
            );
        }

        let released = self.inner.adapter.close().await;
        info!(pending = self.pending_count(), "ingest buffer closed");
        released.and(flushed)
    }

    /// Drop every pending record and stop the timer
    pub fn discard_pending(&self) {
        self.inner.cancel_timer();
        self.inner.buffer.clear();
        self.inner.busy.clear();
    }

    /// Pending record count for one key
    pub fn pending_len(&self, key: &SegmentKey) -> usize {
        self.inner.buffer.get(key).map(|p| p.len()).unwrap_or(0)
    }

    /// Pending record count across all keys
    pub fn pending_count(&self) -> usize {
        self.inner.buffer.iter().map(|p| p.len()).sum()
    }

    /// Keys that currently have a buffer entry
    pub fn pending_keys(&self) -> Vec<SegmentKey> {
        let mut keys: Vec<SegmentKey> = self.inner.buffer.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn timer_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the shared timer unless it is already pending.
    ///
    /// The timer task only sleeps and then spawns the flush, so aborting it
    /// can never interrupt a flush halfway.
    fn arm_timer(self: &Arc<Self>) {
        if self.is_closed() {
            return;
        }

        let mut slot = self.timer_slot();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let inner = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.flush_interval).await;
            inner.timer_slot().take();
            tokio::spawn(async move {
                if let Err(e) = inner.flush_all().await {
                    debug!(error = %e, "timed flush incomplete, will retry");
                }
            });
        }));
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self.timer_slot().take() {
            handle.abort();
        }
    }

    async fn flush_all(self: &Arc<Self>) -> Result<()> {
        let keys: Vec<SegmentKey> = self.buffer.iter().map(|e| e.key().clone()).collect();
        let results = join_all(keys.iter().map(|key| self.flush_key(key))).await;

        results.into_iter().fold(Ok(()), |acc, result| match result {
            Err(e) => Err(e),
            Ok(()) => acc,
        })
    }

    async fn flush_key(self: &Arc<Self>, key: &SegmentKey) -> Result<()> {
        let lock = Arc::clone(self.flush_locks.entry(key.clone()).or_default().value());
        let result = {
            let _guard = lock.lock().await;
            self.flush_locked(key).await
        };
        drop(lock);

        // Only the map's own handle left means nobody is waiting on it.
        self.flush_locks.remove_if(key, |_, lock| {
            Arc::strong_count(lock) == 1 && !self.buffer.contains_key(key)
        });
        result
    }

    /// Body of [`Inner::flush_key`]; the caller holds the key's flush lock
    async fn flush_locked(self: &Arc<Self>, key: &SegmentKey) -> Result<()> {
        let detached = match self.buffer.get_mut(key) {
            Some(mut pending) => std::mem::take(pending.value_mut()),
            None => {
                self.busy.remove(key);
                return Ok(());
            }
        };
        if detached.is_empty() {
            self.buffer.remove_if(key, |_, pending| pending.is_empty());
            self.busy.remove(key);
            return Ok(());
        }
        self.busy.insert(key.clone());

        match self.persist(key, &detached).await {
            Ok(segment) => {
                self.buffer.remove_if(key, |_, pending| pending.is_empty());
                self.busy.remove(key);
                debug!(
                    key = %key,
                    flushed = detached.len(),
                    record_count = segment.meta.record_count,
                    size_bytes = segment.meta.size_bytes,
                    "flushed segment"
                );
                Ok(())
            }
            Err(e) => {
                let requeued = detached.len();
                self.requeue(key, detached);
                warn!(key = %key, requeued, error = %e, "segment flush failed, records requeued");
                self.arm_timer();
                Err(e)
            }
        }
    }

    /// Merge the pending records into the persisted segment for `key`
    async fn persist(&self, key: &SegmentKey, detached: &[EventRecord]) -> Result<Segment> {
        let (mut merged, created_at) = match self.adapter.load(key).await? {
            Some(existing) => (existing.records()?, Some(existing.meta.created_at)),
            None => (Vec::with_capacity(detached.len()), None),
        };
        merged.extend_from_slice(detached);

        let segment = Segment::build(key, &merged, created_at, self.compression_level)?;
        self.adapter.save(&segment).await?;
        Ok(segment)
    }

    /// Put a failed batch back ahead of anything inserted since it was detached
    fn requeue(&self, key: &SegmentKey, mut detached: Vec<EventRecord>) {
        let mut pending = self.buffer.entry(key.clone()).or_default();
        detached.append(pending.value_mut());
        *pending = detached;
    }
}
