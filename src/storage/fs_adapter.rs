//! Filesystem storage adapter.
//!
//! Each segment is stored as two files under the root directory:
//!
//! ```text
//! {root}/
//!   ├── csp-violations-2024-01-31.meta.json   (SegmentMeta, JSON)
//!   ├── csp-violations-2024-01-31.seg         (payload, see `codec`)
//!   └── ...
//! ```
//!
//! Both files are written to a temporary name, synced and renamed into
//! place, data first and metadata last, so a segment only becomes visible
//! once both artifacts are complete and on disk.

use crate::error::{Error, Result};
use crate::storage::adapter::StorageAdapter;
use crate::storage::segment::{Segment, SegmentKey, SegmentMeta};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const META_SUFFIX: &str = ".meta.json";
const DATA_SUFFIX: &str = ".seg";
const TMP_SUFFIX: &str = ".tmp";

/// Segment storage rooted at a directory
pub struct FileSystemAdapter {
    root: PathBuf,
}

impl FileSystemAdapter {
    /// Create an adapter rooted at `root`. Call [`StorageAdapter::init`]
    /// before the first write.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn meta_path(&self, key: &SegmentKey) -> PathBuf {
        self.root.join(format!("{key}{META_SUFFIX}"))
    }

    fn data_path(&self, key: &SegmentKey) -> PathBuf {
        self.root.join(format!("{key}{DATA_SUFFIX}"))
    }

    /// Keys of every segment of `segment_type` that has a metadata artifact
    async fn list_keys(&self, segment_type: &str) -> Vec<SegmentKey> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "segment root not readable, listing as empty");
                return Vec::new();
            }
        };

        let mut keys = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "segment listing interrupted");
                    break;
                }
            };

            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(META_SUFFIX)) else {
                continue;
            };
            match SegmentKey::parse(stem) {
                Ok(key) if key.segment_type == segment_type => keys.push(key),
                Ok(_) => {}
                Err(_) => debug!(file = stem, "skipping file with unrecognised segment key"),
            }
        }

        keys.sort();
        keys
    }

    async fn load_listed(&self, keys: Vec<SegmentKey>) -> Result<Vec<Segment>> {
        let mut segments = Vec::with_capacity(keys.len());
        for key in keys {
            // A segment deleted between listing and loading is skipped.
            if let Some(segment) = self.load(&key).await? {
                segments.push(segment);
            }
        }
        Ok(segments)
    }
}

/// Replace `path` with `contents`. The data is synced before the rename
/// and the parent directory after it, so a crash leaves either the old file
/// or the complete new one.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await?;
    if let Some(parent) = path.parent() {
        sync_dir(parent).await?;
    }
    Ok(())
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

// Directories cannot be opened for syncing here.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

async fn remove_optional(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[async_trait]
impl StorageAdapter for FileSystemAdapter {
    async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn save(&self, segment: &Segment) -> Result<()> {
        let key = segment.key();
        let meta = serde_json::to_vec_pretty(&segment.meta)?;

        write_atomic(&self.data_path(&key), &segment.payload).await?;
        write_atomic(&self.meta_path(&key), &meta).await?;
        Ok(())
    }

    async fn load(&self, key: &SegmentKey) -> Result<Option<Segment>> {
        let Some(meta_bytes) = read_optional(&self.meta_path(key)).await? else {
            return Ok(None);
        };
        let Some(payload) = read_optional(&self.data_path(key)).await? else {
            return Ok(None);
        };

        let meta: SegmentMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|e| Error::corrupt(key.to_string(), e))?;
        if meta.key() != *key {
            return Err(Error::corrupt(
                key.to_string(),
                format!("metadata describes {}", meta.key()),
            ));
        }

        Ok(Some(Segment {
            meta,
            payload: Bytes::from(payload),
        }))
    }

    async fn list_by_type(&self, segment_type: &str) -> Result<Vec<Segment>> {
        let keys = self.list_keys(segment_type).await;
        self.load_listed(keys).await
    }

    async fn list_by_date_range(
        &self,
        segment_type: &str,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<Vec<Segment>> {
        // Filter on the key before touching any payload.
        let keys = self
            .list_keys(segment_type)
            .await
            .into_iter()
            .filter(|k| k.date >= start && k.date <= end)
            .collect();
        self.load_listed(keys).await
    }

    async fn delete(&self, key: &SegmentKey) -> Result<()> {
        // Metadata first: once it is gone the segment no longer lists.
        remove_optional(&self.meta_path(key)).await?;
        remove_optional(&self.data_path(key)).await?;
        Ok(())
    }

    async fn delete_before_date(
        &self,
        segment_type: &str,
        before: chrono::NaiveDate,
    ) -> Result<usize> {
        let mut deleted = 0;
        for key in self.list_keys(segment_type).await {
            if key.date < before {
                self.delete(&key).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}
