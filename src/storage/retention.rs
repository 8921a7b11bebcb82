//! Retention: bulk deletion of old segments.
//!
//! Deletion works on whole daily buckets. A cutoff never removes part of a
//! day: every segment dated strictly before the cutoff goes, the cutoff day
//! itself and everything after stays.

use crate::core::record::RecordKind;
use crate::core::temporal::format_date;
use crate::error::Result;
use crate::storage::adapter::StorageAdapter;
use crate::storage::ingest::IngestBuffer;
use chrono::NaiveDate;
use tracing::info;

/// Delete segments of `segment_type` dated before `before` using only the
/// adapter's listing and delete primitives.
pub async fn delete_segments_before<A>(
    adapter: &A,
    segment_type: &str,
    before: NaiveDate,
) -> Result<usize>
where
    A: StorageAdapter + ?Sized,
{
    let mut deleted = 0;
    for segment in adapter.list_by_type(segment_type).await? {
        if segment.meta.date < before {
            adapter.delete(&segment.key()).await?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Retention operations over a segment store
pub struct RetentionManager {
    ingest: IngestBuffer,
}

impl RetentionManager {
    pub fn new(ingest: IngestBuffer) -> Self {
        Self { ingest }
    }

    /// Delete every segment of `segment_type` dated strictly before `cutoff`
    pub async fn delete_before_date(&self, segment_type: &str, cutoff: NaiveDate) -> Result<usize> {
        let deleted = self
            .ingest
            .adapter()
            .delete_before_date(segment_type, cutoff)
            .await?;
        info!(
            segment_type,
            cutoff = %format_date(cutoff),
            deleted,
            "retention pass complete"
        );
        Ok(deleted)
    }

    /// Apply the cutoff to every record type's segments
    pub async fn delete_all_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut deleted = 0;
        for kind in RecordKind::ALL {
            deleted += self.delete_before_date(kind.segment_type(), cutoff).await?;
        }
        Ok(deleted)
    }

    /// Wipe the backend and discard anything still buffered.
    ///
    /// Only safe alongside in-flight flushes if the adapter tolerates a
    /// delete racing a save; otherwise close the store first.
    pub async fn clear_all(&self) -> Result<()> {
        self.ingest.discard_pending();
        self.ingest.adapter().clear().await?;
        info!("all segments cleared");
        Ok(())
    }
}
