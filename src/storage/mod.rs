//! Segment storage: payload codec, adapters, ingest buffering and retention

pub mod adapter;
pub mod codec;
pub mod fs_adapter;
pub mod ingest;
pub mod report_store;
pub mod retention;
pub mod segment;
pub mod segment_store;

pub use adapter::{MemoryAdapter, StorageAdapter};
pub use fs_adapter::FileSystemAdapter;
pub use ingest::IngestBuffer;
pub use report_store::ReportStore;
pub use retention::RetentionManager;
pub use segment::{Segment, SegmentKey, SegmentMeta};
pub use segment_store::SegmentStore;
