//! Store configuration
//!
//! - **root_dir**: directory the filesystem adapter writes segments to
//! - **buffer_size**: pending records per segment key that trigger an
//!   immediate flush (default: 50)
//! - **flush_interval_ms**: delay of the shared flush timer (default: 5s)
//! - **compression_level**: ZSTD level for segment payloads (default: 3)
//!
//! ```ignore
//! let config = StoreConfig::default()
//!     .with_root_dir("/var/lib/telemetry")
//!     .with_buffer_size(200);
//! config.validate()?;
//! ```

use crate::error::{Error, Result};
use crate::storage::codec::DEFAULT_COMPRESSION_LEVEL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for segment files
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Pending records per key before a flush is forced
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Shared flush timer delay in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// ZSTD compression level (1-22)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            buffer_size: default_buffer_size(),
            flush_interval_ms: default_flush_interval_ms(),
            compression_level: default_compression_level(),
        }
    }
}

impl StoreConfig {
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Reject settings the flush controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Configuration(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(Error::Configuration(
                "flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(Error::Configuration(format!(
                "compression_level must be within 1..=22, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./telemetry_data")
}

fn default_buffer_size() -> usize {
    50
}

fn default_flush_interval_ms() -> u64 {
    5_000
}

fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}
