//! Writer and closer configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::codec::Encoding;

/// Two-level batching writer settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchingConfig {
    /// Directory holding the per-property spool files
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
    /// Pending write requests before `write` waits
    #[serde(default = "default_write_chan_buffer")]
    #[validate(range(min = 1))]
    pub write_chan_buffer: usize,
    /// Sessions per property that force an immediate spool append
    #[serde(default = "default_lvl1_max_sessions")]
    #[validate(range(min = 1))]
    pub lvl1_max_sessions: usize,
    #[serde(default = "default_lvl1_max_age_ms")]
    #[validate(range(min = 1))]
    pub lvl1_max_age_ms: u64,
    #[serde(default = "default_lvl1_sweep_interval_ms")]
    #[validate(range(min = 1))]
    pub lvl1_sweep_interval_ms: u64,
    #[serde(default = "default_lvl2_flush_interval_ms")]
    #[validate(range(min = 1))]
    pub lvl2_flush_interval_ms: u64,
    /// Failed drains of one spool file before it is discarded
    #[serde(default = "default_max_consecutive_child_write_failures")]
    #[validate(range(min = 1))]
    pub max_consecutive_child_write_failures: u32,
    #[serde(default)]
    pub encoding: Encoding,
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("/storage/writer")
}

fn default_write_chan_buffer() -> usize {
    10_000
}

fn default_lvl1_max_sessions() -> usize {
    1000
}

fn default_lvl1_max_age_ms() -> u64 {
    5_000
}

fn default_lvl1_sweep_interval_ms() -> u64 {
    250
}

fn default_lvl2_flush_interval_ms() -> u64 {
    60_000
}

fn default_max_consecutive_child_write_failures() -> u32 {
    20
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            write_chan_buffer: default_write_chan_buffer(),
            lvl1_max_sessions: default_lvl1_max_sessions(),
            lvl1_max_age_ms: default_lvl1_max_age_ms(),
            lvl1_sweep_interval_ms: default_lvl1_sweep_interval_ms(),
            lvl2_flush_interval_ms: default_lvl2_flush_interval_ms(),
            max_consecutive_child_write_failures: default_max_consecutive_child_write_failures(),
            encoding: Encoding::default(),
        }
    }
}

impl BatchingConfig {
    pub fn lvl1_max_age(&self) -> Duration {
        Duration::from_millis(self.lvl1_max_age_ms)
    }

    pub fn lvl1_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.lvl1_sweep_interval_ms)
    }

    pub fn lvl2_flush_interval(&self) -> Duration {
        Duration::from_millis(self.lvl2_flush_interval_ms)
    }
}

/// Direct warehouse writer settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WriterConfig {
    #[serde(default = "default_write_timeout_secs")]
    #[validate(range(min = 1))]
    pub write_timeout_secs: u64,
    /// Tables written in parallel per call
    #[serde(default = "default_write_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub write_concurrency: usize,
    /// Lifetime of cached per-property drivers, layouts, columns and modifiers
    #[serde(default = "default_cache_ttl_secs")]
    #[validate(range(min = 1))]
    pub cache_ttl_secs: u64,
    /// Sessions handed to the layout at a time
    #[serde(default = "default_layout_batch_size")]
    #[validate(range(min = 1))]
    pub layout_batch_size: usize,
}

fn default_write_timeout_secs() -> u64 {
    30
}

fn default_write_concurrency() -> usize {
    10
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_layout_batch_size() -> usize {
    1000
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            write_timeout_secs: default_write_timeout_secs(),
            write_concurrency: default_write_concurrency(),
            cache_ttl_secs: default_cache_ttl_secs(),
            layout_batch_size: default_layout_batch_size(),
        }
    }
}

impl WriterConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Protosession closer settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CloserConfig {
    /// Pause after a failed write before the error is returned
    #[serde(default = "default_failure_sleep_ms")]
    pub failure_sleep_ms: u64,
    /// Properties written in parallel per close call; 1 writes sequentially
    #[serde(default = "default_max_concurrent_properties")]
    #[validate(range(min = 1, max = 64))]
    pub max_concurrent_properties: usize,
}

fn default_failure_sleep_ms() -> u64 {
    1_000
}

fn default_max_concurrent_properties() -> usize {
    1
}

impl Default for CloserConfig {
    fn default() -> Self {
        Self {
            failure_sleep_ms: default_failure_sleep_ms(),
            max_concurrent_properties: default_max_concurrent_properties(),
        }
    }
}

impl CloserConfig {
    pub fn failure_sleep(&self) -> Duration {
        Duration::from_millis(self.failure_sleep_ms)
    }
}
