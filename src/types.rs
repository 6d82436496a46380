//! Run parameters, activity results, and the manifest document.
//!
//! Everything here is serde-serializable: params and intermediate results go
//! into the run checkpoint, and params plus stats are embedded in the final
//! manifest.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SHARDS;
use crate::error::{Error, Result};
use crate::normalize::IdnMode;

/// Immutable descriptor of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowParams {
    /// Zone source URI (`file://` or `s3://`, `.gz` accepted).
    pub input: String,
    /// Destination URI for the sorted name stream.
    pub output: String,
    /// Shard count; defaults to [`DEFAULT_SHARDS`].
    #[serde(default = "default_shards")]
    pub shards: u32,
    /// Record-type mnemonics to keep; empty accepts all.
    #[serde(default)]
    pub filters: Vec<String>,
    /// IDN mapping applied to owner names.
    #[serde(default)]
    pub idn_mode: IdnMode,
    /// Run-owned subdirectory under the worker's scratch root.
    pub scratch_subdir: String,
    /// Keep the scratch subdirectory after the run.
    #[serde(default)]
    pub keep_scratch: bool,
}

fn default_shards() -> u32 {
    DEFAULT_SHARDS
}

impl WorkflowParams {
    /// Fail fast on parameters no retry can fix.
    pub fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(Error::InvalidParams("input URI must not be empty".into()));
        }
        if self.output.is_empty() {
            return Err(Error::InvalidParams("output URI must not be empty".into()));
        }
        if self.shards == 0 {
            return Err(Error::InvalidParams("shards must be > 0".into()));
        }
        crate::activities::validate_scratch_subdir(&self.scratch_subdir)
            .map_err(|e| Error::InvalidParams(e.to_string()))?;
        Ok(())
    }
}

/// Output of the partition activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResult {
    /// Shard file URIs in shard-index order.
    pub shard_uris: Vec<String>,
    /// Records seen (post-filter, post-IDN).
    pub records: u64,
    /// Input size in bytes, when known.
    pub size_bytes: u64,
}

/// Input to one shard dedupe activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDedupeParams {
    /// Unsorted shard file.
    pub shard_uri: String,
    /// Destination for the sorted-unique lines.
    pub output_uri: String,
}

/// Per-shard dedupe totals. `unique <= total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    /// Non-empty lines ingested.
    pub total: u64,
    /// Distinct lines emitted.
    pub unique: u64,
}

/// Input to the merge activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeParams {
    /// Sorted shard URIs in shard-index order.
    pub sorted_shard_uris: Vec<String>,
    /// Final output URI.
    pub output_uri: String,
    /// Manifest URI (derived from the output URI).
    pub manifest_uri: String,
    /// Original run params, embedded in the manifest.
    pub params: WorkflowParams,
    /// Per-shard stats in shard-index order.
    pub shard_stats: Vec<ShardStats>,
    /// Record count reported by partitioning.
    pub total_seen: u64,
}

/// Output of the merge activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Unique names written globally.
    pub emitted: u64,
}

/// JSON document written next to the output describing the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Output URI.
    pub output: String,
    /// This manifest's URI.
    pub manifest: String,
    /// Run parameters.
    pub params: WorkflowParams,
    /// Records seen by partitioning.
    pub total_seen: u64,
    /// Per-shard dedupe stats.
    pub shard_stats: Vec<ShardStats>,
    /// Global unique count.
    pub unique: u64,
    /// RFC 3339 UTC timestamp.
    pub started_at: String,
}
