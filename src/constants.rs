//! Centralized pipeline constants.
//!
//! Heartbeat cadences, timeouts, and buffer sizes live here so the
//! relationship between them stays visible: every cadence must fire well
//! inside the heartbeat timeout of its phase, or the supervisor will declare
//! the activity dead mid-work.

use std::time::Duration;

// =============================================================================
// Sharding
// =============================================================================

/// Default shard count when the caller does not specify one.
pub const DEFAULT_SHARDS: u32 = 32;

// =============================================================================
// Buffering
// =============================================================================

/// Buffered writer size for shard files, sorted shards, and the merged
/// output. Keeps the pipeline bounded by sequential I/O.
pub const WRITE_BUF_SIZE: usize = 1 << 20;

/// Buffered reader size for shard and zone input streams.
pub const READ_BUF_SIZE: usize = 1 << 20;

// =============================================================================
// Heartbeat cadences
// =============================================================================

/// Partitioner heartbeats every this many parsed records.
pub const PARTITION_HEARTBEAT_EVERY: u64 = 10_000;

/// Deduper heartbeats every this many ingested lines.
pub const DEDUPE_INGEST_HEARTBEAT_EVERY: u64 = 5_000;

/// Deduper heartbeats every this many emitted unique lines.
pub const DEDUPE_EMIT_HEARTBEAT_EVERY: u64 = 10_000;

/// Wall-clock safety net between dedupe heartbeats. Guards against long
/// stretches where the count-based cadence does not fire (e.g. a store stall).
pub const DEDUPE_HEARTBEAT_WALL: Duration = Duration::from_secs(10);

/// Merger heartbeats every this many emitted lines.
pub const MERGE_HEARTBEAT_EVERY: u64 = 50_000;

// =============================================================================
// Activity timeouts
// =============================================================================

/// Start-to-close timeout for every activity.
pub const START_TO_CLOSE: Duration = Duration::from_secs(4 * 60 * 60);

/// Heartbeat timeout for the partition activity.
pub const PARTITION_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Heartbeat timeout for dedupe activities. Longer than partition because a
/// single put against a cold LSM can stall on compaction.
pub const DEDUPE_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Heartbeat timeout for the merge activity.
pub const MERGE_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// Retry policy
// =============================================================================

/// First retry delay.
pub const RETRY_INITIAL_INTERVAL: Duration = Duration::from_secs(5);

/// Exponential backoff factor between retries.
pub const RETRY_BACKOFF_FACTOR: f32 = 2.0;

/// Total attempts per activity, including the first.
pub const RETRY_MAX_ATTEMPTS: usize = 3;
