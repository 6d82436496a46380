//! Durable run state.
//!
//! The workflow persists its progress to `checkpoint.json` inside the run's
//! scratch subdirectory after every activity boundary: partition complete,
//! each shard dedupe complete, merge complete. A worker that crashes and
//! restarts the same run reloads the checkpoint and re-issues only the
//! activities that have not completed.
//!
//! Writes are atomic (temp file + rename) so a crash mid-write leaves the
//! previous checkpoint intact. A checkpoint recorded for different params is
//! discarded: intermediate files on disk would not match the request.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{MergeStats, PartitionResult, ShardStats, WorkflowParams};

const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Persisted progress of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Params the checkpoint belongs to.
    pub params: Option<WorkflowParams>,
    /// Set once partitioning completed.
    pub partition: Option<PartitionResult>,
    /// One slot per shard, set as dedupes complete.
    pub shards: Vec<Option<ShardStats>>,
    /// Set once the merge completed.
    pub merge: Option<MergeStats>,
}

/// Checkpoint file bound to one run's scratch subdirectory.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: Mutex<RunCheckpoint>,
}

impl CheckpointStore {
    /// Load or initialize the checkpoint for a run.
    ///
    /// An existing checkpoint is honored only when its params equal the
    /// requested params; otherwise it is discarded and the run starts over.
    pub fn open(scratch_dir: &Path, params: &WorkflowParams) -> Result<Self> {
        let path = scratch_dir.join(CHECKPOINT_FILE);

        let state = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<RunCheckpoint>(&bytes) {
                Ok(cp) if cp.params.as_ref() == Some(params) => {
                    info!(
                        path = %path.display(),
                        partition_done = cp.partition.is_some(),
                        shards_done = cp.shards.iter().filter(|s| s.is_some()).count(),
                        merge_done = cp.merge.is_some(),
                        "Resuming from checkpoint"
                    );
                    cp
                }
                Ok(_) => {
                    warn!(path = %path.display(), "Checkpoint params differ from request, starting fresh");
                    RunCheckpoint::default()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable checkpoint, starting fresh");
                    RunCheckpoint::default()
                }
            },
            Err(_) => RunCheckpoint::default(),
        };

        let mut state = state;
        if state.params.is_none() {
            state.params = Some(params.clone());
        }

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Completed partition result, if any.
    pub fn partition(&self) -> Option<PartitionResult> {
        self.lock().partition.clone()
    }

    /// Completed stats for shard `i`, if any.
    pub fn shard(&self, i: usize) -> Option<ShardStats> {
        self.lock().shards.get(i).copied().flatten()
    }

    /// Completed merge stats, if any.
    pub fn merge(&self) -> Option<MergeStats> {
        self.lock().merge
    }

    /// Record partition completion.
    pub fn record_partition(&self, result: &PartitionResult) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            state.partition = Some(result.clone());
            state.shards.resize(result.shard_uris.len(), None);
            state.clone()
        };
        self.persist(&snapshot)
    }

    /// Record completion of shard `i`.
    pub fn record_shard(&self, i: usize, stats: ShardStats) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            if state.shards.len() <= i {
                state.shards.resize(i + 1, None);
            }
            state.shards[i] = Some(stats);
            state.clone()
        };
        self.persist(&snapshot)
    }

    /// Record merge completion.
    pub fn record_merge(&self, stats: MergeStats) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            state.merge = Some(stats);
            state.clone()
        };
        self.persist(&snapshot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunCheckpoint> {
        self.state.lock().expect("checkpoint state poisoned")
    }

    /// Write the checkpoint atomically: serialize to a temp file in the same
    /// directory, then rename over the old one.
    fn persist(&self, state: &RunCheckpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
