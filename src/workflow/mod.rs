//! Durable pipeline orchestration.
//!
//! One [`Workflow`] value drives a run through its states:
//!
//! ```text
//! START → PARTITIONING → DEDUPING(fan-out) → MERGING → CLEANUP → DONE
//!                              ↘ (any failure) ↘ CLEANUP → FAILED
//! ```
//!
//! Durability comes from the [`checkpoint`] store: progress is persisted
//! after every activity boundary, and a restarted run re-issues only the
//! activities that have not completed. Supervision (timeouts, heartbeat
//! watchdog, retries) is in [`supervisor`]; the per-phase settings live
//! here.
//!
//! The dedupe fan-out is unbounded at this level (one task per shard);
//! actual parallelism is whatever the tokio scheduler grants the worker.

pub mod checkpoint;
pub mod supervisor;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::activities::Activities;
use crate::config::WorkerConfig;
use crate::constants::{
    DEDUPE_HEARTBEAT_TIMEOUT, MERGE_HEARTBEAT_TIMEOUT, PARTITION_HEARTBEAT_TIMEOUT,
    START_TO_CLOSE,
};
use crate::error::{Error, Result};
use crate::types::{MergeParams, MergeStats, PartitionResult, ShardDedupeParams, ShardStats, WorkflowParams};
use checkpoint::CheckpointStore;
use supervisor::{execute, ActivityOptions};

const PARTITION_OPTS: ActivityOptions = ActivityOptions {
    name: "partition",
    start_to_close: START_TO_CLOSE,
    heartbeat_timeout: PARTITION_HEARTBEAT_TIMEOUT,
};

const DEDUPE_OPTS: ActivityOptions = ActivityOptions {
    name: "dedupe",
    start_to_close: START_TO_CLOSE,
    heartbeat_timeout: DEDUPE_HEARTBEAT_TIMEOUT,
};

const MERGE_OPTS: ActivityOptions = ActivityOptions {
    name: "merge",
    start_to_close: START_TO_CLOSE,
    heartbeat_timeout: MERGE_HEARTBEAT_TIMEOUT,
};

/// Workflow states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Start,
    Partitioning,
    Deduping,
    Merging,
    Cleanup,
    Done,
    Failed,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowState::Start => "START",
            WorkflowState::Partitioning => "PARTITIONING",
            WorkflowState::Deduping => "DEDUPING",
            WorkflowState::Merging => "MERGING",
            WorkflowState::Cleanup => "CLEANUP",
            WorkflowState::Done => "DONE",
            WorkflowState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Derive the manifest URI from the output URI.
///
/// An output named exactly `names.txt` gets a sibling `manifest.json`;
/// anything else gets `<output-without-.txt>.manifest.json` at the same
/// prefix.
pub fn manifest_uri_for(output: &str) -> String {
    if output.to_lowercase().ends_with("names.txt") {
        return format!("{}manifest.json", &output[..output.len() - "names.txt".len()]);
    }
    match output.rsplit_once('/') {
        Some((dir, file)) => {
            let stem = file.strip_suffix(".txt").unwrap_or(file);
            format!("{dir}/{stem}.manifest.json")
        }
        None => {
            let stem = output.strip_suffix(".txt").unwrap_or(output);
            format!("{stem}.manifest.json")
        }
    }
}

/// Orchestrates one pipeline run on a worker.
#[derive(Clone)]
pub struct Workflow {
    activities: Arc<Activities>,
    cancel: CancellationToken,
}

impl Workflow {
    /// Build a workflow bound to a worker configuration and a cancellation
    /// token (typically wired to the process shutdown signal).
    pub fn new(cfg: WorkerConfig, cancel: CancellationToken) -> Self {
        Self {
            activities: Arc::new(Activities::new(cfg)),
            cancel,
        }
    }

    /// Run the pipeline to completion.
    ///
    /// Cleanup runs on both the success and failure paths; the original
    /// activity error is what surfaces from a failed run.
    pub async fn run(&self, params: WorkflowParams) -> Result<MergeStats> {
        params.validate()?;
        info!(input = %params.input, output = %params.output, state = %WorkflowState::Start, "Run starting");

        let run_token = self.cancel.child_token();
        let checkpoint = Arc::new(CheckpointStore::open(
            &self.activities.scratch_dir(&params.scratch_subdir),
            &params,
        )?);

        let result = self.run_inner(&params, &run_token, &checkpoint).await;

        // Stop any stragglers before touching their scratch files.
        run_token.cancel();

        info!(state = %WorkflowState::Cleanup, keep_scratch = params.keep_scratch, "Cleaning up");
        let cleanup = if params.keep_scratch {
            Ok(())
        } else {
            self.activities.cleanup_scratch(&params.scratch_subdir).await
        };

        match (result, cleanup) {
            (Ok(stats), Ok(())) => {
                info!(emitted = stats.emitted, state = %WorkflowState::Done, "Run complete");
                Ok(stats)
            }
            (Ok(_), Err(e)) => {
                error!(error = %e, state = %WorkflowState::Failed, "Cleanup failed");
                Err(e)
            }
            (Err(e), cleanup) => {
                if let Err(ce) = cleanup {
                    error!(error = %ce, "Cleanup failed after run error");
                }
                error!(error = %e, state = %WorkflowState::Failed, "Run failed");
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        params: &WorkflowParams,
        cancel: &CancellationToken,
        checkpoint: &Arc<CheckpointStore>,
    ) -> Result<MergeStats> {
        // PARTITIONING
        let partition = match checkpoint.partition() {
            Some(p) => {
                info!(records = p.records, "Partition already complete, skipping");
                p
            }
            None => {
                info!(state = %WorkflowState::Partitioning, "Partitioning input");
                let acts = Arc::clone(&self.activities);
                let p = params.clone();
                let result = execute(PARTITION_OPTS, cancel, move |ctx| {
                    let acts = Arc::clone(&acts);
                    let p = p.clone();
                    async move { acts.stream_partition(&ctx, &p).await }
                })
                .await?;
                checkpoint.record_partition(&result)?;
                result
            }
        };

        // DEDUPING: one supervised activity per shard, stats in shard order.
        info!(state = %WorkflowState::Deduping, shards = partition.shard_uris.len(), "Deduping shards");
        let stats = self.fan_out_dedupe(&partition, cancel, checkpoint).await?;

        // MERGING
        let merge_stats = match checkpoint.merge() {
            Some(m) => {
                info!(emitted = m.emitted, "Merge already complete, skipping");
                m
            }
            None => {
                info!(state = %WorkflowState::Merging, "Merging sorted shards");
                let merge_params = MergeParams {
                    sorted_shard_uris: partition
                        .shard_uris
                        .iter()
                        .map(|u| format!("{u}.sorted"))
                        .collect(),
                    output_uri: params.output.clone(),
                    manifest_uri: manifest_uri_for(&params.output),
                    params: params.clone(),
                    shard_stats: stats,
                    total_seen: partition.records,
                };
                let acts = Arc::clone(&self.activities);
                let result = execute(MERGE_OPTS, cancel, move |ctx| {
                    let acts = Arc::clone(&acts);
                    let mp = merge_params.clone();
                    async move { acts.merge_sorted(&ctx, &mp).await }
                })
                .await?;
                checkpoint.record_merge(result)?;
                result
            }
        };

        Ok(merge_stats)
    }

    async fn fan_out_dedupe(
        &self,
        partition: &PartitionResult,
        cancel: &CancellationToken,
        checkpoint: &Arc<CheckpointStore>,
    ) -> Result<Vec<ShardStats>> {
        let mut stats: Vec<Option<ShardStats>> = vec![None; partition.shard_uris.len()];
        let mut tasks = Vec::new();

        for (i, shard_uri) in partition.shard_uris.iter().enumerate() {
            if let Some(s) = checkpoint.shard(i) {
                stats[i] = Some(s);
                continue;
            }
            let dedupe_params = ShardDedupeParams {
                shard_uri: shard_uri.clone(),
                output_uri: format!("{shard_uri}.sorted"),
            };
            let acts = Arc::clone(&self.activities);
            let cancel = cancel.clone();
            let checkpoint = Arc::clone(checkpoint);
            tasks.push((
                i,
                tokio::spawn(async move {
                    let shard_stats = execute(DEDUPE_OPTS, &cancel, move |ctx| {
                        let acts = Arc::clone(&acts);
                        let dp = dedupe_params.clone();
                        async move { acts.shard_dedupe(&ctx, &dp).await }
                    })
                    .await?;
                    checkpoint.record_shard(i, shard_stats)?;
                    Ok::<ShardStats, Error>(shard_stats)
                }),
            ));
        }

        let mut first_error = None;
        for (i, task) in tasks {
            match task.await {
                Ok(Ok(s)) => stats[i] = Some(s),
                Ok(Err(e)) => {
                    // Let the remaining shards observe cancellation instead
                    // of grinding on for a doomed run.
                    cancel.cancel();
                    first_error.get_or_insert(e);
                }
                Err(join) => {
                    cancel.cancel();
                    first_error.get_or_insert(Error::Io(std::io::Error::other(join)));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        // Every slot is filled: either resumed from the checkpoint or
        // completed above.
        Ok(stats.into_iter().flatten().collect())
    }
}
