//! K-way merge of sorted shards.
//!
//! Classical binary-heap merge. Each shard is already sorted and
//! deduplicated, so equal values from different shards surface back to back
//! at the heap top and the last-emitted comparison collapses them; the
//! output is strictly increasing by byte comparison.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use chrono::{SecondsFormat, Utc};
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use super::Activities;
use crate::activity::ActivityContext;
use crate::constants::MERGE_HEARTBEAT_EVERY;
use crate::error::Result;
use crate::metrics;
use crate::object_io::{self, Reader};
use crate::types::{Manifest, MergeParams, MergeStats};

/// Heap entry: ordered by value first, shard index second. The tie-break
/// keeps ordering total; it cannot affect output because equal values
/// collapse regardless of which shard wins the pop.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    value: String,
    shard: usize,
}

impl Activities {
    /// Merge sorted shard files into the final output and write the run
    /// manifest.
    pub async fn merge_sorted(
        &self,
        ctx: &ActivityContext,
        params: &MergeParams,
    ) -> Result<MergeStats> {
        let mut readers = Vec::with_capacity(params.sorted_shard_uris.len());
        for uri in &params.sorted_shard_uris {
            let (reader, _) = object_io::open_reader(uri, self.s3()).await?;
            readers.push(reader);
        }

        let mut heap = BinaryHeap::with_capacity(readers.len());
        for (shard, reader) in readers.iter_mut().enumerate() {
            if let Some(value) = next_line(reader).await? {
                heap.push(Reverse(HeapEntry { value, shard }));
            }
        }

        let mut writer = object_io::create_writer(&params.output_uri, self.s3()).await?;
        let mut last: Option<String> = None;
        let mut emitted: u64 = 0;

        while let Some(Reverse(entry)) = heap.pop() {
            if last.as_deref() != Some(entry.value.as_str()) {
                writer.write_all(entry.value.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                emitted += 1;
                if emitted % MERGE_HEARTBEAT_EVERY == 0 {
                    ctx.heartbeat(emitted)?;
                }
                last = Some(entry.value);
            }
            if let Some(value) = next_line(&mut readers[entry.shard]).await? {
                heap.push(Reverse(HeapEntry {
                    value,
                    shard: entry.shard,
                }));
            }
        }
        writer.finish().await?;

        metrics::MERGED_EMITTED.inc_by(emitted);

        // The manifest is provenance, not output: failing to write it is
        // logged but does not fail a run whose output already landed.
        if let Err(e) = self.write_manifest(params, emitted).await {
            warn!(manifest = %params.manifest_uri, error = %e, "Failed to write manifest");
        }

        info!(
            output = %params.output_uri,
            emitted,
            shards = params.sorted_shard_uris.len(),
            "Merge complete"
        );
        Ok(MergeStats { emitted })
    }

    async fn write_manifest(&self, params: &MergeParams, emitted: u64) -> Result<()> {
        let manifest = Manifest {
            output: params.output_uri.clone(),
            manifest: params.manifest_uri.clone(),
            params: params.params.clone(),
            total_seen: params.total_seen,
            shard_stats: params.shard_stats.clone(),
            unique: emitted,
            started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let body = serde_json::to_vec_pretty(&manifest)?;
        let mut writer = object_io::create_writer(&params.manifest_uri, self.s3()).await?;
        writer.write_all(&body).await?;
        writer.finish().await?;
        Ok(())
    }
}

/// Read the next line, stripping the terminator. A final unterminated line
/// still counts.
async fn next_line(reader: &mut Reader) -> Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}
