//! Zone partitioning.
//!
//! Streams the input once, extracts and normalizes owner names, and routes
//! each to one of N shard files by FNV-1a hash. Shard files are plain text,
//! one owner per line, unsorted; ordering within a shard reflects input
//! order and nothing more.

use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::Activities;
use crate::activity::ActivityContext;
use crate::constants::{PARTITION_HEARTBEAT_EVERY, WRITE_BUF_SIZE};
use crate::error::Result;
use crate::hash::shard_index;
use crate::metrics;
use crate::normalize::normalize_owner;
use crate::object_io::{self, file_uri};
use crate::types::{PartitionResult, WorkflowParams};
use crate::zone::{TypeFilter, ZoneParser};

impl Activities {
    /// Partition the input zone into shard files under the run's scratch
    /// subdirectory.
    pub async fn stream_partition(
        &self,
        ctx: &ActivityContext,
        params: &WorkflowParams,
    ) -> Result<PartitionResult> {
        let (mut reader, size) = object_io::open_reader(&params.input, self.s3()).await?;

        let scratch = self.scratch_dir(&params.scratch_subdir);
        fs::create_dir_all(&scratch).await?;

        let shards = params.shards;
        let mut shard_uris = Vec::with_capacity(shards as usize);
        let mut writers = Vec::with_capacity(shards as usize);
        for i in 0..shards {
            let path = scratch.join(format!("shard-{i:02}.txt"));
            shard_uris.push(file_uri(&path));
            let file = fs::File::create(&path).await?;
            writers.push(BufWriter::with_capacity(WRITE_BUF_SIZE, file));
        }

        let filter = TypeFilter::new(&params.filters);
        let mut parser = ZoneParser::new();

        let mut records: u64 = 0;
        let mut last_reported: u64 = 0;
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            let Some(record) = parser.feed_line(trimmed) else {
                continue;
            };
            if !filter.matches(&record.rtype) {
                continue;
            }
            let Some(owner) = normalize_owner(&record.owner, params.idn_mode) else {
                // IDN transform rejected the name; skip the record.
                debug!(owner = %record.owner, "Skipping owner rejected by IDN transform");
                continue;
            };

            let idx = shard_index(&owner, shards) as usize;
            writers[idx].write_all(owner.as_bytes()).await?;
            writers[idx].write_all(b"\n").await?;

            records += 1;
            if records % PARTITION_HEARTBEAT_EVERY == 0 {
                ctx.heartbeat(records)?;
                metrics::RECORDS_PARTITIONED.inc_by(records - last_reported);
                last_reported = records;
            }
        }
        parser.finish()?;

        if records > last_reported {
            metrics::RECORDS_PARTITIONED.inc_by(records - last_reported);
        }
        for writer in &mut writers {
            writer.flush().await?;
            writer.shutdown().await?;
        }

        info!(
            input = %params.input,
            records,
            shards,
            size_bytes = size.unwrap_or(0),
            "Partitioning complete"
        );
        Ok(PartitionResult {
            shard_uris,
            records,
            size_bytes: size.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::normalize::IdnMode;

    async fn run_partition(
        zone: &str,
        filters: Vec<String>,
        idn_mode: IdnMode,
        shards: u32,
    ) -> (tempfile::TempDir, PartitionResult) {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("zone.txt");
        std::fs::write(&input, zone).unwrap();

        let acts = Activities::new(WorkerConfig::with_scratch_root(root.path()));
        let params = WorkflowParams {
            input: file_uri(&input),
            output: "file:///unused".into(),
            shards,
            filters,
            idn_mode,
            scratch_subdir: "run-1".into(),
            keep_scratch: false,
        };
        let result = acts
            .stream_partition(&ActivityContext::detached(), &params)
            .await
            .unwrap();
        (root, result)
    }

    fn shard_lines(result: &PartitionResult) -> Vec<String> {
        let mut all = Vec::new();
        for uri in &result.shard_uris {
            let path = uri.strip_prefix("file://").unwrap();
            let body = std::fs::read_to_string(path).unwrap();
            all.extend(body.lines().map(str::to_string));
        }
        all
    }

    #[tokio::test]
    async fn partitions_and_normalizes_owners() {
        let zone = "b.example. 3600 IN A 192.0.2.1\n\
                    a.example. 3600 IN A 192.0.2.2\n\
                    a.example. 3600 IN A 192.0.2.3\n";
        let (_root, result) = run_partition(zone, vec!["A".into()], IdnMode::None, 4).await;

        assert_eq!(result.records, 3);
        assert_eq!(result.shard_uris.len(), 4);
        assert_eq!(result.size_bytes, zone.len() as u64);

        let mut lines = shard_lines(&result);
        lines.sort();
        assert_eq!(lines, vec!["a.example", "a.example", "b.example"]);
    }

    #[tokio::test]
    async fn filter_excludes_unmatched_types() {
        let zone = "a.example. IN A 192.0.2.1\n\
                    b.example. IN MX 10 mail.example.\n";
        let (_root, result) = run_partition(zone, vec!["MX".into()], IdnMode::None, 2).await;
        assert_eq!(result.records, 1);
        assert_eq!(shard_lines(&result), vec!["b.example"]);
    }

    #[tokio::test]
    async fn unknown_filter_mnemonics_match_nothing() {
        let zone = "a.example. IN A 192.0.2.1\n";
        let (_root, result) = run_partition(zone, vec!["FROB".into()], IdnMode::None, 2).await;
        assert_eq!(result.records, 0);
        assert!(shard_lines(&result).is_empty());
    }

    #[tokio::test]
    async fn alabel_mode_punycodes_owners() {
        let zone = "Café.Example. IN A 192.0.2.1\n";
        let (_root, result) = run_partition(zone, vec![], IdnMode::ALabel, 2).await;
        assert_eq!(result.records, 1);
        assert_eq!(shard_lines(&result), vec!["xn--caf-dma.example"]);
    }

    #[tokio::test]
    async fn routing_is_deterministic_across_runs() {
        let zone = "a.example. IN A 1.2.3.4\nb.example. IN A 1.2.3.4\nc.example. IN A 1.2.3.4\n";
        let (_r1, first) = run_partition(zone, vec![], IdnMode::None, 8).await;
        let (_r2, second) = run_partition(zone, vec![], IdnMode::None, 8).await;

        let per_shard = |r: &PartitionResult| -> Vec<String> {
            r.shard_uris
                .iter()
                .map(|u| std::fs::read_to_string(u.strip_prefix("file://").unwrap()).unwrap())
                .collect()
        };
        assert_eq!(per_shard(&first), per_shard(&second));
    }

    #[tokio::test]
    async fn gzip_input_is_decoded() {
        use async_compression::tokio::write::GzipEncoder;
        use tokio::io::AsyncWriteExt as _;

        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("zone.gz");
        let file = fs::File::create(&input).await.unwrap();
        let mut enc = GzipEncoder::new(file);
        enc.write_all(b"a.example. IN A 192.0.2.1\n").await.unwrap();
        enc.shutdown().await.unwrap();

        let acts = Activities::new(WorkerConfig::with_scratch_root(root.path()));
        let params = WorkflowParams {
            input: file_uri(&input),
            output: "file:///unused".into(),
            shards: 2,
            filters: vec![],
            idn_mode: IdnMode::None,
            scratch_subdir: "run-gz".into(),
            keep_scratch: false,
        };
        let result = acts
            .stream_partition(&ActivityContext::detached(), &params)
            .await
            .unwrap();
        assert_eq!(result.records, 1);
        assert_eq!(shard_lines(&result), vec!["a.example"]);
    }
}
