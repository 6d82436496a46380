//! Per-shard dedupe.
//!
//! A shard may exceed RAM, so membership lives in an embedded LSM store on
//! scratch disk rather than a hash set. The store's ordered range scan then
//! yields the shard's distinct names in ascending byte order for free, which
//! is exactly the order the merger needs.
//!
//! The store directory is recreated empty on every attempt: `unique` is a
//! pure function of the shard contents, so starting over after a failure is
//! always safe.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use object_store::local::LocalFileSystem;
use slatedb::config::{PutOptions, WriteOptions};
use slatedb::Db;
use tokio::io::AsyncBufReadExt;
use tracing::info;

use super::Activities;
use crate::activity::{ActivityContext, Cadence};
use crate::constants::{
    DEDUPE_EMIT_HEARTBEAT_EVERY, DEDUPE_HEARTBEAT_WALL, DEDUPE_INGEST_HEARTBEAT_EVERY,
};
use crate::error::Result;
use crate::metrics;
use crate::object_io::{self, Location};
use crate::types::{ShardDedupeParams, ShardStats};

/// Dedupe writes do not need per-put durability; the store is scratch state
/// that a retry rebuilds from the shard file.
const FAST_WRITE_OPTIONS: WriteOptions = WriteOptions {
    await_durable: false,
};

impl Activities {
    /// Emit the sorted set of distinct lines from one shard file.
    pub async fn shard_dedupe(
        &self,
        ctx: &ActivityContext,
        params: &ShardDedupeParams,
    ) -> Result<ShardStats> {
        let (mut reader, _) = object_io::open_reader(&params.shard_uri, self.s3()).await?;

        let kv_path = self.kv_store_path(&params.shard_uri)?;
        // Fresh store per attempt; a prior attempt may have died mid-write.
        if kv_path.exists() {
            tokio::fs::remove_dir_all(&kv_path).await?;
        }
        tokio::fs::create_dir_all(&kv_path).await?;
        let store = Arc::new(LocalFileSystem::new_with_prefix(&kv_path)?);
        let db = Db::open("db", store).await?;

        let mut total: u64 = 0;
        let mut cadence = Cadence::new(DEDUPE_INGEST_HEARTBEAT_EVERY, DEDUPE_HEARTBEAT_WALL);
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }
            let name = line.trim_end_matches(['\n', '\r']);
            if name.is_empty() {
                continue;
            }
            if db.get(name.as_bytes()).await?.is_none() {
                db.put_with_options(
                    name.as_bytes(),
                    b"1",
                    &PutOptions::default(),
                    &FAST_WRITE_OPTIONS,
                )
                .await?;
            }
            total += 1;
            if cadence.due(total) {
                ctx.heartbeat(total)?;
            }
        }

        db.flush().await?;

        let mut writer = object_io::create_writer(&params.output_uri, self.s3()).await?;
        let mut unique: u64 = 0;
        let mut cadence = Cadence::new(DEDUPE_EMIT_HEARTBEAT_EVERY, DEDUPE_HEARTBEAT_WALL);
        {
            let start: &[u8] = &[];
            let mut iter = db.scan(start..).await?;
            while let Some(kv) = iter.next().await? {
                writer.write_all(&kv.key).await?;
                writer.write_all(b"\n").await?;
                unique += 1;
                if cadence.due(unique) {
                    ctx.heartbeat(unique)?;
                }
            }
        }
        writer.finish().await?;
        db.close().await?;

        metrics::DEDUPE_INPUT.inc_by(total);
        metrics::DEDUPE_UNIQUE.inc_by(unique);

        info!(
            shard = %params.shard_uri,
            total,
            unique,
            "Shard dedupe complete"
        );
        Ok(ShardStats { total, unique })
    }

    /// Store directory for a shard: `<shard-path>.kv` next to local shards,
    /// or under the scratch root for remote ones.
    fn kv_store_path(&self, shard_uri: &str) -> Result<PathBuf> {
        match object_io::parse_uri(shard_uri)? {
            Location::Local(path) => Ok(PathBuf::from(format!("{}.kv", path.display()))),
            Location::S3 { key, .. } => {
                let base = Path::new(&key)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "shard".to_string());
                Ok(self.cfg.scratch_root.join(format!("{base}.kv")))
            }
        }
    }
}
