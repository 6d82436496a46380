//! # zone-names
//!
//! External-memory deduplication pipeline for DNS zone files.
//!
//! The pipeline ingests RFC 1035 master files (optionally gzip-compressed,
//! from `file://` or `s3://` URIs), extracts and normalizes owner names, and
//! produces a deduplicated, lexicographically sorted name list plus a JSON
//! manifest describing the run. Inputs far larger than RAM are handled by
//! hash-partitioning into shard files, deduplicating each shard through an
//! embedded LSM store, and k-way merging the sorted shards.
//!
//! Runs are durable: every activity executes under a supervisor with
//! retries, heartbeat liveness detection, and cancellation, and progress is
//! checkpointed after each activity boundary so a restarted worker resumes
//! instead of starting over.
//!
//! ## Running a pipeline
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use zone_names::{IdnMode, WorkerConfig, Workflow, WorkflowParams};
//!
//! #[tokio::main]
//! async fn main() -> zone_names::Result<()> {
//!     let workflow = Workflow::new(WorkerConfig::from_env()?, CancellationToken::new());
//!     let stats = workflow
//!         .run(WorkflowParams {
//!             input: "file:///data/zone.txt.gz".into(),
//!             output: "s3://results/zone/names.txt".into(),
//!             shards: 32,
//!             filters: vec!["A".into(), "AAAA".into()],
//!             idn_mode: IdnMode::ALabel,
//!             scratch_subdir: "zone-2024-06".into(),
//!             keep_scratch: false,
//!         })
//!         .await?;
//!     println!("unique names: {}", stats.emitted);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod activities;
pub mod activity;
pub mod config;
pub mod constants;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod normalize;
pub mod object_io;
pub mod retry;
pub mod telemetry;
pub mod types;
pub mod workflow;
pub mod zone;

pub use activities::Activities;
pub use activity::ActivityContext;
pub use config::{S3Options, WorkerConfig};
pub use error::{Error, Result};
pub use normalize::IdnMode;
pub use types::{
    Manifest, MergeParams, MergeStats, PartitionResult, ShardDedupeParams, ShardStats,
    WorkflowParams,
};
pub use workflow::{manifest_uri_for, Workflow};
