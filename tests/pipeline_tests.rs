//! End-to-end pipeline tests.
//!
//! Each test drives a full workflow run against temp-directory fixtures:
//! zone in, sorted names and manifest out, with the real partition → dedupe
//! → merge → cleanup sequence underneath.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use zone_names::{
    manifest_uri_for, Error, IdnMode, Manifest, MergeStats, WorkerConfig, Workflow,
    WorkflowParams,
};

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    root: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn write_zone(&self, name: &str, body: &str) -> String {
        let path = self.root.path().join(name);
        std::fs::write(&path, body).unwrap();
        format!("file://{}", path.display())
    }

    async fn write_zone_gz(&self, name: &str, body: &str) -> String {
        use async_compression::tokio::write::GzipEncoder;
        use tokio::io::AsyncWriteExt;

        let path = self.root.path().join(name);
        let file = tokio::fs::File::create(&path).await.unwrap();
        let mut enc = GzipEncoder::new(file);
        enc.write_all(body.as_bytes()).await.unwrap();
        enc.shutdown().await.unwrap();
        format!("file://{}", path.display())
    }

    fn output_uri(&self) -> String {
        format!("file://{}", self.root.path().join("out/names.txt").display())
    }

    fn output_body(&self) -> String {
        std::fs::read_to_string(self.root.path().join("out/names.txt")).unwrap()
    }

    fn manifest(&self) -> Manifest {
        let body = std::fs::read_to_string(self.root.path().join("out/manifest.json")).unwrap();
        serde_json::from_str(&body).unwrap()
    }

    fn workflow(&self) -> Workflow {
        let cfg = WorkerConfig::with_scratch_root(self.root.path().join("scratch"));
        Workflow::new(cfg, CancellationToken::new())
    }

    fn params(&self, input: String, shards: u32) -> WorkflowParams {
        WorkflowParams {
            input,
            output: self.output_uri(),
            shards,
            filters: vec![],
            idn_mode: IdnMode::None,
            scratch_subdir: "run-under-test".into(),
            keep_scratch: false,
        }
    }

    async fn run(&self, params: WorkflowParams) -> MergeStats {
        self.workflow().run(params).await.unwrap()
    }

    fn scratch_dir(&self) -> std::path::PathBuf {
        self.root.path().join("scratch/run-under-test")
    }
}

fn assert_strictly_ascending(body: &str) {
    let lines: Vec<&str> = body.lines().collect();
    for pair in lines.windows(2) {
        assert!(pair[0] < pair[1], "{:?} !< {:?}", pair[0], pair[1]);
    }
}

const SMALL_ZONE: &str = "b.example. 3600 IN A 192.0.2.1\n\
                          a.example. 3600 IN A 192.0.2.2\n\
                          a.example. 3600 IN A 192.0.2.3\n";

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn small_plaintext_zone() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", SMALL_ZONE);
    let mut params = fx.params(input, 4);
    params.filters = vec!["A".into()];

    let stats = fx.run(params).await;

    assert_eq!(stats.emitted, 2);
    assert_eq!(fx.output_body(), "a.example\nb.example\n");

    let manifest = fx.manifest();
    assert_eq!(manifest.total_seen, 3);
    assert_eq!(manifest.unique, 2);
    assert_eq!(manifest.shard_stats.len(), 4);
    let total: u64 = manifest.shard_stats.iter().map(|s| s.total).sum();
    let unique: u64 = manifest.shard_stats.iter().map(|s| s.unique).sum();
    assert_eq!(total, 3);
    assert_eq!(unique, 2);
    assert!(manifest.shard_stats.iter().all(|s| s.unique <= s.total));
    assert_eq!(manifest.output, fx.output_uri());
}

#[tokio::test]
async fn filter_excluding_everything_yields_empty_output() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", SMALL_ZONE);
    let mut params = fx.params(input, 4);
    params.filters = vec!["MX".into()];

    let stats = fx.run(params).await;

    assert_eq!(stats.emitted, 0);
    assert_eq!(fx.output_body(), "");
    assert_eq!(
        std::fs::metadata(fx.root.path().join("out/names.txt")).unwrap().len(),
        0
    );
}

#[tokio::test]
async fn idn_alabel_converts_owners() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", "Café.Example. 3600 IN A 192.0.2.1\n");
    let mut params = fx.params(input, 4);
    params.idn_mode = IdnMode::ALabel;

    let stats = fx.run(params).await;

    assert_eq!(stats.emitted, 1);
    assert_eq!(fx.output_body(), "xn--caf-dma.example\n");
}

#[tokio::test]
async fn gzip_input_matches_plaintext_result() {
    let fx = Fixture::new();
    let input = fx.write_zone_gz("zone.gz", SMALL_ZONE).await;
    let mut params = fx.params(input, 4);
    params.filters = vec!["A".into()];

    let stats = fx.run(params).await;

    assert_eq!(stats.emitted, 2);
    assert_eq!(fx.output_body(), "a.example\nb.example\n");
}

#[tokio::test]
async fn duplicates_collapse_for_any_shard_count() {
    // The same duplicated owners must collapse whether they land in one
    // shard or are split across many by a different N.
    let zone = "dup.example. IN A 192.0.2.1\n\
                dup.example. IN A 192.0.2.2\n\
                other.example. IN A 192.0.2.3\n";
    for shards in [1, 2, 7, 32] {
        let fx = Fixture::new();
        let input = fx.write_zone("zone.txt", zone);
        let stats = fx.run(fx.params(input, shards)).await;

        assert_eq!(stats.emitted, 2, "shards={shards}");
        assert_eq!(fx.output_body(), "dup.example\nother.example\n");
        assert_strictly_ascending(&fx.output_body());
    }
}

#[tokio::test]
async fn larger_zone_output_is_sorted_and_counted() {
    // A few hundred interleaved owners across shards, each seen twice.
    let mut zone = String::new();
    for i in 0..300 {
        zone.push_str(&format!("host-{:03}.example. IN A 192.0.2.1\n", i % 150));
    }
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", &zone);
    let stats = fx.run(fx.params(input, 8)).await;

    assert_eq!(stats.emitted, 150);
    let body = fx.output_body();
    assert_eq!(body.lines().count() as u64, stats.emitted);
    assert_strictly_ascending(&body);
    assert!(body.ends_with('\n'));

    let manifest = fx.manifest();
    assert_eq!(manifest.total_seen, 300);
    let sum_unique: u64 = manifest.shard_stats.iter().map(|s| s.unique).sum();
    assert_eq!(stats.emitted, sum_unique);
}

#[tokio::test]
async fn rerun_with_same_params_is_byte_identical() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", SMALL_ZONE);
    let params = fx.params(input, 4);

    fx.run(params.clone()).await;
    let first = fx.output_body();
    fx.run(params).await;
    let second = fx.output_body();

    assert_eq!(first, second);
}

#[tokio::test]
async fn scratch_is_removed_unless_kept() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", SMALL_ZONE);
    fx.run(fx.params(input.clone(), 2)).await;
    assert!(!fx.scratch_dir().exists());

    let mut params = fx.params(input, 2);
    params.keep_scratch = true;
    fx.run(params).await;
    assert!(fx.scratch_dir().exists());
    assert!(fx.scratch_dir().join("checkpoint.json").exists());
}

#[tokio::test]
async fn kept_checkpoint_skips_completed_activities() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", SMALL_ZONE);
    let mut params = fx.params(input, 2);
    params.keep_scratch = true;

    fx.run(params.clone()).await;
    let before = fx.output_body();

    // Remove the input: a resumed run must not need it because every
    // activity is already checkpointed as complete.
    std::fs::remove_file(fx.root.path().join("zone.txt")).unwrap();
    let stats = fx.run(params).await;

    assert_eq!(stats.emitted, 2);
    assert_eq!(fx.output_body(), before);
}

#[tokio::test]
async fn missing_input_fails_the_run() {
    let fx = Fixture::new();
    let params = fx.params("file:///definitely/not/here.zone".into(), 2);
    let err = fx.workflow().run(params).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[tokio::test]
async fn unsupported_scheme_fails_fast() {
    let fx = Fixture::new();
    let params = fx.params("ftp://host/zone.txt".into(), 2);
    let err = fx.workflow().run(params).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedScheme(_)));
}

#[tokio::test]
async fn invalid_scratch_subdir_fails_before_any_work() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", SMALL_ZONE);
    let mut params = fx.params(input, 2);
    params.scratch_subdir = "../escape".into();
    let err = fx.workflow().run(params).await.unwrap_err();
    assert!(matches!(err, Error::InvalidParams(_)));
}

#[tokio::test]
async fn cancelled_token_aborts_the_run() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", SMALL_ZONE);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let workflow = Workflow::new(
        WorkerConfig::with_scratch_root(fx.root.path().join("scratch")),
        cancel,
    );
    let err = workflow.run(fx.params(input, 2)).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn large_shard_dedupe_heartbeats_within_a_tight_timeout() {
    use std::time::Duration;
    use zone_names::workflow::supervisor::{execute, ActivityOptions};
    use zone_names::{Activities, ShardDedupeParams};

    let fx = Fixture::new();
    let shard_path = fx.root.path().join("big-shard.txt");
    let mut body = String::with_capacity(1 << 20);
    for i in 0..10_000 {
        body.push_str(&format!("host-{:05}.example\n", i % 2_500));
    }
    std::fs::write(&shard_path, &body).unwrap();
    let out = fx.root.path().join("big-shard.txt.sorted");

    let acts = Activities::new(WorkerConfig::with_scratch_root(fx.root.path()));
    let dedupe_params = ShardDedupeParams {
        shard_uri: format!("file://{}", shard_path.display()),
        output_uri: format!("file://{}", out.display()),
    };
    // Well under the production 5 min timeout: the cadence must keep the
    // watchdog quiet even at this tightness.
    let opts = ActivityOptions {
        name: "dedupe",
        start_to_close: Duration::from_secs(300),
        heartbeat_timeout: Duration::from_secs(30),
    };
    let stats = execute(opts, &CancellationToken::new(), move |ctx| {
        let acts = acts.clone();
        let dp = dedupe_params.clone();
        async move { acts.shard_dedupe(&ctx, &dp).await }
    })
    .await
    .unwrap();

    assert_eq!(stats.total, 10_000);
    assert_eq!(stats.unique, 2_500);
    let body = std::fs::read_to_string(&out).unwrap();
    assert_eq!(body.lines().count(), 2_500);
    assert_strictly_ascending(&body);
}

#[tokio::test]
async fn manifest_uri_derivation_matches_output_layout() {
    let fx = Fixture::new();
    let input = fx.write_zone("zone.txt", SMALL_ZONE);
    let output = format!("file://{}", fx.root.path().join("out/owners.txt").display());
    let mut params = fx.params(input, 2);
    params.output = output.clone();

    fx.run(params).await;

    let manifest_path = Path::new(&manifest_uri_for(&output)["file://".len()..]).to_path_buf();
    assert!(manifest_path.ends_with("out/owners.manifest.json"));
    let body = std::fs::read_to_string(manifest_path).unwrap();
    let doc: Manifest = serde_json::from_str(&body).unwrap();
    assert_eq!(doc.output, output);
}
