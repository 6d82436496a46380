//! Pipeline worker binary.
//!
//! Drives one run end to end: reads worker configuration from the
//! environment, run parameters from the command line, serves metrics in the
//! background, and cancels the workflow on Ctrl-C.
//!
//! ```text
//! ZN_SCRATCH_DIR=/var/tmp/zone-names \
//! zone-names-worker \
//!     --input file:///data/com.zone.gz \
//!     --output s3://results/com/names.txt \
//!     --shards 64 --filter A --filter AAAA --idn-mode alabel
//! ```

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use zone_names::telemetry::{init_logging, LogFormat};
use zone_names::{metrics, IdnMode, WorkerConfig, Workflow, WorkflowParams};

/// Deduplicate and sort the owner names of a DNS zone file.
#[derive(Debug, Parser)]
#[command(name = "zone-names-worker", version, about)]
struct Args {
    /// Zone source URI (file:// or s3://, .gz accepted).
    #[arg(long)]
    input: String,

    /// Destination URI for the sorted name stream.
    #[arg(long)]
    output: String,

    /// Shard count.
    #[arg(long, default_value_t = zone_names::constants::DEFAULT_SHARDS)]
    shards: u32,

    /// Record-type mnemonic to keep; repeatable. Empty keeps all types.
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// IDN mapping: alabel, ulabel, or none.
    #[arg(long, default_value = "none")]
    idn_mode: IdnMode,

    /// Scratch subdirectory for this run; defaults to a timestamped name.
    #[arg(long)]
    scratch_subdir: Option<String>,

    /// Keep the scratch subdirectory after the run.
    #[arg(long)]
    keep_scratch: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(LogFormat::from_env()) {
        eprintln!("failed to initialize logging: {e}");
    }

    let cfg = match WorkerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid worker configuration");
            std::process::exit(2);
        }
    };

    metrics::init();
    let metrics_addr = cfg.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(&metrics_addr).await {
            warn!(error = %e, "Metrics server stopped");
        }
    });

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }

    let params = WorkflowParams {
        input: args.input,
        output: args.output,
        shards: args.shards,
        filters: args.filters,
        idn_mode: args.idn_mode,
        scratch_subdir: args
            .scratch_subdir
            .unwrap_or_else(|| format!("run-{}", chrono::Utc::now().timestamp())),
        keep_scratch: args.keep_scratch,
    };

    info!(
        input = %params.input,
        output = %params.output,
        shards = params.shards,
        scratch_subdir = %params.scratch_subdir,
        "Worker starting"
    );

    match Workflow::new(cfg, cancel).run(params).await {
        Ok(stats) => {
            info!(emitted = stats.emitted, "Run succeeded");
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            std::process::exit(1);
        }
    }
}
