//! Prometheus metrics for the pipeline.
//!
//! Counters are process-wide, registered once into a custom registry under
//! the `zone_names` namespace, and additive across concurrent activities.
//! Activities publish deltas rather than running totals so that several
//! dedupe tasks on one worker can write the same counter safely.
//!
//! Exposition is a minimal HTTP listener (`GET /metrics`, `GET /health`)
//! suitable for Prometheus scraping; see [`serve`].

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Custom Prometheus registry for pipeline metrics.
/// A custom registry prevents name collisions with other libraries.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("zone_names".to_string()), None).unwrap_or_else(|_| Registry::new())
});

/// Declare an IntCounter metric registered to [`REGISTRY`].
macro_rules! define_counter {
    ($name:ident, $metric_name:expr, $help:expr) => {
        #[doc = $help]
        pub static $name: Lazy<IntCounter> =
            Lazy::new(|| register_int_counter_safe(&REGISTRY, $metric_name, $help));
    };
}

define_counter!(
    RECORDS_PARTITIONED,
    "records_partitioned_total",
    "Total DNS records seen during partitioning."
);
define_counter!(
    DEDUPE_INPUT,
    "dedupe_input_total",
    "Total names processed in dedupe."
);
define_counter!(
    DEDUPE_UNIQUE,
    "dedupe_unique_total",
    "Total unique names emitted by dedupe."
);
define_counter!(
    MERGED_EMITTED,
    "merged_emitted_total",
    "Total unique names emitted by merge."
);

/// Register an IntCounter safely, returning an unregistered fallback on error.
fn register_int_counter_safe(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric name/help should be valid");
    match registry.register(Box::new(counter.clone())) {
        Ok(()) => counter,
        Err(e) => {
            warn!(name, error = %e, "Failed to register IntCounter metric, using unregistered fallback");
            counter
        }
    }
}

/// Force initialization of all counters so they appear in scrapes at zero.
pub fn init() {
    Lazy::force(&RECORDS_PARTITIONED);
    Lazy::force(&DEDUPE_INPUT);
    Lazy::force(&DEDUPE_UNIQUE);
    Lazy::force(&MERGED_EMITTED);
}

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Serve `GET /metrics` and `GET /health` on the given address.
///
/// Runs until the listener errors; intended to be spawned as a background
/// task next to the worker loop.
pub async fn serve(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Metrics server listening");

    loop {
        let (mut stream, peer) = listener.accept().await?;
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "Failed to read metrics request");
                    return;
                }
            };
            let request = String::from_utf8_lossy(&buf[..n]);
            let path = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/");

            let (status, body) = match path {
                "/metrics" => ("200 OK", encode_metrics()),
                "/health" => ("200 OK", "ok\n".to_string()),
                _ => ("404 Not Found", "not found\n".to_string()),
            };
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            if let Err(e) = stream.write_all(response.as_bytes()).await {
                debug!(peer = %peer, error = %e, "Failed to write metrics response");
            }
        });
    }
}
