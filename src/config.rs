//! Worker configuration.
//!
//! Everything a worker process needs that is not a per-run parameter:
//! the scratch root, the metrics listen address, and the S3 client overrides
//! used for MinIO-compatible object stores. All of it comes from the
//! environment so the same binary runs unchanged in containers and on dev
//! machines.
//!
//! # Environment Variables
//!
//! - `ZN_SCRATCH_DIR`: scratch root directory (default `/tmp/zone-names`)
//! - `METRICS_ADDR`: metrics listen address (default `0.0.0.0:9090`)
//! - `AWS_REGION`: S3 region (default `us-east-1`)
//! - `AWS_ENDPOINT_URL_S3`: S3 endpoint override (MinIO)
//! - `AWS_S3_FORCE_PATH_STYLE`: `true` to use path-style addressing
//! - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`: static credentials

use std::path::PathBuf;

use crate::error::{Error, Result};

/// S3 client overrides, mainly for MinIO compatibility.
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    /// Region passed to the S3 client.
    pub region: String,
    /// Endpoint override; when set, plain HTTP is allowed.
    pub endpoint: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`).
    pub force_path_style: bool,
    /// Static access key; absent means the provider chain decides.
    pub access_key_id: Option<String>,
    /// Static secret key.
    pub secret_access_key: Option<String>,
}

impl S3Options {
    /// Read S3 overrides from the environment.
    pub fn from_env() -> Self {
        Self {
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: std::env::var("AWS_ENDPOINT_URL_S3").ok().filter(|s| !s.is_empty()),
            force_path_style: std::env::var("AWS_S3_FORCE_PATH_STYLE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok().filter(|s| !s.is_empty()),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Worker-level configuration shared by all activities of a run.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory for per-run scratch subdirectories.
    pub scratch_root: PathBuf,
    /// Listen address for the metrics endpoint.
    pub metrics_addr: String,
    /// S3 client overrides.
    pub s3: S3Options,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scratch_root: PathBuf::from("/tmp/zone-names"),
            metrics_addr: "0.0.0.0:9090".to_string(),
            s3: S3Options::default(),
        }
    }
}

impl WorkerConfig {
    /// Build a configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let scratch_root = std::env::var("ZN_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.scratch_root);
        if scratch_root.as_os_str().is_empty() {
            return Err(Error::InvalidParams("ZN_SCRATCH_DIR must not be empty".into()));
        }

        let metrics_addr =
            std::env::var("METRICS_ADDR").unwrap_or(defaults.metrics_addr);

        Ok(Self {
            scratch_root,
            metrics_addr,
            s3: S3Options::from_env(),
        })
    }

    /// Convenience constructor for tests and embedders.
    pub fn with_scratch_root(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            ..Self::default()
        }
    }
}
