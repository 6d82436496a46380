//! Crate-level error types.
//!
//! A single [`Error`] enum covers the whole pipeline. The important split is
//! [`Error::is_retryable`]: the orchestrator's retry policy only re-issues an
//! activity when the failure is plausibly transient. Invalid parameters,
//! unsupported URI schemes, cancellation, and cleanup safety violations are
//! defects or deliberate aborts and must surface immediately.
//!
//! Activities never swallow errors in the non-retryable categories; skipping
//! is reserved for malformed zone entries and failed IDN transforms, which
//! are handled inline and never reach this type.

use std::{io, result};

use thiserror::Error as ThisError;

/// Result type used throughout the crate.
pub type Result<T> = result::Result<T, Error>;

/// Pipeline errors.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Filesystem or network I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Object store operation failed (S3 GET/PUT, local store access).
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Embedded KV store failure during shard dedupe.
    #[error("kv store error: {0}")]
    Store(#[from] slatedb::SlateDBError),

    /// JSON encode/decode failure (checkpoint, manifest).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The zone stream became unreadable mid-parse.
    #[error("zone parse error: {0}")]
    Zone(String),

    /// URI names a scheme the object layer does not speak.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// Workflow parameters failed validation.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Cleanup was asked to remove a path outside the run's scratch
    /// subdirectory. Indicates a bug upstream; never retried.
    #[error("cleanup safety violation: {0}")]
    CleanupSafety(String),

    /// An activity stopped heartbeating within its heartbeat timeout.
    #[error("activity '{activity}' missed its heartbeat deadline ({timeout_secs}s)")]
    HeartbeatTimeout {
        /// Name of the timed-out activity.
        activity: &'static str,
        /// Configured heartbeat timeout in seconds.
        timeout_secs: u64,
    },

    /// An activity exceeded its start-to-close timeout.
    #[error("activity '{activity}' exceeded its start-to-close timeout")]
    StartToCloseTimeout {
        /// Name of the timed-out activity.
        activity: &'static str,
    },

    /// The run was cancelled; observed at a heartbeat boundary.
    #[error("workflow cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the retry policy should re-issue the failed activity.
    ///
    /// Transient I/O, store trouble, and watchdog timeouts are retryable.
    /// Everything that signals a defect or a deliberate abort is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Io(_)
            | Error::ObjectStore(_)
            | Error::Store(_)
            | Error::Zone(_)
            | Error::HeartbeatTimeout { .. }
            | Error::StartToCloseTimeout { .. } => true,
            Error::Json(_)
            | Error::UnsupportedScheme(_)
            | Error::InvalidParams(_)
            | Error::CleanupSafety(_)
            | Error::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        let e = Error::Io(io::Error::new(io::ErrorKind::WouldBlock, "eagain"));
        assert!(e.is_retryable());

        let e = Error::HeartbeatTimeout {
            activity: "dedupe",
            timeout_secs: 300,
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn defects_are_not_retryable() {
        assert!(!Error::UnsupportedScheme("gopher".into()).is_retryable());
        assert!(!Error::InvalidParams("shards must be > 0".into()).is_retryable());
        assert!(!Error::CleanupSafety("..".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let e = Error::HeartbeatTimeout {
            activity: "partition",
            timeout_secs: 60,
        };
        let msg = e.to_string();
        assert!(msg.contains("partition"));
        assert!(msg.contains("60"));
    }
}
