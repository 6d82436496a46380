//! Activity supervision: timeouts, heartbeat watchdog, retries.
//!
//! [`execute`] is the single entry point the workflow uses to run an
//! activity. Each attempt gets a fresh [`ActivityContext`]; a watchdog
//! watches the heartbeat channel and kills the attempt when the activity
//! goes quiet for longer than its heartbeat timeout. Failed attempts are
//! retried under the crate retry policy as long as the error is retryable.
//!
//! Dropping the attempt future is what cancels the work: activities are
//! plain futures, not detached tasks, so a watchdog or cancellation arm
//! winning the select tears the activity down immediately.

use std::future::Future;
use std::time::Duration;

use backon::Retryable;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::activity::ActivityContext;
use crate::error::{Error, Result};
use crate::retry::activity_policy;

/// Per-activity supervision settings.
#[derive(Debug, Clone, Copy)]
pub struct ActivityOptions {
    /// Activity name for logs and errors.
    pub name: &'static str,
    /// Hard deadline for one attempt.
    pub start_to_close: Duration,
    /// Maximum silence between heartbeats before the attempt is killed.
    pub heartbeat_timeout: Duration,
}

/// Run an activity under supervision with retries.
///
/// `run` is invoked once per attempt with that attempt's context. The final
/// error of the last attempt is surfaced unchanged.
pub async fn execute<T, F, Fut>(
    opts: ActivityOptions,
    cancel: &CancellationToken,
    run: F,
) -> Result<T>
where
    F: Fn(ActivityContext) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempt = || attempt_once(opts, cancel, &run);
    attempt
        .retry(activity_policy())
        .when(Error::is_retryable)
        .notify(|err: &Error, delay| {
            warn!(
                activity = opts.name,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "Activity attempt failed, retrying"
            );
        })
        .await
}

async fn attempt_once<T, F, Fut>(
    opts: ActivityOptions,
    cancel: &CancellationToken,
    run: &F,
) -> Result<T>
where
    F: Fn(ActivityContext) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let (hb_tx, hb_rx) = watch::channel(0u64);
    let attempt_token = cancel.child_token();
    let ctx = ActivityContext::new(hb_tx, attempt_token.clone());

    let work = run(ctx);
    tokio::pin!(work);

    tokio::select! {
        res = &mut work => res,
        _ = heartbeat_watchdog(hb_rx, opts.heartbeat_timeout) => {
            attempt_token.cancel();
            Err(Error::HeartbeatTimeout {
                activity: opts.name,
                timeout_secs: opts.heartbeat_timeout.as_secs(),
            })
        }
        _ = tokio::time::sleep(opts.start_to_close) => {
            attempt_token.cancel();
            Err(Error::StartToCloseTimeout { activity: opts.name })
        }
        _ = cancel.cancelled() => {
            attempt_token.cancel();
            Err(Error::Cancelled)
        }
    }
}

/// Resolves when the activity misses its heartbeat deadline.
async fn heartbeat_watchdog(mut hb_rx: watch::Receiver<u64>, timeout: Duration) {
    loop {
        match tokio::time::timeout(timeout, hb_rx.changed()).await {
            // Heartbeat arrived; keep watching.
            Ok(Ok(())) => {}
            // Sender dropped: the activity is returning. Let the work arm
            // of the select resolve instead of racing it.
            Ok(Err(_)) => std::future::pending::<()>().await,
            // Deadline elapsed with no heartbeat.
            Err(_) => return,
        }
    }
}
