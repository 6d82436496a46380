//! Retry policy for activity execution.
//!
//! One policy covers all activities: 5 s initial delay, exponential factor
//! 2.0, three attempts total, with jitter. Retries are gated on
//! [`Error::is_retryable`](crate::error::Error::is_retryable) at the call
//! site, so parameter and safety errors surface on the first failure.

use backon::ExponentialBuilder;

use crate::constants::{RETRY_BACKOFF_FACTOR, RETRY_INITIAL_INTERVAL, RETRY_MAX_ATTEMPTS};

/// Backoff policy applied to every activity.
///
/// `backon` counts retries after the first attempt, hence the `- 1`.
pub fn activity_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(RETRY_INITIAL_INTERVAL)
        .with_factor(RETRY_BACKOFF_FACTOR)
        .with_max_times(RETRY_MAX_ATTEMPTS - 1)
        .with_jitter()
}
