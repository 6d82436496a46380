//! Activity-side execution context.
//!
//! Every activity receives an [`ActivityContext`] from its supervisor. The
//! contract mirrors durable-workflow engines: the activity heartbeats on a
//! cadence compatible with its heartbeat timeout, and cancellation is
//! observed at heartbeat boundaries, so [`ActivityContext::heartbeat`] both
//! reports liveness and returns [`Error::Cancelled`] when the run is being
//! torn down.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Handle through which an activity reports progress and observes
/// cancellation.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    heartbeat_tx: watch::Sender<u64>,
    cancel: CancellationToken,
}

impl ActivityContext {
    pub(crate) fn new(heartbeat_tx: watch::Sender<u64>, cancel: CancellationToken) -> Self {
        Self { heartbeat_tx, cancel }
    }

    /// A context with no supervisor: heartbeats go nowhere and cancellation
    /// never fires. For tests and direct embedding of single activities.
    pub fn detached() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            heartbeat_tx: tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Report liveness with a progress figure (running record count).
    ///
    /// Returns [`Error::Cancelled`] when the workflow has been cancelled;
    /// activities abort their inner loop by propagating it.
    pub fn heartbeat(&self, progress: u64) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        // The receiver is gone once the supervisor stops watching; that is
        // not the activity's problem.
        let _ = self.heartbeat_tx.send(progress);
        Ok(())
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Count-or-wall-clock heartbeat cadence.
///
/// Fires when the item count hits a multiple of `every` or when `wall` time
/// has passed since the last beat, whichever comes first.
#[derive(Debug)]
pub struct Cadence {
    every: u64,
    wall: Duration,
    last: Instant,
}

impl Cadence {
    /// Cadence with both a count interval and a wall-clock safety net.
    pub fn new(every: u64, wall: Duration) -> Self {
        Self {
            every,
            wall,
            last: Instant::now(),
        }
    }

    /// Count-only cadence.
    pub fn every(every: u64) -> Self {
        Self::new(every, Duration::MAX)
    }

    /// Whether a heartbeat is due at this count; resets the wall clock when
    /// it is.
    pub fn due(&mut self, count: u64) -> bool {
        if (self.every > 0 && count % self.every == 0) || self.last.elapsed() >= self.wall {
            self.last = Instant::now();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_context_heartbeats_forever() {
        let ctx = ActivityContext::detached();
        for i in 0..100 {
            ctx.heartbeat(i).unwrap();
        }
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn cancelled_context_fails_heartbeat() {
        let (tx, _rx) = watch::channel(0);
        let token = CancellationToken::new();
        let ctx = ActivityContext::new(tx, token.clone());
        ctx.heartbeat(1).unwrap();
        token.cancel();
        assert!(matches!(ctx.heartbeat(2), Err(Error::Cancelled)));
    }

    #[test]
    fn cadence_fires_on_count_multiples() {
        let mut c = Cadence::every(5);
        let fired: Vec<u64> = (1..=20).filter(|&n| c.due(n)).collect();
        assert_eq!(fired, vec![5, 10, 15, 20]);
    }

    #[test]
    fn cadence_fires_on_wall_clock() {
        let mut c = Cadence::new(1_000_000, Duration::from_millis(0));
        // Count never reaches the interval, but the wall clock is already due.
        assert!(c.due(1));
    }
}
