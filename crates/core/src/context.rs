//! Run-scoped cancellation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Requested,
    DeadlineExceeded,
}

/// Returned when a [`RunContext`] has been cancelled or has run out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run cancelled: {}", match .reason {
    CancelReason::Requested => "cancellation requested",
    CancelReason::DeadlineExceeded => "deadline exceeded",
})]
pub struct Cancelled {
    pub reason: CancelReason,
}

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag plus an optional deadline.
///
/// Clones share the same flag: cancelling one cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    signal: Arc<Signal>,
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context that never expires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            signal: Arc::default(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation. Wakes everything waiting in [`RunContext::run`].
    pub fn cancel(&self) {
        self.signal.cancelled.store(true, Ordering::SeqCst);
        self.signal.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// `Err` once cancelled or past the deadline.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.signal.cancelled.load(Ordering::SeqCst) {
            return Err(Cancelled {
                reason: CancelReason::Requested,
            });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Cancelled {
                    reason: CancelReason::DeadlineExceeded,
                });
            }
        }
        Ok(())
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Drive `fut` to completion unless the context is cancelled first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        self.check()?;
        tokio::select! {
            out = fut => Ok(out),
            reason = self.wait() => Err(Cancelled { reason }),
        }
    }

    async fn wait(&self) -> CancelReason {
        let requested = async {
            loop {
                let notified = self.signal.notify.notified();
                if self.signal.cancelled.load(Ordering::SeqCst) {
                    return;
                }
                notified.await;
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = requested => CancelReason::Requested,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                requested.await;
                CancelReason::Requested
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let ctx = RunContext::new();
        let clone = ctx.clone();
        assert!(clone.check().is_ok());

        ctx.cancel();
        assert_eq!(
            clone.check().unwrap_err().reason,
            CancelReason::Requested
        );
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let ctx = RunContext::with_timeout(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            ctx.check().unwrap_err().reason,
            CancelReason::DeadlineExceeded
        );
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_run_interrupts_pending_future() {
        let ctx = RunContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(result.unwrap_err().reason, CancelReason::Requested);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = RunContext::with_timeout(Duration::from_millis(20));
        let result = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(result.unwrap_err().reason, CancelReason::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_run_returns_output() {
        let ctx = RunContext::with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
    }
}
