//! Bounded polling for remote task status.
//!
//! Every remote wait in the SDK (dataset release, export, import, training,
//! deployment) goes through [`Poller`], which bounds the total wait with an
//! optional deadline and supports cooperative cancellation. A caller that
//! configures neither gets a plain fixed-interval loop.

use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Error produced by a polling loop.
#[derive(Debug, Error)]
pub enum PollError<E: std::error::Error> {
    /// The configured deadline lapsed before the task reached a terminal state.
    #[error("polling timed out after {0:?}")]
    Timeout(Duration),

    /// The cancellation token fired.
    #[error("polling was cancelled")]
    Cancelled,

    /// The polled task itself failed.
    #[error(transparent)]
    Task(E),
}

/// Fixed-interval poller with an optional deadline and cancellation token.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    deadline: Option<Duration>,
    token: CancellationToken,
}

impl Poller {
    /// Creates a poller that checks on the given interval, with no deadline.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, deadline: None, token: CancellationToken::new() }
    }

    /// Bounds the total wait; exceeding it yields [`PollError::Timeout`].
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches an external cancellation token checked between iterations.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Polls `check` until it yields a value, the deadline lapses, or the
    /// token fires. `check` returns `Ok(None)` while the remote task is
    /// still in flight.
    pub async fn run<T, E, F, Fut>(&self, mut check: F) -> Result<T, PollError<E>>
    where
        E: std::error::Error,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let started = Instant::now();
        let mut rounds = 0_u64;
        loop {
            if self.token.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            match check().await {
                Ok(Some(value)) => {
                    debug!(rounds, elapsed = ?started.elapsed(), "poll reached terminal state");
                    return Ok(value);
                }
                Ok(None) => {}
                Err(err) => return Err(PollError::Task(err)),
            }

            rounds += 1;
            if let Some(deadline) = self.deadline {
                if started.elapsed() + self.interval > deadline {
                    return Err(PollError::Timeout(started.elapsed()));
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = self.token.cancelled() => return Err(PollError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Error)]
    #[error("task failed")]
    struct TaskFailed;

    #[tokio::test]
    async fn test_poll_returns_terminal_value() {
        let calls = AtomicUsize::new(0);
        let poller = Poller::new(Duration::from_millis(5));
        let result: Result<u32, _> = poller
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, TaskFailed>(if n >= 2 { Some(7) } else { None }) }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_deadline() {
        let poller = Poller::new(Duration::from_millis(10)).with_deadline(Duration::from_millis(25));
        let result: Result<u32, _> =
            poller.run(|| async { Ok::<_, TaskFailed>(None) }).await;
        assert!(matches!(result, Err(PollError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_poll_cancellation() {
        let token = CancellationToken::new();
        let poller = Poller::new(Duration::from_secs(10)).with_cancellation(token.clone());
        let handle = tokio::spawn(async move {
            poller.run(|| async { Ok::<Option<u32>, TaskFailed>(None) }).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(PollError::Cancelled)));
    }

    #[tokio::test]
    async fn test_poll_propagates_task_error() {
        let poller = Poller::new(Duration::from_millis(5));
        let result: Result<u32, _> = poller.run(|| async { Err(TaskFailed) }).await;
        assert!(matches!(result, Err(PollError::Task(_))));
    }
}
