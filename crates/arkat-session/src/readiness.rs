//! Session readiness polling
//!
//! The rendering scene becomes constructible at a time the host does not
//! control, so a background task polls a readiness predicate on a fixed
//! interval and hands off to the caller's context exactly once. The task
//! stops without handing off when its cancellation token fires.

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Predicate telling whether the scene can be configured
pub trait ReadinessProbe: Send + Sync + 'static {
    fn is_ready(&self) -> bool;
}

impl<F> ReadinessProbe for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn is_ready(&self) -> bool {
        self()
    }
}

/// Handoff delivered once the probe reports ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    /// Number of probe checks performed
    pub polls: u32,
    pub waited: Duration,
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready(Ready),
    /// The host was torn down first
    Cancelled,
    /// Ready, but nobody was left to receive the handoff
    HandoffDropped,
}

#[derive(Debug, Clone, Copy)]
pub struct ReadinessWaiter {
    interval: Duration,
}

impl Default for ReadinessWaiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl ReadinessWaiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until ready or cancelled
    pub async fn wait<P: ReadinessProbe + ?Sized>(
        &self,
        probe: &P,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                debug!(polls, "Readiness wait cancelled");
                return WaitOutcome::Cancelled;
            }

            polls += 1;
            if probe.is_ready() {
                let ready = Ready {
                    polls,
                    waited: started.elapsed(),
                };
                info!(polls, waited_ms = ready.waited.as_millis() as u64, "Scene ready");
                return WaitOutcome::Ready(ready);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(polls, "Readiness wait cancelled");
                    return WaitOutcome::Cancelled;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Run the wait on a background task
    ///
    /// The receiver resolves with [`Ready`] exactly once, or errors if the
    /// wait was cancelled.
    pub fn spawn<P: ReadinessProbe>(
        &self,
        probe: P,
        cancel: CancellationToken,
    ) -> (oneshot::Receiver<Ready>, JoinHandle<WaitOutcome>) {
        let (tx, rx) = oneshot::channel();
        let waiter = *self;

        let handle = tokio::spawn(async move {
            match waiter.wait(&probe, &cancel).await {
                WaitOutcome::Ready(ready) => {
                    if cancel.is_cancelled() {
                        return WaitOutcome::Cancelled;
                    }
                    if tx.send(ready).is_err() {
                        warn!("Readiness handoff dropped, receiver gone");
                        return WaitOutcome::HandoffDropped;
                    }
                    WaitOutcome::Ready(ready)
                }
                other => other,
            }
        });

        (rx, handle)
    }

    /// Wait in the background, then run `handoff` on the calling task
    ///
    /// `handoff` runs at most once and never after `cancel` has fired.
    pub async fn await_then<P, T, F>(
        &self,
        probe: P,
        cancel: CancellationToken,
        handoff: F,
    ) -> Option<T>
    where
        P: ReadinessProbe,
        F: FnOnce(Ready) -> T,
    {
        let (rx, handle) = self.spawn(probe, cancel.clone());

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = rx => result.ok(),
        };

        match handle.await {
            Ok(outcome) => debug!(?outcome, "Readiness waiter finished"),
            Err(e) => warn!(error = %e, "Readiness waiter task failed"),
        }

        match ready {
            Some(ready) if !cancel.is_cancelled() => Some(handoff(ready)),
            _ => {
                info!("Session setup skipped, host torn down before scene was ready");
                None
            }
        }
    }
}
