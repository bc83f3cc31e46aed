//! Polling verification loop
//!
//! The deployment converges asynchronously, so content probes are
//! retried on an interval until the scenario deadline. Only two
//! outcomes keep the loop going: an explicit `Pending` (the predicate
//! does not hold yet, e.g. wrong series count) and a
//! `TransientQuery` error (transport refused, backend not ready).
//! Everything else aborts immediately — in particular a fired
//! completion signal and hard content mismatches are never retried.

use crate::error::{HarnessError, HarnessResult};
use crate::runtime::signal::{CancelToken, DoneSignal, ExitReason};
use std::future::Future;
use std::time::Duration;

/// Outcome of a single probe attempt.
#[derive(Clone, Debug)]
pub enum ProbeStatus<T> {
    /// The predicate holds; polling stops and yields the value.
    Converged(T),
    /// Not there yet; retried after the interval, with the reason kept
    /// for the deadline report.
    Pending(String),
}

/// Poll `probe` every `interval` until it converges, the topology
/// dies, or the scenario token triggers.
///
/// A fired completion signal beats everything: a node death surfaces
/// as [`HarnessError::PrematureExit`], distinct from the deadline. A
/// cancelled topology is the deadline, not a premature death, so both
/// the token and a `Cancelled` completion signal report
/// [`HarnessError::DeadlineExceeded`].
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    cancel: &CancelToken,
    done: &DoneSignal,
    mut probe: F,
) -> HarnessResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<ProbeStatus<T>>>,
{
    let mut attempts: u64 = 0;
    let mut last = String::from("no attempt completed");

    loop {
        match done.fired() {
            Some(reason @ ExitReason::NodeExited { .. }) => {
                return Err(HarnessError::PrematureExit {
                    reason: reason.to_string(),
                });
            }
            Some(ExitReason::Cancelled) => {
                return Err(HarnessError::DeadlineExceeded { attempts, last });
            }
            None => {}
        }
        if cancel.is_cancelled() {
            return Err(HarnessError::DeadlineExceeded { attempts, last });
        }

        attempts += 1;
        match probe().await {
            Ok(ProbeStatus::Converged(value)) => {
                tracing::debug!("✅ Probe converged after {attempts} attempts");
                return Ok(value);
            }
            Ok(ProbeStatus::Pending(reason)) => {
                tracing::debug!("⏳ Attempt {attempts} not converged: {reason}");
                last = reason;
            }
            Err(HarnessError::TransientQuery { message }) => {
                tracing::debug!("⏳ Attempt {attempts} failed transiently: {message}");
                last = message;
            }
            Err(err) => return Err(err),
        }

        // The interval sleep races cancellation and topology exit so
        // neither waits out a full tick before being observed.
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {}
            _ = done.wait() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::signal::done_channel;
    use assert_matches::assert_matches;
    use shared::NodeRole;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::watch;

    const TICK: Duration = Duration::from_millis(10);

    // The sender must stay alive so the done signal reads as unfired.
    fn idle_signals() -> (CancelToken, DoneSignal, watch::Sender<Option<ExitReason>>) {
        let (tx, done) = done_channel();
        (CancelToken::new(), done, tx)
    }

    #[tokio::test]
    async fn test_converges_after_pending_attempts() {
        let (cancel, done, _tx) = idle_signals();
        let calls = AtomicU64::new(0);
        let calls = &calls;

        let value = poll_until(TICK, &cancel, &done, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(ProbeStatus::Pending("not yet".to_string()))
            } else {
                Ok(ProbeStatus::Converged(42))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let (cancel, done, _tx) = idle_signals();
        let calls = AtomicU64::new(0);
        let calls = &calls;

        let value = poll_until(TICK, &cancel, &done, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HarnessError::TransientQuery {
                    message: "connection refused".to_string(),
                })
            } else {
                Ok(ProbeStatus::Converged("up"))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "up");
    }

    #[tokio::test]
    async fn test_node_exit_preempts_a_would_succeed_probe() {
        let cancel = CancelToken::new();
        let (tx, done) = done_channel();
        let _ = tx.send(Some(ExitReason::NodeExited {
            role: NodeRole::Querier,
            id: 1,
            status: Some(ExitStatus::from_raw(0)),
        }));

        let result: HarnessResult<()> = poll_until(TICK, &cancel, &done, || async move {
            Ok(ProbeStatus::Converged(()))
        })
        .await;

        assert_matches!(result, Err(HarnessError::PrematureExit { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_token_reports_deadline_with_last_reason() {
        let (cancel, done, _tx) = idle_signals();
        let calls = AtomicU64::new(0);
        let calls = &calls;
        let canceller = cancel.clone();
        let canceller = &canceller;

        let result: HarnessResult<()> = poll_until(TICK, &cancel, &done, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                canceller.cancel();
            }
            Ok(ProbeStatus::Pending("unexpected result size 2, expected 4".to_string()))
        })
        .await;

        assert_matches!(
            result,
            Err(HarnessError::DeadlineExceeded { attempts, ref last })
                if attempts >= 2 && last.contains("expected 4")
        );
    }

    #[tokio::test]
    async fn test_cancelled_topology_is_a_deadline_not_a_premature_exit() {
        let cancel = CancelToken::new();
        let (tx, done) = done_channel();
        let _ = tx.send(Some(ExitReason::Cancelled));

        let result: HarnessResult<()> = poll_until(TICK, &cancel, &done, || async move {
            Ok(ProbeStatus::Converged(()))
        })
        .await;

        assert_matches!(result, Err(HarnessError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn test_hard_errors_abort_without_retry() {
        let (cancel, done, _tx) = idle_signals();
        let calls = AtomicU64::new(0);
        let calls = &calls;

        let result: HarnessResult<()> = poll_until(TICK, &cancel, &done, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HarnessError::UnexpectedWarnings {
                warnings: vec!["partial response".to_string()],
            })
        })
        .await;

        assert_matches!(result, Err(HarnessError::UnexpectedWarnings { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
