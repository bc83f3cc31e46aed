//! Scenario-scoped signal primitives
//!
//! One [`CancelToken`] scopes an entire scenario and cascades into the
//! verifier's retry loop and the constellation's supervision. One
//! [`DoneSignal`] is the constellation's broadcast-once terminal
//! state: every clone observes the same [`ExitReason`] no matter when
//! it starts watching.

use shared::NodeRole;
use std::fmt;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Why a constellation reached its terminal state.
#[derive(Clone, Debug)]
pub enum ExitReason {
    /// A node exited on its own; the first exit wins. `status` is
    /// `None` only if waiting on the child itself failed.
    NodeExited {
        role: NodeRole,
        id: u32,
        status: Option<ExitStatus>,
    },
    /// The scenario's cancel token was triggered.
    Cancelled,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::NodeExited {
                role,
                id,
                status: Some(status),
            } => write!(f, "node {role}-{id} exited ({status})"),
            ExitReason::NodeExited { role, id, status: None } => {
                write!(f, "node {role}-{id} exited (wait failed)")
            }
            ExitReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Cancellation token; cloning shares the trigger.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Token that triggers itself once `deadline` elapses.
    pub fn with_deadline(deadline: Duration) -> Self {
        let token = Self::new();
        let auto = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            auto.cancel();
        });
        token
    }

    /// Trigger the token. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once the token is triggered; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the constellation side and the observer side of a done signal.
pub(crate) fn done_channel() -> (watch::Sender<Option<ExitReason>>, DoneSignal) {
    let (tx, rx) = watch::channel(None);
    (tx, DoneSignal { rx })
}

/// Broadcast-once completion signal.
#[derive(Clone, Debug)]
pub struct DoneSignal {
    rx: watch::Receiver<Option<ExitReason>>,
}

impl DoneSignal {
    /// Terminal state, if the signal has fired.
    pub fn fired(&self) -> Option<ExitReason> {
        self.rx.borrow().clone()
    }

    /// Wait for the terminal state. The value is retained, so late
    /// observers resolve immediately.
    pub async fn wait(&self) -> ExitReason {
        let mut rx = self.rx.clone();
        match rx.wait_for(|state| state.is_some()).await {
            Ok(state) => state
                .clone()
                .unwrap_or(ExitReason::Cancelled),
            // Sender dropped without firing: the constellation is gone,
            // which for observers is indistinguishable from cancellation.
            Err(_) => ExitReason::Cancelled,
        }
    }
}
