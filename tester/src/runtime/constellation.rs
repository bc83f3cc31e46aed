//! Service Constellation Management
//!
//! Starts a [`TopologySpec`] as one group of external processes,
//! watches the group as a unit, and tears everything down once the
//! first member exits or the scenario token fires. Node configs are
//! written to a per-run scratch directory before any process launches.

use crate::config::topology::{CONFIG_PLACEHOLDER, DIR_PLACEHOLDER, NodeSpec, TopologySpec};
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::signal::{CancelToken, DoneSignal, ExitReason, done_channel};
use shared::NodeRole;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

type NodeKey = (NodeRole, u32);
type ExitEvent = (NodeRole, u32, Option<ExitStatus>);

/// Lifecycle of one constellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TopologyState {
    Pending = 0,
    Starting = 1,
    Running = 2,
    Exited = 3,
    Cancelled = 4,
    /// A launch failed; surfaced synchronously from [`ServiceConstellation::start`],
    /// never observed on a live constellation.
    StartupFailed = 5,
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: TopologyState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn set(&self, state: TopologyState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    fn get(&self) -> TopologyState {
        match self.0.load(Ordering::SeqCst) {
            0 => TopologyState::Pending,
            1 => TopologyState::Starting,
            2 => TopologyState::Running,
            3 => TopologyState::Exited,
            4 => TopologyState::Cancelled,
            _ => TopologyState::StartupFailed,
        }
    }
}

/// Options for one constellation run.
#[derive(Clone, Debug)]
pub struct StartOptions {
    /// Keep the run directory on disk after teardown (debugging).
    pub keep_workdir: bool,
    /// Grace period between SIGTERM and SIGKILL during teardown.
    pub grace_period: Duration,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            keep_workdir: false,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

struct LaunchedNode {
    role: NodeRole,
    id: u32,
    pid: Option<i32>,
    child: Child,
}

/// A running topology. Owned exclusively here: callers observe
/// [`done`](Self::done), may call [`stop`](Self::stop), and may read
/// [`state`](Self::state); the child processes themselves never leak
/// out.
pub struct ServiceConstellation {
    run_id: Uuid,
    state: Arc<StateCell>,
    cancel: CancelToken,
    done: DoneSignal,
    supervisor: Option<JoinHandle<()>>,
    workdir_path: PathBuf,
    // Held so the scratch directory lives exactly as long as the run.
    _workdir: Option<tempfile::TempDir>,
}

impl ServiceConstellation {
    /// Start every node of `spec` as one supervised group.
    ///
    /// Launch order follows the spec's sequence order. Any launch
    /// error terminates the already-launched children and fails the
    /// whole start; no partial topology is left running.
    pub async fn start(
        spec: &TopologySpec,
        cancel: CancelToken,
        opts: StartOptions,
    ) -> HarnessResult<Self> {
        let run_id = Uuid::new_v4();
        let state = Arc::new(StateCell::new(TopologyState::Starting));

        let tempdir = tempfile::Builder::new().prefix("meshmon-e2e-").tempdir()?;
        let (workdir, workdir_path) = if opts.keep_workdir {
            let path = tempdir.keep();
            tracing::info!("📁 Keeping run directory {}", path.display());
            (None, path)
        } else {
            let path = tempdir.path().to_path_buf();
            (Some(tempdir), path)
        };

        tracing::info!(
            "🚀 Starting constellation {run_id}: {} nodes under {}",
            spec.len(),
            workdir_path.display()
        );

        let mut launched: Vec<LaunchedNode> = Vec::with_capacity(spec.len());
        for node in spec.nodes() {
            match launch_node(node, &workdir_path) {
                Ok(child) => {
                    let pid = child.id().map(|pid| pid as i32);
                    tracing::debug!("🏭 Launched {} (pid {pid:?})", node.name());
                    if !node.depends_on.is_empty() {
                        tracing::debug!("🔗 {} references {:?}", node.name(), node.depends_on);
                    }
                    launched.push(LaunchedNode {
                        role: node.role,
                        id: node.id,
                        pid,
                        child,
                    });
                }
                Err(source) => {
                    tracing::error!("❌ Failed to launch {}: {source}", node.name());
                    teardown_launched(&mut launched).await;
                    state.set(TopologyState::StartupFailed);
                    return Err(HarnessError::StartupFailure {
                        role: node.role,
                        id: node.id,
                        source,
                    });
                }
            }
        }
        state.set(TopologyState::Running);

        // One waiter task per child; the supervisor fans their exits in.
        let (exit_tx, exit_rx) = mpsc::unbounded_channel::<ExitEvent>();
        let mut pids: HashMap<NodeKey, Option<i32>> = HashMap::new();
        for node in launched {
            pids.insert((node.role, node.id), node.pid);
            let tx = exit_tx.clone();
            let (role, id, mut child) = (node.role, node.id, node.child);
            tokio::spawn(async move {
                let status = child.wait().await;
                let _ = tx.send((role, id, status.ok()));
            });
        }
        drop(exit_tx);

        let (done_tx, done) = done_channel();
        let supervisor = tokio::spawn(supervise(
            exit_rx,
            pids,
            cancel.clone(),
            done_tx,
            state.clone(),
            opts.grace_period,
        ));

        tracing::info!("✅ Constellation {run_id} running");
        Ok(Self {
            run_id,
            state,
            cancel,
            done,
            supervisor: Some(supervisor),
            workdir_path,
            _workdir: workdir,
        })
    }

    /// Completion signal; fires exactly once, on first node exit or
    /// cancellation. Clones are cheap and independent.
    pub fn done(&self) -> DoneSignal {
        self.done.clone()
    }

    pub fn state(&self) -> TopologyState {
        self.state.get()
    }

    /// Scratch directory holding each node's config and data dirs.
    pub fn workdir(&self) -> &Path {
        &self.workdir_path
    }

    /// Tear the constellation down. Idempotent; safe to call after the
    /// completion signal has already fired.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.supervisor.take() {
            let _ = handle.await;
            tracing::info!("🛑 Constellation {} shut down", self.run_id);
        }
    }
}

impl Drop for ServiceConstellation {
    fn drop(&mut self) {
        // Best effort: the supervisor keeps running on the runtime and
        // reaps the children; kill_on_drop backstops a dying runtime.
        self.cancel.cancel();
    }
}

fn launch_node(node: &NodeSpec, workdir: &Path) -> std::io::Result<Child> {
    let node_dir = workdir.join(node.name());
    let data_dir = node_dir.join("data");
    std::fs::create_dir_all(&data_dir)?;

    let config_path = node_dir.join(&node.config_file);
    if let Some(text) = &node.config_text {
        std::fs::write(&config_path, text)?;
    }

    let stdout = std::fs::File::create(node_dir.join("stdout.log"))?;
    let stderr = std::fs::File::create(node_dir.join("stderr.log"))?;

    let mut cmd = Command::new(&node.program);
    for arg in &node.args {
        cmd.arg(
            arg.replace(CONFIG_PLACEHOLDER, &config_path.to_string_lossy())
                .replace(DIR_PLACEHOLDER, &data_dir.to_string_lossy()),
        );
    }
    cmd.current_dir(&node_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);
    cmd.spawn()
}

/// Kill and reap children that launched before a later launch failed.
async fn teardown_launched(launched: &mut Vec<LaunchedNode>) {
    for node in launched.iter_mut() {
        let _ = node.child.start_kill();
    }
    for node in launched.iter_mut() {
        let _ = node.child.wait().await;
    }
}

async fn supervise(
    mut exits: mpsc::UnboundedReceiver<ExitEvent>,
    mut pids: HashMap<NodeKey, Option<i32>>,
    cancel: CancelToken,
    done_tx: watch::Sender<Option<ExitReason>>,
    state: Arc<StateCell>,
    grace_period: Duration,
) {
    let reason = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("🛑 Constellation cancelled, tearing down");
            ExitReason::Cancelled
        }
        exit = exits.recv() => match exit {
            Some((role, id, status)) => {
                pids.remove(&(role, id));
                tracing::warn!("⚠️ First exit: {role}-{id} ({status:?})");
                ExitReason::NodeExited { role, id, status }
            }
            // Every waiter gone without reporting; nothing left to supervise.
            None => ExitReason::Cancelled,
        }
    };

    let terminal = match reason {
        ExitReason::Cancelled => TopologyState::Cancelled,
        ExitReason::NodeExited { .. } => TopologyState::Exited,
    };
    let _ = done_tx.send(Some(reason));

    terminate_remaining(&mut exits, &mut pids, grace_period).await;
    state.set(terminal);
}

/// SIGTERM every remaining child, drain exits for the grace period,
/// then SIGKILL stragglers and reap them.
async fn terminate_remaining(
    exits: &mut mpsc::UnboundedReceiver<ExitEvent>,
    pids: &mut HashMap<NodeKey, Option<i32>>,
    grace_period: Duration,
) {
    if pids.is_empty() {
        return;
    }
    tracing::info!("🛑 Terminating {} remaining nodes", pids.len());

    for pid in pids.values().flatten() {
        terminate_gracefully(*pid);
    }

    let deadline = tokio::time::Instant::now() + grace_period;
    while !pids.is_empty() {
        match tokio::time::timeout_at(deadline, exits.recv()).await {
            Ok(Some((role, id, _))) => {
                pids.remove(&(role, id));
            }
            Ok(None) => return,
            Err(_) => break, // grace period over
        }
    }

    for ((role, id), pid) in pids.iter() {
        tracing::warn!("🔨 Force killing {role}-{id}");
        if let Some(pid) = pid {
            force_kill(*pid);
        }
    }
    while !pids.is_empty() {
        match exits.recv().await {
            Some((role, id, _)) => {
                pids.remove(&(role, id));
            }
            None => return,
        }
    }
}

#[cfg(unix)]
fn terminate_gracefully(pid: i32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
}

#[cfg(unix)]
fn force_kill(pid: i32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn terminate_gracefully(_pid: i32) {}

#[cfg(not(unix))]
fn force_kill(_pid: i32) {}
