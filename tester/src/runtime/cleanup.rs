//! Stale-process cleanup
//!
//! Aborted earlier runs can leave deployment processes bound to the
//! harness port bands, which makes every later scenario fail its
//! startup or, worse, converge against a zombie's data. Sweep them
//! before a scenario starts. Everything here is best-effort: a missing
//! `pkill`/`lsof` downgrades to a debug log.

use crate::config::ports;
use shared::NodeRole;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;

const ROLES: [NodeRole; 5] = [
    NodeRole::Scraper,
    NodeRole::Sidecar,
    NodeRole::Querier,
    NodeRole::Receiver,
    NodeRole::Exporter,
];
const MAX_NODE_ID: u32 = 4;

/// Cleanup manager for the harness's process names and port bands.
pub struct CleanupManager {
    target_processes: Vec<String>,
}

impl CleanupManager {
    pub fn new() -> Self {
        Self {
            target_processes: vec![
                "prometheus".to_string(),
                "meshmon".to_string(),
                "node_exporter".to_string(),
            ],
        }
    }

    /// Sweep stale processes and ports before `scenario` runs.
    pub async fn cleanup_before_test(&self, scenario: &str) {
        tracing::info!("🧹 Cleaning up before scenario: {scenario}");

        self.kill_target_processes().await;

        // Let the kills settle before probing ports.
        sleep(Duration::from_millis(500)).await;

        free_ports(&scenario_ports()).await;

        tracing::info!("✅ Cleanup complete for scenario: {scenario}");
    }

    async fn kill_target_processes(&self) {
        for name in &self.target_processes {
            match Command::new("pkill").arg("-x").arg(name).output().await {
                Ok(output) if output.status.success() => {
                    tracing::info!("🔪 Killed stale '{name}' processes");
                }
                Ok(_) => tracing::debug!("No stale '{name}' processes"),
                Err(err) => tracing::debug!("pkill unavailable for '{name}': {err}"),
            }
        }
    }
}

impl Default for CleanupManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Every port a scenario-sized topology can occupy.
fn scenario_ports() -> Vec<u16> {
    let mut all = Vec::new();
    for role in ROLES {
        for id in 1..=MAX_NODE_ID {
            all.push(ports::http_port(role, id));
            all.push(ports::grpc_port(role, id));
        }
    }
    all
}

async fn free_ports(target_ports: &[u16]) {
    for port in target_ports {
        let output = match Command::new("lsof").arg("-ti").arg(format!(":{port}")).output().await {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!("lsof unavailable: {err}");
                return;
            }
        };
        if !output.status.success() {
            continue; // nothing bound
        }
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            if let Ok(pid) = line.trim().parse::<i32>() {
                tracing::warn!("🔨 Port {port} still held by pid {pid}, killing it");
                kill_pid(pid);
            }
        }
    }
}

#[cfg(unix)]
fn kill_pid(pid: i32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_pid(_pid: i32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_ports_cover_every_role_band() {
        let all = scenario_ports();
        assert!(all.contains(&ports::http_port(NodeRole::Scraper, 4)));
        assert!(all.contains(&ports::grpc_port(NodeRole::Receiver, 1)));
        // No duplicates: the bands are disjoint by construction.
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }
}
