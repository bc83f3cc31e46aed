//! Node constructors
//!
//! Produces fully-wired [`NodeSpec`]s for each deployment role, plus
//! the two generated config shapes the collection system consumes: a
//! scrape config (external labels + one static target) and a
//! scrape-and-forward config (one static target + a remote-write
//! destination). Config payloads are opaque to the rest of the
//! harness; their schema belongs to the external binaries.

use super::ports;
use super::topology::{CONFIG_PLACEHOLDER, DIR_PLACEHOLDER, NodeSpec};
use shared::NodeRole;

fn binary(env_key: &str, default: &str) -> String {
    std::env::var(env_key).unwrap_or_else(|_| default.to_string())
}

/// Scraper binary, overridable via `PROMETHEUS_BIN`.
pub fn prometheus_bin() -> String {
    binary("PROMETHEUS_BIN", "prometheus")
}

/// Deployment binary (sidecar/query/receive subcommands), overridable
/// via `MESHMON_BIN`.
pub fn meshmon_bin() -> String {
    binary("MESHMON_BIN", "meshmon")
}

/// Host-metrics exporter binary, overridable via `NODE_EXPORTER_BIN`.
pub fn node_exporter_bin() -> String {
    binary("NODE_EXPORTER_BIN", "node_exporter")
}

/// Scrape configuration: collection-group external labels plus one
/// static scrape target.
pub fn scrape_config(group: &str, replica: u32, scrape_target: &str) -> String {
    format!(
        r#"global:
  external_labels:
    prometheus: {group}
    replica: {replica}
scrape_configs:
- job_name: prometheus
  scrape_interval: 1s
  static_configs:
  - targets:
    - "{scrape_target}"
"#
    )
}

/// Scrape-and-forward configuration: one static target plus a
/// remote-write destination URL.
pub fn forward_config(scrape_target: &str, remote_write_url: &str) -> String {
    format!(
        r#"scrape_configs:
- job_name: 'node'
  scrape_interval: 1s
  static_configs:
  - targets: ['{scrape_target}']
remote_write:
- url: "{remote_write_url}"
"#
    )
}

/// Scraping collector node running the given config.
pub fn scraper(id: u32, config: String) -> NodeSpec {
    NodeSpec::new(NodeRole::Scraper, id, prometheus_bin())
        .arg(format!("--config.file={CONFIG_PLACEHOLDER}"))
        .arg(format!("--storage.tsdb.path={DIR_PLACEHOLDER}"))
        .arg(format!(
            "--web.listen-address={}",
            ports::http_address(NodeRole::Scraper, id)
        ))
        .arg("--log.level=info")
        .config_text(config)
}

/// Store sidecar exposing its scraper's local samples to federation.
pub fn sidecar(id: u32) -> NodeSpec {
    let scraper_address = ports::http_address(NodeRole::Scraper, id);
    NodeSpec::new(NodeRole::Sidecar, id, meshmon_bin())
        .arg("sidecar")
        .arg(format!("--prometheus.url=http://{scraper_address}"))
        .arg(format!(
            "--grpc-address={}",
            ports::grpc_address(NodeRole::Sidecar, id)
        ))
        .arg(format!(
            "--http-address={}",
            ports::http_address(NodeRole::Sidecar, id)
        ))
        .depends_on([scraper_address])
}

fn querier_base(id: u32, replica_label: &str) -> NodeSpec {
    NodeSpec::new(NodeRole::Querier, id, meshmon_bin())
        .arg("query")
        .arg(format!(
            "--http-address={}",
            ports::http_address(NodeRole::Querier, id)
        ))
        .arg(format!(
            "--grpc-address={}",
            ports::grpc_address(NodeRole::Querier, id)
        ))
        .arg(format!("--query.replica-label={replica_label}"))
}

/// Query-federation node discovering its stores through repeated
/// `--store` flags.
pub fn querier_with_store_flags(id: u32, replica_label: &str, stores: Vec<String>) -> NodeSpec {
    let mut node = querier_base(id, replica_label);
    for store in &stores {
        node = node.arg(format!("--store={store}"));
    }
    node.depends_on(stores)
}

/// Query-federation node discovering its stores through a file-SD
/// document. Must be observationally identical to static flags.
pub fn querier_with_file_sd(id: u32, replica_label: &str, stores: Vec<String>) -> NodeSpec {
    let sd_document = serde_json::json!([{ "targets": &stores }]);
    querier_base(id, replica_label)
        .arg(format!("--store.sd-files={CONFIG_PLACEHOLDER}"))
        .config_text(sd_document.to_string())
        .config_file("targets.json")
        .depends_on(stores)
}

/// Remote-write receiver; its external labels mark the ingestion
/// replica the same way a scraper's config marks a collection replica.
pub fn receiver(id: u32, replica: u32) -> NodeSpec {
    NodeSpec::new(NodeRole::Receiver, id, meshmon_bin())
        .arg("receive")
        .arg(format!(
            "--remote-write.address={}",
            ports::http_address(NodeRole::Receiver, id)
        ))
        .arg(format!(
            "--grpc-address={}",
            ports::grpc_address(NodeRole::Receiver, id)
        ))
        .arg(format!("--tsdb.path={DIR_PLACEHOLDER}"))
        .arg("--label=receive=\"true\"")
        .arg(format!("--label=replica=\"{replica}\""))
}

/// Host-metrics exporter scraped by the forwarding path.
pub fn exporter(id: u32) -> NodeSpec {
    NodeSpec::new(NodeRole::Exporter, id, node_exporter_bin()).arg(format!(
        "--web.listen-address={}",
        ports::http_address(NodeRole::Exporter, id)
    ))
}
