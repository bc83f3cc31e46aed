//! Topology data layer
//!
//! A topology is an ordered set of node specs, each describing one OS
//! process of the deployment under test. Node order controls only the
//! launch sequence; addresses derive from (role, id) alone, so specs
//! can reference nodes that appear later in the sequence.

use crate::error::{HarnessError, HarnessResult};
use shared::NodeRole;
use std::collections::HashSet;

/// Placeholder in node args replaced with the node's written config path.
pub const CONFIG_PLACEHOLDER: &str = "{config}";
/// Placeholder in node args replaced with the node's private data directory.
pub const DIR_PLACEHOLDER: &str = "{dir}";

/// One participant of a topology: a single external process.
///
/// Identity is `(role, id)` and must be unique within a topology.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub role: NodeRole,
    pub id: u32,
    pub program: String,
    pub args: Vec<String>,
    /// Generated config payload written to disk before launch.
    pub config_text: Option<String>,
    /// File name the config payload is written under.
    pub config_file: String,
    /// Addresses of other nodes this node's flags or config reference.
    pub depends_on: Vec<String>,
}

impl NodeSpec {
    pub fn new(role: NodeRole, id: u32, program: impl Into<String>) -> Self {
        Self {
            role,
            id,
            program: program.into(),
            args: Vec::new(),
            config_text: None,
            config_file: "config.yaml".to_string(),
            depends_on: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the generated config payload.
    pub fn config_text(mut self, text: impl Into<String>) -> Self {
        self.config_text = Some(text.into());
        self
    }

    /// Override the file name the config payload is written under.
    pub fn config_file(mut self, name: impl Into<String>) -> Self {
        self.config_file = name.into();
        self
    }

    /// Record the addresses this node references.
    pub fn depends_on(mut self, addresses: impl IntoIterator<Item = String>) -> Self {
        self.depends_on = addresses.into_iter().collect();
        self
    }

    /// `role-id` name used for workdir paths and log lines.
    pub fn name(&self) -> String {
        format!("{}-{}", self.role, self.id)
    }
}

/// Immutable, ordered set of nodes started and torn down as a unit.
#[derive(Clone, Debug)]
pub struct TopologySpec {
    nodes: Vec<NodeSpec>,
}

impl TopologySpec {
    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Order-preserving builder over node specs.
///
/// The builder is `Clone` so a common prefix can fan out into multiple
/// topology variants, e.g. two scenarios sharing the scrape+sidecar
/// nodes but differing in the queriers' discovery mechanism.
#[derive(Clone, Debug, Default)]
pub struct TopologyBuilder {
    nodes: Vec<NodeSpec>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, preserving insertion order.
    pub fn add(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    /// Materialize the topology, rejecting duplicate `(role, id)` pairs.
    pub fn build(self) -> HarnessResult<TopologySpec> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert((node.role, node.id)) {
                return Err(HarnessError::DuplicateNode {
                    role: node.role,
                    id: node.id,
                });
            }
        }
        Ok(TopologySpec { nodes: self.nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn node(role: NodeRole, id: u32) -> NodeSpec {
        NodeSpec::new(role, id, "true")
    }

    #[test]
    fn test_build_preserves_order() {
        let spec = TopologyBuilder::new()
            .add(node(NodeRole::Querier, 1))
            .add(node(NodeRole::Scraper, 1))
            .add(node(NodeRole::Scraper, 2))
            .build()
            .unwrap();

        let names: Vec<String> = spec.nodes().iter().map(NodeSpec::name).collect();
        assert_eq!(names, ["querier-1", "scraper-1", "scraper-2"]);
    }

    #[test]
    fn test_build_rejects_duplicate_identity() {
        let result = TopologyBuilder::new()
            .add(node(NodeRole::Scraper, 1))
            .add(node(NodeRole::Sidecar, 1))
            .add(node(NodeRole::Scraper, 1))
            .build();

        assert_matches!(
            result,
            Err(HarnessError::DuplicateNode { role: NodeRole::Scraper, id: 1 })
        );
    }

    #[test]
    fn test_same_id_in_different_roles_is_distinct() {
        let spec = TopologyBuilder::new()
            .add(node(NodeRole::Scraper, 1))
            .add(node(NodeRole::Sidecar, 1))
            .add(node(NodeRole::Querier, 1))
            .build()
            .unwrap();
        assert_eq!(spec.len(), 3);
    }

    #[test]
    fn test_cloned_prefix_extends_into_independent_variants() {
        let prefix = TopologyBuilder::new()
            .add(node(NodeRole::Scraper, 1))
            .add(node(NodeRole::Sidecar, 1));

        let with_one_querier = prefix.clone().add(node(NodeRole::Querier, 1)).build().unwrap();
        let with_two_queriers = prefix
            .add(node(NodeRole::Querier, 1))
            .add(node(NodeRole::Querier, 2))
            .build()
            .unwrap();

        assert_eq!(with_one_querier.len(), 3);
        assert_eq!(with_two_queriers.len(), 4);
    }

    #[test]
    fn test_node_spec_accessors() {
        let spec = NodeSpec::new(NodeRole::Receiver, 7, "meshmon")
            .arg("receive")
            .config_text("payload")
            .config_file("targets.json")
            .depends_on(["127.0.0.1:9091".to_string()]);

        assert_eq!(spec.name(), "receiver-7");
        assert_eq!(spec.args, ["receive"]);
        assert_eq!(spec.config_text.as_deref(), Some("payload"));
        assert_eq!(spec.config_file, "targets.json");
        assert_eq!(spec.depends_on, ["127.0.0.1:9091"]);
    }
}
