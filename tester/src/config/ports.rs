//! Deterministic node address derivation
//!
//! Ports are a pure function of (role, id) so node configs can
//! reference each other's addresses before any process exists. Each
//! role owns a disjoint 100-wide HTTP band starting at 9090; the store
//! (gRPC) port is the HTTP port shifted by 1000, which keeps the two
//! spaces disjoint for the node ids topologies actually use.

use shared::NodeRole;

const HTTP_BASE: u16 = 9090;
const ROLE_BAND: u16 = 100;
const GRPC_OFFSET: u16 = 1000;

fn role_band(role: NodeRole) -> u16 {
    match role {
        NodeRole::Scraper => 0,
        NodeRole::Sidecar => 1,
        NodeRole::Querier => 2,
        NodeRole::Receiver => 3,
        NodeRole::Exporter => 4,
    }
}

/// HTTP port of a node.
pub fn http_port(role: NodeRole, id: u32) -> u16 {
    HTTP_BASE + role_band(role) * ROLE_BAND + id as u16
}

/// Store API (gRPC) port of a node.
pub fn grpc_port(role: NodeRole, id: u32) -> u16 {
    http_port(role, id) + GRPC_OFFSET
}

/// HTTP `host:port` address of a node.
pub fn http_address(role: NodeRole, id: u32) -> String {
    format!("127.0.0.1:{}", http_port(role, id))
}

/// Store API `host:port` address of a node.
pub fn grpc_address(role: NodeRole, id: u32) -> String {
    format!("127.0.0.1:{}", grpc_port(role, id))
}

/// Remote-write ingestion URL exposed by a receiver node.
pub fn remote_write_url(id: u32) -> String {
    format!("http://{}/api/v1/receive", http_address(NodeRole::Receiver, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [NodeRole; 5] = [
        NodeRole::Scraper,
        NodeRole::Sidecar,
        NodeRole::Querier,
        NodeRole::Receiver,
        NodeRole::Exporter,
    ];

    #[test]
    fn test_ports_are_deterministic() {
        assert_eq!(http_port(NodeRole::Scraper, 1), http_port(NodeRole::Scraper, 1));
        assert_eq!(http_port(NodeRole::Scraper, 1), 9091);
        assert_eq!(http_port(NodeRole::Querier, 2), 9292);
        assert_eq!(grpc_port(NodeRole::Sidecar, 3), 10193);
    }

    #[test]
    fn test_no_collisions_across_roles_and_ids() {
        let mut seen = std::collections::HashSet::new();
        for role in ROLES {
            for id in 1..=99 {
                assert!(seen.insert(http_port(role, id)), "http collision at {role}-{id}");
                assert!(seen.insert(grpc_port(role, id)), "grpc collision at {role}-{id}");
            }
        }
    }

    #[test]
    fn test_address_formatting() {
        assert_eq!(http_address(NodeRole::Scraper, 1), "127.0.0.1:9091");
        assert_eq!(grpc_address(NodeRole::Receiver, 1), "127.0.0.1:10391");
        assert_eq!(remote_write_url(1), "http://127.0.0.1:9391/api/v1/receive");
    }
}
