//! Shared types for the meshmon e2e harness
//!
//! Contains the query-result model observed through the deployment's
//! HTTP API and the node-role vocabulary used to describe topologies.
//! Harness-internal types (topology specs, probe outcomes) live in the
//! tester crate.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
