//! E2E Verification Harness
//!
//! Declares a multi-node metrics deployment as data, runs it as a
//! group of coordinated external processes, and polls the query
//! frontier until the deployment converges to the expected
//! deduplicated view.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use shared::NodeRole;
//! use tester::config::{TopologyBuilder, nodes, ports};
//! use tester::runtime::{CancelToken, ServiceConstellation, StartOptions};
//!
//! # async fn run() -> tester::HarnessResult<()> {
//! let target = ports::http_address(NodeRole::Scraper, 1);
//! let topology = TopologyBuilder::new()
//!     .add(nodes::scraper(1, nodes::scrape_config("prom-one", 0, &target)))
//!     .add(nodes::sidecar(1))
//!     .build()?;
//!
//! let cancel = CancelToken::with_deadline(Duration::from_secs(180));
//! let mut constellation =
//!     ServiceConstellation::start(&topology, cancel.clone(), StartOptions::default()).await?;
//! let done = constellation.done();
//! // ... poll the query frontier with `tester::testing::poll_until`, then:
//! constellation.stop().await;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod runtime;
pub mod scenarios;
pub mod testing;

// Main interfaces - re-exported at crate root for convenience
pub use config::{NodeSpec, TopologyBuilder, TopologySpec};
pub use error::{HarnessError, HarnessResult};
pub use runtime::{CancelToken, DoneSignal, ServiceConstellation, StartOptions};

// Supporting types
pub use runtime::{CleanupManager, ExitReason, QueryClient, QueryOptions, TopologyState};
pub use testing::{ProbeStatus, assert_series, check_series_count, poll_until};
