//! Query federation scenarios
//!
//! Three replicated collectors (two sharing one collection group, one
//! in a second group) plus a forwarding-ingestion path, behind two
//! query nodes. Verifies that the merged view converges to 4 series
//! without deduplication and 3 with the replica label collapsed, and
//! that the discovery mechanism has no effect on query semantics.

use crate::config::nodes::{
    exporter, forward_config, querier_with_file_sd, querier_with_store_flags, receiver,
    scrape_config, scraper, sidecar,
};
use crate::config::ports;
use crate::config::topology::{TopologyBuilder, TopologySpec};
use crate::error::HarnessResult;
use crate::runtime::constellation::{ServiceConstellation, StartOptions};
use crate::runtime::query_client::{QueryClient, QueryOptions};
use crate::runtime::signal::{CancelToken, DoneSignal};
use crate::testing::assertions::{assert_series, check_series_count};
use crate::testing::retry::poll_until;
use chrono::Utc;
use shared::{LabelSet, NodeRole, labels};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How the queriers discover their stores.
#[derive(Clone, Copy, Debug)]
enum Discovery {
    StaticFlags,
    FileSd,
}

/// Static store-flag discovery, end to end.
pub async fn static_flags(deadline: Duration, opts: StartOptions) -> HarnessResult<()> {
    run_query_scenario("static_flags", Discovery::StaticFlags, deadline, opts).await
}

/// File-based store discovery; must produce exactly the same result
/// shape and counts as static flags.
pub async fn file_sd(deadline: Duration, opts: StartOptions) -> HarnessResult<()> {
    run_query_scenario("file_sd", Discovery::FileSd, deadline, opts).await
}

fn query_topology(discovery: Discovery) -> HarnessResult<TopologySpec> {
    let scrape_target = ports::http_address(NodeRole::Scraper, 1);
    let group_one = group_one_name();
    let stores = vec![
        ports::grpc_address(NodeRole::Sidecar, 1),
        ports::grpc_address(NodeRole::Sidecar, 2),
        ports::grpc_address(NodeRole::Sidecar, 3),
        ports::grpc_address(NodeRole::Receiver, 1),
    ];

    let collectors = TopologyBuilder::new()
        .add(scraper(1, scrape_config(&group_one, 0, &scrape_target)))
        .add(sidecar(1))
        .add(scraper(2, scrape_config("prom-ha", 0, &scrape_target)))
        .add(sidecar(2))
        .add(scraper(3, scrape_config("prom-ha", 1, &scrape_target)))
        .add(sidecar(3));

    let with_queriers = match discovery {
        Discovery::StaticFlags => collectors
            .add(querier_with_store_flags(1, "replica", stores.clone()))
            .add(querier_with_store_flags(2, "replica", stores)),
        Discovery::FileSd => collectors
            .add(querier_with_file_sd(1, "replica", stores.clone()))
            .add(querier_with_file_sd(2, "replica", stores)),
    };

    with_queriers
        .add(exporter(1))
        .add(scraper(
            4,
            forward_config(
                &ports::http_address(NodeRole::Exporter, 1),
                &ports::remote_write_url(1),
            ),
        ))
        .add(receiver(1, 1))
        .build()
}

fn group_one_name() -> String {
    format!("prom-{}", ports::http_port(NodeRole::Scraper, 1))
}

/// Expected raw view: one series per collector replica, each keeping
/// its replica label, in the backend's label sort order.
fn expected_raw_series() -> Vec<LabelSet> {
    let scrape_target = ports::http_address(NodeRole::Scraper, 1);
    let exporter_target = ports::http_address(NodeRole::Exporter, 1);
    let group_one = group_one_name();
    vec![
        labels! {
            "__name__" => "up",
            "instance" => scrape_target,
            "job" => "prometheus",
            "prometheus" => group_one,
            "replica" => "0",
        },
        labels! {
            "__name__" => "up",
            "instance" => scrape_target,
            "job" => "prometheus",
            "prometheus" => "prom-ha",
            "replica" => "0",
        },
        labels! {
            "__name__" => "up",
            "instance" => scrape_target,
            "job" => "prometheus",
            "prometheus" => "prom-ha",
            "replica" => "1",
        },
        labels! {
            "__name__" => "up",
            "instance" => exporter_target,
            "job" => "node",
            "receive" => "true",
            "replica" => "1",
        },
    ]
}

/// Expected deduplicated view: one series per distinct non-replica
/// label set, with the replica label stripped entirely.
fn expected_dedup_series() -> Vec<LabelSet> {
    let scrape_target = ports::http_address(NodeRole::Scraper, 1);
    let exporter_target = ports::http_address(NodeRole::Exporter, 1);
    let group_one = group_one_name();
    vec![
        labels! {
            "__name__" => "up",
            "instance" => scrape_target,
            "job" => "prometheus",
            "prometheus" => group_one,
        },
        labels! {
            "__name__" => "up",
            "instance" => scrape_target,
            "job" => "prometheus",
            "prometheus" => "prom-ha",
        },
        labels! {
            "__name__" => "up",
            "instance" => exporter_target,
            "job" => "node",
            "receive" => "true",
        },
    ]
}

async fn run_query_scenario(
    name: &str,
    discovery: Discovery,
    deadline: Duration,
    opts: StartOptions,
) -> HarnessResult<()> {
    tracing::info!("🧪 Scenario {name}: replicated collectors behind query federation");

    let topology = query_topology(discovery)?;
    let cancel = CancelToken::with_deadline(deadline);
    let mut constellation = ServiceConstellation::start(&topology, cancel.clone(), opts).await?;
    let done = constellation.done();

    let outcome = verify_convergence(&cancel, &done).await;

    constellation.stop().await;
    outcome?;

    tracing::info!("✅ Scenario {name}: PASSED");
    Ok(())
}

async fn verify_convergence(cancel: &CancelToken, done: &DoneSignal) -> HarnessResult<()> {
    let client = QueryClient::new(&ports::http_address(NodeRole::Querier, 1));
    client.wait_for_ready(POLL_INTERVAL, cancel, done).await?;
    let client = &client;

    // Raw view first: every replica contributes its own series.
    tracing::info!("🔍 Polling for 4 series without deduplication");
    let raw = poll_until(POLL_INTERVAL, cancel, done, || async move {
        let result = client
            .query_instant("up", Utc::now(), &QueryOptions { deduplicate: false })
            .await?;
        check_series_count(4, result)
    })
    .await?;
    assert_series(&expected_raw_series(), &raw)?;

    // Then the deduplicated view: the replica label collapses.
    tracing::info!("🔍 Polling for 3 series with deduplication");
    let dedup = poll_until(POLL_INTERVAL, cancel, done, || async move {
        let result = client
            .query_instant("up", Utc::now(), &QueryOptions { deduplicate: true })
            .await?;
        check_series_count(3, result)
    })
    .await?;
    assert_series(&expected_dedup_series(), &dedup)?;

    Ok(())
}
