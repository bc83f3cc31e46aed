//! Test Scenarios
//!
//! Scenario functions are plain async fns over the harness library;
//! the runner binary dispatches to them by name.

pub mod query;

use crate::error::{HarnessError, HarnessResult};
use crate::runtime::constellation::StartOptions;
use std::time::Duration;

/// Run a scenario by name.
pub async fn run_scenario(name: &str, deadline: Duration, opts: StartOptions) -> HarnessResult<()> {
    match name {
        "static_flags" => query::static_flags(deadline, opts).await,
        "file_sd" => query::file_sd(deadline, opts).await,

        // Full suite, with a settle gap between topologies so freed
        // ports are actually free again.
        "all" => {
            query::static_flags(deadline, opts.clone()).await?;
            tokio::time::sleep(Duration::from_secs(2)).await;
            query::file_sd(deadline, opts).await
        }

        _ => Err(HarnessError::UnknownScenario {
            name: name.to_string(),
            available: available_scenarios().join(", "),
        }),
    }
}

/// Scenario names the runner accepts.
pub fn available_scenarios() -> Vec<&'static str> {
    vec!["static_flags", "file_sd", "all"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_unknown_scenario_is_rejected_with_the_catalog() {
        let result = run_scenario(
            "nope",
            Duration::from_secs(1),
            StartOptions::default(),
        )
        .await;

        assert_matches!(
            result,
            Err(HarnessError::UnknownScenario { ref name, ref available })
                if name == "nope" && available.contains("static_flags")
        );
    }
}
