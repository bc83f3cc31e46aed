//! Query-result assertions
//!
//! Positional, order-sensitive comparison between expected label sets
//! and an observed query result. The backend's sort order is itself
//! part of the contract under test, so neither side is ever reordered.

use crate::error::{HarnessError, HarnessResult};
use crate::testing::retry::ProbeStatus;
use shared::{LabelSet, QueryResult, format_labels};

/// Probe-stage check: warnings abort the scenario, a wrong series
/// count keeps the poll loop going.
pub fn check_series_count(
    expected: usize,
    result: QueryResult,
) -> HarnessResult<ProbeStatus<QueryResult>> {
    if !result.warnings.is_empty() {
        return Err(HarnessError::UnexpectedWarnings {
            warnings: result.warnings,
        });
    }
    if result.series.len() != expected {
        return Ok(ProbeStatus::Pending(format!(
            "unexpected result size {}, expected {}",
            result.series.len(),
            expected
        )));
    }
    Ok(ProbeStatus::Converged(result))
}

/// Exact positional comparison of every label set. Run once, after
/// the poll loop has converged on the series count; any mismatch here
/// is final.
pub fn assert_series(expected: &[LabelSet], actual: &QueryResult) -> HarnessResult<()> {
    if !actual.warnings.is_empty() {
        return Err(HarnessError::UnexpectedWarnings {
            warnings: actual.warnings.clone(),
        });
    }
    if actual.series.len() != expected.len() {
        return Err(HarnessError::SeriesCountMismatch {
            expected: expected.len(),
            actual: actual.series.len(),
        });
    }
    for (index, (want, got)) in expected.iter().zip(actual.series.iter()).enumerate() {
        if &got.labels != want {
            return Err(HarnessError::SeriesMismatch {
                index,
                expected: format_labels(want),
                actual: format_labels(&got.labels),
            });
        }
    }
    Ok(())
}
