//! Instant-query HTTP client
//!
//! Thin reqwest wrapper over a query node's HTTP API. The request
//! timeout is its own bound, independent of the verifier's polling
//! interval. Transport failures and non-success statuses surface as
//! `TransientQuery` so the poll loop absorbs them; malformed bodies
//! are shape errors and fatal.

use crate::error::{HarnessError, HarnessResult};
use crate::runtime::signal::{CancelToken, DoneSignal};
use crate::testing::retry::{ProbeStatus, poll_until};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{LabelSet, QueryResult, Series, SharedError};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for one instant query.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryOptions {
    /// Collapse replica-distinguished series into one.
    pub deduplicate: bool,
}

/// HTTP client for one query node.
#[derive(Clone)]
pub struct QueryClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Vec<ApiSeries>,
}

#[derive(Deserialize)]
struct ApiSeries {
    metric: LabelSet,
    value: (f64, String),
}

impl QueryClient {
    /// Create a client for the query node at `addr` (`host:port` or a
    /// full URL).
    pub fn new(addr: &str) -> Self {
        let base_url = if addr.starts_with("http") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    /// Issue one instant query evaluated at `at`.
    pub async fn query_instant(
        &self,
        expr: &str,
        at: DateTime<Utc>,
        opts: &QueryOptions,
    ) -> HarnessResult<QueryResult> {
        let url = format!("{}/api/v1/query", self.base_url);
        let time = format!("{:.3}", at.timestamp_millis() as f64 / 1000.0);
        let dedup = opts.deduplicate.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", expr),
                ("time", time.as_str()),
                ("dedup", dedup.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(HarnessError::TransientQuery {
                message: format!("query returned HTTP {}", response.status()),
            });
        }

        let body: ApiResponse = response.json().await?;
        parse_response(body)
    }

    /// Poll the node's readiness endpoint until it answers 200.
    pub async fn wait_for_ready(
        &self,
        interval: Duration,
        cancel: &CancelToken,
        done: &DoneSignal,
    ) -> HarnessResult<()> {
        let url = format!("{}/-/ready", self.base_url);
        let url = &url;
        poll_until(interval, cancel, done, || async move {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => Ok(ProbeStatus::Converged(())),
                Ok(response) => Ok(ProbeStatus::Pending(format!(
                    "readiness returned HTTP {}",
                    response.status()
                ))),
                Err(err) => Ok(ProbeStatus::Pending(err.to_string())),
            }
        })
        .await?;
        tracing::info!("✅ Query node at {} is ready", self.base_url);
        Ok(())
    }
}

fn parse_response(body: ApiResponse) -> HarnessResult<QueryResult> {
    if body.status != "success" {
        return Err(HarnessError::TransientQuery {
            message: body
                .error
                .unwrap_or_else(|| format!("query status {}", body.status)),
        });
    }

    let data = body.data.ok_or_else(|| SharedError::MalformedResponse {
        message: "missing data section".to_string(),
    })?;
    if data.result_type != "vector" {
        return Err(SharedError::MalformedResponse {
            message: format!("unexpected result type {}", data.result_type),
        }
        .into());
    }

    let mut series = Vec::with_capacity(data.result.len());
    for item in data.result {
        let (timestamp, raw_value) = item.value;
        let value = raw_value
            .parse::<f64>()
            .map_err(|_| SharedError::InvalidSampleValue {
                input: raw_value.clone(),
            })?;
        series.push(Series {
            labels: item.metric,
            value,
            timestamp,
        });
    }

    Ok(QueryResult {
        series,
        warnings: body.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(json: &str) -> HarnessResult<QueryResult> {
        let body: ApiResponse = serde_json::from_str(json).unwrap();
        parse_response(body)
    }

    #[test]
    fn test_parses_a_vector_result_in_order() {
        let result = parse(
            r#"{
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [
                        {"metric": {"__name__": "up", "replica": "0"}, "value": [1700000000.781, "1"]},
                        {"metric": {"__name__": "up", "replica": "1"}, "value": [1700000000.781, "0.5"]}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(result.series.len(), 2);
        assert_eq!(result.series[0].labels.get("replica").map(String::as_str), Some("0"));
        assert_eq!(result.series[1].labels.get("replica").map(String::as_str), Some("1"));
        assert_eq!(result.series[1].value, 0.5);
        assert_eq!(result.series[0].timestamp, 1700000000.781);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_warnings_are_preserved() {
        let result = parse(
            r#"{
                "status": "success",
                "warnings": ["partial response"],
                "data": {"resultType": "vector", "result": []}
            }"#,
        )
        .unwrap();
        assert_eq!(result.warnings, ["partial response"]);
    }

    #[test]
    fn test_error_status_is_transient() {
        let result = parse(r#"{"status": "error", "error": "query timed out"}"#);
        assert_matches!(
            result,
            Err(HarnessError::TransientQuery { ref message }) if message == "query timed out"
        );
    }

    #[test]
    fn test_missing_data_is_a_shape_error() {
        let result = parse(r#"{"status": "success"}"#);
        assert_matches!(result, Err(HarnessError::Shared(_)));
    }

    #[test]
    fn test_non_vector_result_type_is_a_shape_error() {
        let result = parse(
            r#"{"status": "success", "data": {"resultType": "matrix", "result": []}}"#,
        );
        assert_matches!(result, Err(HarnessError::Shared(_)));
    }

    #[test]
    fn test_unparseable_sample_value_is_a_shape_error() {
        let result = parse(
            r#"{
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [{"metric": {}, "value": [1700000000.0, "not-a-number"]}]
                }
            }"#,
        );
        assert_matches!(result, Err(HarnessError::Shared(_)));
    }

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(QueryClient::new("127.0.0.1:9291").base_url, "http://127.0.0.1:9291");
        assert_eq!(QueryClient::new("http://127.0.0.1:9291").base_url, "http://127.0.0.1:9291");
    }
}
