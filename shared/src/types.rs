//! Core shared types: node roles and the query-result model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Role a node plays in the monitored deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRole {
    /// Periodically samples metric values from targets.
    Scraper,
    /// Co-located with a scraper; exposes its local samples to query federation.
    Sidecar,
    /// Fans out queries to sidecars/receivers and merges results.
    Querier,
    /// Accepts pushed (remote-write) samples instead of being scraped.
    Receiver,
    /// Serves host metrics for the forwarding path to scrape.
    Exporter,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Scraper => "scraper",
            NodeRole::Sidecar => "sidecar",
            NodeRole::Querier => "querier",
            NodeRole::Receiver => "receiver",
            NodeRole::Exporter => "exporter",
        };
        write!(f, "{name}")
    }
}

/// Label set attached to a single series.
///
/// Comparison is plain map equality; the BTreeMap keeps rendered label
/// sets in a stable key order so mismatch diffs are readable.
pub type LabelSet = BTreeMap<String, String>;

/// One series of an instant-query result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: LabelSet,
    pub value: f64,
    pub timestamp: f64,
}

/// Instant-query result: series in the backend's sort order, plus any
/// warnings the backend attached to the response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub series: Vec<Series>,
    pub warnings: Vec<String>,
}

/// Render a label set the way the query backend prints selectors.
pub fn format_labels(labels: &LabelSet) -> String {
    let pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
    format!("{{{}}}", pairs.join(", "))
}

/// Build a [`LabelSet`] literal.
///
/// ```
/// use shared::labels;
///
/// let set = labels! { "__name__" => "up", "job" => "prometheus" };
/// assert_eq!(set.get("job").map(String::as_str), Some("prometheus"));
/// ```
#[macro_export]
macro_rules! labels {
    () => {
        std::collections::BTreeMap::<String, String>::new()
    };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut set = std::collections::BTreeMap::<String, String>::new();
        $( set.insert($key.to_string(), $value.to_string()); )+
        set
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(NodeRole::Scraper.to_string(), "scraper");
        assert_eq!(NodeRole::Querier.to_string(), "querier");
        assert_eq!(NodeRole::Receiver.to_string(), "receiver");
    }

    #[test]
    fn test_labels_macro() {
        let set = labels! { "b" => "2", "a" => "1" };
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a").map(String::as_str), Some("1"));

        let empty = labels! {};
        assert!(empty.is_empty());
    }

    #[test]
    fn test_format_labels_is_key_ordered() {
        let set = labels! { "replica" => "0", "__name__" => "up", "job" => "prometheus" };
        assert_eq!(
            format_labels(&set),
            "{__name__=\"up\", job=\"prometheus\", replica=\"0\"}"
        );
    }

    #[test]
    fn test_label_set_equality_ignores_insertion_order() {
        let mut forward = LabelSet::new();
        forward.insert("a".into(), "1".into());
        forward.insert("b".into(), "2".into());

        let mut backward = LabelSet::new();
        backward.insert("b".into(), "2".into());
        backward.insert("a".into(), "1".into());

        assert_eq!(forward, backward);
    }
}
