//! Stage parameterization and parallel iteration configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A block expanding one parameter into one row per value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndividualBlock {
    /// Single entry: parameter name mapped to its list of values.
    pub individual: IndexMap<String, Vec<JsonValue>>,
    /// Optional row labels, one per value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

/// A block listing explicit parameter combinations, one row per mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombinationsBlock {
    /// Rows; every row must bind the same set of parameter names.
    pub combinations: Vec<IndexMap<String, JsonValue>>,
    /// Optional row labels, one per combination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

/// One parameter block; multiple blocks compose by Cartesian product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterBlock {
    /// `individual { key: [values] }`.
    Individual(IndividualBlock),
    /// `combinations: [row, ...]`.
    Combinations(CombinationsBlock),
}

impl ParameterBlock {
    /// Number of rows this block contributes to the product.
    pub fn row_count(&self) -> usize {
        match self {
            Self::Individual(block) => block
                .individual
                .values()
                .next()
                .map_or(0, Vec::len),
            Self::Combinations(block) => block.combinations.len(),
        }
    }

    /// Row labels, if authored.
    pub fn ids(&self) -> Option<&[String]> {
        match self {
            Self::Individual(block) => block.ids.as_deref(),
            Self::Combinations(block) => block.ids.as_deref(),
        }
    }
}

/// `parallel: {repeat: n, ...}`: n identical invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepeatConfig {
    /// Number of invocations to schedule.
    pub repeat: usize,
    /// Upper bound on simultaneous invocations.
    pub max_concurrency: usize,
    /// Optional average dispatch-rate bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls_per_sec: Option<f64>,
}

/// `parallel: {foreach: [...], ...}`: one invocation per expanded row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeachConfig {
    /// Parameter blocks, expanded exactly like `parametrize`.
    pub foreach: Vec<ParameterBlock>,
    /// Upper bound on simultaneous invocations.
    pub max_concurrency: usize,
    /// Optional average dispatch-rate bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls_per_sec: Option<f64>,
}

/// Parallel iteration configuration for a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParallelConfig {
    /// Schedule `repeat` identical invocations.
    Repeat(RepeatConfig),
    /// One invocation per expanded parameter row.
    Foreach(ForeachConfig),
}

impl ParallelConfig {
    /// Maximum number of simultaneous invocations.
    pub const fn max_concurrency(&self) -> usize {
        match self {
            Self::Repeat(c) => c.max_concurrency,
            Self::Foreach(c) => c.max_concurrency,
        }
    }

    /// Dispatch-rate bound, when configured.
    pub const fn calls_per_sec(&self) -> Option<f64> {
        match self {
            Self::Repeat(c) => c.calls_per_sec,
            Self::Foreach(c) => c.calls_per_sec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_individual_block() {
        let block: ParameterBlock =
            serde_json::from_value(json!({"individual": {"env": ["dev", "prod"]}})).unwrap();
        assert_eq!(block.row_count(), 2);
        assert!(block.ids().is_none());
    }

    #[test]
    fn test_individual_with_ids() {
        let block: ParameterBlock = serde_json::from_value(json!({
            "individual": {"fmt": ["json", "xml"]},
            "ids": ["as-json", "as-xml"]
        }))
        .unwrap();
        assert_eq!(block.ids(), Some(&["as-json".to_string(), "as-xml".to_string()][..]));
    }

    #[test]
    fn test_combinations_block() {
        let block: ParameterBlock = serde_json::from_value(json!({
            "combinations": [
                {"user": "alice", "role": "admin"},
                {"user": "bob", "role": "viewer"}
            ]
        }))
        .unwrap();
        assert_eq!(block.row_count(), 2);
    }

    #[test]
    fn test_mixed_block_rejected() {
        let result: Result<ParameterBlock, _> = serde_json::from_value(json!({
            "individual": {"a": [1]},
            "combinations": [{"b": 2}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_parallel_repeat() {
        let config: ParallelConfig = serde_json::from_value(json!({
            "repeat": 10,
            "max_concurrency": 4,
            "calls_per_sec": 5.0
        }))
        .unwrap();
        assert_eq!(config.max_concurrency(), 4);
        assert_eq!(config.calls_per_sec(), Some(5.0));
        assert!(matches!(config, ParallelConfig::Repeat(RepeatConfig { repeat: 10, .. })));
    }

    #[test]
    fn test_parallel_foreach() {
        let config: ParallelConfig = serde_json::from_value(json!({
            "foreach": [{"individual": {"region": ["eu", "us"]}}],
            "max_concurrency": 2
        }))
        .unwrap();
        assert!(matches!(config, ParallelConfig::Foreach(_)));
        assert_eq!(config.calls_per_sec(), None);
    }

    #[test]
    fn test_parallel_requires_mode() {
        let result: Result<ParallelConfig, _> =
            serde_json::from_value(json!({"max_concurrency": 2}));
        assert!(result.is_err());
    }
}
