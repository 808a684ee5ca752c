//! Test stage configuration.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use super::common::Templatable;
use super::params::{ParallelConfig, ParameterBlock};
use super::request::Request;
use super::response::ResponseSteps;
use super::substitution::Substitution;

/// One HTTP request plus its response processing, executed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    /// Stage name, unique within the scenario.
    pub name: String,

    /// Extended human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Host-framework marker strings applied at stage scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<String>,

    /// Host-provided values injected at stage scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixtures: Vec<String>,

    /// Substitution entries evaluated when the stage context is built.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,

    /// Execute even if a prior stage failed.
    #[serde(default)]
    pub always_run: Templatable<bool>,

    /// Parameter blocks; their Cartesian product drives sequential
    /// iteration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parametrize: Vec<ParameterBlock>,

    /// Parallel iteration configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelConfig>,

    /// The HTTP request to issue.
    pub request: Request,

    /// Ordered response-processing steps.
    #[serde(default, skip_serializing_if = "ResponseSteps::is_empty")]
    pub response: ResponseSteps,
}

impl Stage {
    /// Creates a bare stage around a request, for programmatic construction.
    pub fn new(name: impl Into<String>, request: Request) -> Self {
        Self {
            name: name.into(),
            description: None,
            marks: Vec::new(),
            fixtures: Vec::new(),
            substitutions: Vec::new(),
            always_run: Templatable::Value(false),
            parametrize: Vec::new(),
            parallel: None,
            request,
            response: ResponseSteps::default(),
        }
    }
}

/// The ordered stages of a scenario.
///
/// Authored either as a JSON array of stage objects or as an object whose
/// keys name the stages; order is preserved as encountered. In the keyed
/// form a stage object may omit `name`, but must not carry a different one.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct StageList(pub Vec<Stage>);

impl<'de> Deserialize<'de> for StageList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        match value {
            JsonValue::Array(items) => {
                let mut stages = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let stage: Stage = serde_json::from_value(item)
                        .map_err(|e| D::Error::custom(format!("stage {index}: {e}")))?;
                    stages.push(stage);
                }
                Ok(Self(stages))
            }
            JsonValue::Object(_) => {
                let keyed: IndexMap<String, JsonValue> = serde_json::from_value(value)
                    .map_err(|e| D::Error::custom(e.to_string()))?;
                let mut stages = Vec::with_capacity(keyed.len());
                for (key, mut item) in keyed {
                    let object = item.as_object_mut().ok_or_else(|| {
                        D::Error::custom(format!("stage '{key}' must be an object"))
                    })?;
                    match object.get("name").and_then(JsonValue::as_str) {
                        None => {
                            object.insert("name".to_string(), JsonValue::String(key.clone()));
                        }
                        Some(name) if name == key => {}
                        Some(name) => {
                            return Err(D::Error::custom(format!(
                                "stage keyed '{key}' carries conflicting name '{name}'"
                            )))
                        }
                    }
                    let stage: Stage = serde_json::from_value(item)
                        .map_err(|e| D::Error::custom(format!("stage '{key}': {e}")))?;
                    stages.push(stage);
                }
                Ok(Self(stages))
            }
            _ => Err(D::Error::custom("stages must be an array or an object")),
        }
    }
}

impl StageList {
    /// Iterates over stages in authored order.
    pub fn iter(&self) -> std::slice::Iter<'_, Stage> {
        self.0.iter()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the scenario has no stages.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_minimal() {
        let stage: Stage = serde_json::from_value(json!({
            "name": "ping",
            "request": {"url": "http://h/ping"}
        }))
        .unwrap();
        assert_eq!(stage.name, "ping");
        assert_eq!(stage.always_run.as_value(), Some(&false));
        assert!(stage.response.is_empty());
    }

    #[test]
    fn test_stage_list_from_array() {
        let stages: StageList = serde_json::from_value(json!([
            {"name": "a", "request": {"url": "http://h/a"}},
            {"name": "b", "request": {"url": "http://h/b"}}
        ]))
        .unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages.0[1].name, "b");
    }

    #[test]
    fn test_stage_list_from_keyed_mapping() {
        let stages: StageList = serde_json::from_str(
            r#"{
                "login": {"request": {"url": "http://h/login", "method": "POST"}},
                "fetch": {"request": {"url": "http://h/me"}}
            }"#,
        )
        .unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages.0[0].name, "login");
        assert_eq!(stages.0[1].name, "fetch");
    }

    #[test]
    fn test_keyed_mapping_with_matching_name() {
        let stages: StageList = serde_json::from_value(json!({
            "ping": {"name": "ping", "request": {"url": "http://h"}}
        }))
        .unwrap();
        assert_eq!(stages.0[0].name, "ping");
    }

    #[test]
    fn test_keyed_mapping_with_conflicting_name_rejected() {
        let result: Result<StageList, _> = serde_json::from_value(json!({
            "ping": {"name": "pong", "request": {"url": "http://h"}}
        }));
        assert!(result.unwrap_err().to_string().contains("conflicting name"));
    }

    #[test]
    fn test_stage_with_always_run_template() {
        let stage: Stage = serde_json::from_value(json!({
            "name": "cleanup",
            "always_run": "{{ env == 'ci' }}",
            "request": {"url": "http://h/cleanup"}
        }))
        .unwrap();
        assert!(stage.always_run.is_template());
    }
}
