//! Cross-field validation for the scenario model.

use std::collections::HashSet;

use super::{
    ParallelConfig, ParameterBlock, Scenario, Stage, Substitution, Templatable,
};
use crate::error::{DomainResult, ValidationError};

impl Scenario {
    /// Runs all cross-field checks.
    ///
    /// Field-level shape checks happen during deserialization; this pass
    /// enforces relationships between fields: stage-name uniqueness, fixture
    /// uniqueness and collision rules, parameter `ids` lengths, and numeric
    /// ranges.
    pub(super) fn validate(&self) -> DomainResult<()> {
        check_fixture_list(&self.fixtures, "scenario")?;
        check_fixture_substitution_collisions(&self.fixtures, &self.substitutions)?;

        let mut seen = HashSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(ValidationError::EmptyStageName(index));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(ValidationError::DuplicateStageName(stage.name.clone()));
            }
            validate_stage(stage)?;
        }

        Ok(())
    }
}

fn validate_stage(stage: &Stage) -> DomainResult<()> {
    check_fixture_list(&stage.fixtures, &format!("stage '{}'", stage.name))?;

    if let Templatable::Value(timeout) = &stage.request.timeout {
        if *timeout <= 0.0 {
            return Err(ValidationError::OutOfRange {
                field: format!("stage '{}' request.timeout", stage.name),
                requirement: "greater than zero",
                value: timeout.to_string(),
            });
        }
    }

    if !stage.parametrize.is_empty() && stage.parallel.is_some() {
        return Err(ValidationError::ParametrizeWithParallel(stage.name.clone()));
    }

    for block in &stage.parametrize {
        validate_parameter_block(block, &stage.name)?;
    }

    if let Some(parallel) = &stage.parallel {
        validate_parallel(parallel, &stage.name)?;
    }

    for step in stage.response.iter() {
        if let super::ResponseStep::Verify(verify) = step {
            if let Some(Templatable::Value(expected)) = &verify.status {
                for code in expected.iter() {
                    if !(100..=599).contains(code) {
                        return Err(ValidationError::InvalidStatusCode(*code, stage.name.clone()));
                    }
                }
            }
        }
    }

    Ok(())
}

fn validate_parameter_block(block: &ParameterBlock, stage: &str) -> DomainResult<()> {
    match block {
        ParameterBlock::Individual(individual) => {
            if individual.individual.len() != 1 {
                return Err(ValidationError::OutOfRange {
                    field: format!("stage '{stage}' individual block"),
                    requirement: "exactly one parameter name",
                    value: individual.individual.len().to_string(),
                });
            }
            let values = individual.individual.values().next().map_or(0, Vec::len);
            if values == 0 {
                return Err(ValidationError::OutOfRange {
                    field: format!("stage '{stage}' individual values"),
                    requirement: "at least one value",
                    value: "0".to_string(),
                });
            }
            if let Some(ids) = &individual.ids {
                if ids.len() != values {
                    return Err(ValidationError::ParameterIdsMismatch {
                        stage: stage.to_string(),
                        ids: ids.len(),
                        values,
                    });
                }
            }
        }
        ParameterBlock::Combinations(combinations) => {
            if combinations.combinations.is_empty() {
                return Err(ValidationError::OutOfRange {
                    field: format!("stage '{stage}' combinations"),
                    requirement: "at least one row",
                    value: "0".to_string(),
                });
            }
            let first_keys: HashSet<&str> = combinations.combinations[0]
                .keys()
                .map(String::as_str)
                .collect();
            for (row, combo) in combinations.combinations.iter().enumerate().skip(1) {
                let keys: HashSet<&str> = combo.keys().map(String::as_str).collect();
                if keys != first_keys {
                    return Err(ValidationError::CombinationKeysMismatch {
                        stage: stage.to_string(),
                        row,
                    });
                }
            }
            if let Some(ids) = &combinations.ids {
                if ids.len() != combinations.combinations.len() {
                    return Err(ValidationError::ParameterIdsMismatch {
                        stage: stage.to_string(),
                        ids: ids.len(),
                        values: combinations.combinations.len(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_parallel(parallel: &ParallelConfig, stage: &str) -> DomainResult<()> {
    if parallel.max_concurrency() == 0 {
        return Err(ValidationError::OutOfRange {
            field: format!("stage '{stage}' parallel.max_concurrency"),
            requirement: "at least 1",
            value: "0".to_string(),
        });
    }
    if let Some(rate) = parallel.calls_per_sec() {
        if rate <= 0.0 {
            return Err(ValidationError::OutOfRange {
                field: format!("stage '{stage}' parallel.calls_per_sec"),
                requirement: "greater than zero",
                value: rate.to_string(),
            });
        }
    }
    if let ParallelConfig::Foreach(foreach) = parallel {
        for block in &foreach.foreach {
            validate_parameter_block(block, stage)?;
        }
    }
    Ok(())
}

fn check_fixture_list(fixtures: &[String], scope: &str) -> DomainResult<()> {
    let mut seen = HashSet::new();
    for name in fixtures {
        if !seen.insert(name.as_str()) {
            return Err(ValidationError::DuplicateFixture {
                name: name.clone(),
                scope: scope.to_string(),
            });
        }
    }
    Ok(())
}

fn check_fixture_substitution_collisions(
    fixtures: &[String],
    substitutions: &[Substitution],
) -> DomainResult<()> {
    let fixture_names: HashSet<&str> = fixtures.iter().map(String::as_str).collect();
    for substitution in substitutions {
        for name in substitution.names() {
            if fixture_names.contains(name) {
                return Err(ValidationError::FixtureCollision(name.to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario(document: serde_json::Value) -> DomainResult<Scenario> {
        Scenario::from_document(document)
    }

    #[test]
    fn test_duplicate_stage_names_rejected() {
        let result = scenario(json!({
            "stages": [
                {"name": "a", "request": {"url": "http://h"}},
                {"name": "a", "request": {"url": "http://h"}}
            ]
        }));
        assert_eq!(result, Err(ValidationError::DuplicateStageName("a".to_string())));
    }

    #[test]
    fn test_empty_stage_name_rejected() {
        let result = scenario(json!({
            "stages": [{"name": "  ", "request": {"url": "http://h"}}]
        }));
        assert_eq!(result, Err(ValidationError::EmptyStageName(0)));
    }

    #[test]
    fn test_fixture_collision_with_vars() {
        let result = scenario(json!({
            "fixtures": ["base_url"],
            "substitutions": [{"vars": {"base_url": "http://h"}}],
            "stages": []
        }));
        assert_eq!(
            result,
            Err(ValidationError::FixtureCollision("base_url".to_string()))
        );
    }

    #[test]
    fn test_duplicate_fixture_rejected() {
        let result = scenario(json!({"fixtures": ["db", "db"], "stages": []}));
        assert!(matches!(result, Err(ValidationError::DuplicateFixture { .. })));
    }

    #[test]
    fn test_parameter_ids_length_mismatch() {
        let result = scenario(json!({
            "stages": [{
                "name": "s",
                "parametrize": [{"individual": {"env": ["dev", "prod"]}, "ids": ["only-one"]}],
                "request": {"url": "http://h"}
            }]
        }));
        assert!(matches!(result, Err(ValidationError::ParameterIdsMismatch { .. })));
    }

    #[test]
    fn test_combination_key_mismatch() {
        let result = scenario(json!({
            "stages": [{
                "name": "s",
                "parametrize": [{"combinations": [{"a": 1}, {"b": 2}]}],
                "request": {"url": "http://h"}
            }]
        }));
        assert!(matches!(result, Err(ValidationError::CombinationKeysMismatch { .. })));
    }

    #[test]
    fn test_nonpositive_timeout_rejected() {
        let result = scenario(json!({
            "stages": [{"name": "s", "request": {"url": "http://h", "timeout": 0.0}}]
        }));
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = scenario(json!({
            "stages": [{
                "name": "s",
                "parallel": {"repeat": 3, "max_concurrency": 0},
                "request": {"url": "http://h"}
            }]
        }));
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_invalid_status_code_rejected() {
        let result = scenario(json!({
            "stages": [{
                "name": "s",
                "request": {"url": "http://h"},
                "response": [{"verify": {"status": 999}}]
            }]
        }));
        assert_eq!(
            result,
            Err(ValidationError::InvalidStatusCode(999, "s".to_string()))
        );
    }

    #[test]
    fn test_parametrize_with_parallel_rejected() {
        let result = scenario(json!({
            "stages": [{
                "name": "s",
                "parametrize": [{"individual": {"a": [1]}}],
                "parallel": {"repeat": 2, "max_concurrency": 1},
                "request": {"url": "http://h"}
            }]
        }));
        assert_eq!(
            result,
            Err(ValidationError::ParametrizeWithParallel("s".to_string()))
        );
    }

    #[test]
    fn test_valid_scenario_passes() {
        let result = scenario(json!({
            "fixtures": ["api_key"],
            "substitutions": [{"vars": {"host": "http://h"}}],
            "stages": [
                {
                    "name": "sweep",
                    "parametrize": [
                        {"individual": {"env": ["dev", "prod"]}, "ids": ["d", "p"]},
                        {"combinations": [{"fmt": "json", "accept": "application/json"}]}
                    ],
                    "request": {"url": "{{ host }}/x"},
                    "response": [{"verify": {"status": [200, 204]}}]
                },
                {
                    "name": "hammer",
                    "parallel": {"repeat": 2, "max_concurrency": 2, "calls_per_sec": 1.5},
                    "request": {"url": "{{ host }}/y"}
                }
            ]
        }));
        assert!(result.is_ok());
    }
}
