//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default scenario file suffix (`test_<name>.<suffix>.json`).
pub const DEFAULT_SUFFIX: &str = "http";

/// Default maximum number of `..` segments allowed in a `$ref` path.
pub const DEFAULT_REF_PARENT_TRAVERSAL_DEPTH: usize = 3;

/// Default upper bound on elements produced by a template comprehension.
pub const DEFAULT_MAX_COMPREHENSION_LENGTH: usize = 50_000;

/// Engine-wide configuration.
///
/// All fields have defaults so an empty document deserializes to the
/// standard configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Scenario file suffix used by discovery (`test_<name>.<suffix>.json`).
    pub suffix: String,

    /// Maximum number of leading `..` segments a `$ref` path may use.
    pub ref_parent_traversal_depth: usize,

    /// Maximum number of elements a template comprehension may produce.
    pub max_comprehension_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            ref_parent_traversal_depth: DEFAULT_REF_PARENT_TRAVERSAL_DEPTH,
            max_comprehension_length: DEFAULT_MAX_COMPREHENSION_LENGTH,
        }
    }
}

impl EngineConfig {
    /// Checks configuration constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the suffix is empty or contains characters
    /// outside `[A-Za-z0-9_-]`, or if `max_comprehension_length` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.suffix.is_empty()
            || self.suffix.len() > 32
            || !self
                .suffix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid {
                field: "suffix".to_string(),
                message: "must be 1-32 characters from [A-Za-z0-9_-]".to_string(),
            });
        }

        if self.max_comprehension_length == 0 {
            return Err(ConfigError::Invalid {
                field: "max_comprehension_length".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.suffix, "http");
        assert_eq!(config.ref_parent_traversal_depth, 3);
        assert_eq!(config.max_comprehension_length, 50_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config: EngineConfig = serde_json::from_str(r#"{"suffix": "api"}"#).unwrap();
        assert_eq!(config.suffix, "api");
        assert_eq!(config.ref_parent_traversal_depth, 3);
    }

    #[test]
    fn test_invalid_suffix_rejected() {
        let config = EngineConfig {
            suffix: "a/b".to_string(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            suffix: String::new(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_comprehension_limit_rejected() {
        let config = EngineConfig {
            max_comprehension_length: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
