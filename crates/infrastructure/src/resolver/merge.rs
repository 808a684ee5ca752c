//! Deep merge of a referenced value with the `$ref`'s sibling keys.

use serde_json::Value as JsonValue;

use super::ResolveError;

/// Merges `overlay` (the sibling keys) onto `base` (the referenced value).
///
/// Mappings merge recursively; lists replace entirely; scalars are taken
/// from the overlay. Values of different shapes do not merge.
///
/// # Errors
///
/// Returns `ResolveError::Merge` when the two sides have incompatible
/// shapes at any depth.
pub fn deep_merge(base: JsonValue, overlay: JsonValue, path: &str) -> Result<JsonValue, ResolveError> {
    match (base, overlay) {
        (JsonValue::Object(mut base), JsonValue::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => {
                        let child_path = if path.is_empty() {
                            key.clone()
                        } else {
                            format!("{path}.{key}")
                        };
                        deep_merge(existing, value, &child_path)?
                    }
                    None => value,
                };
                base.insert(key, merged);
            }
            Ok(JsonValue::Object(base))
        }
        (JsonValue::Array(_), overlay @ JsonValue::Array(_)) => Ok(overlay),
        (base, overlay) if is_scalar(&base) && is_scalar(&overlay) => Ok(overlay),
        (base, overlay) => Err(ResolveError::Merge(format!(
            "cannot merge {} over {} at '{}'",
            shape(&overlay),
            shape(&base),
            if path.is_empty() { "root" } else { path },
        ))),
    }
}

fn is_scalar(value: &JsonValue) -> bool {
    !matches!(value, JsonValue::Object(_) | JsonValue::Array(_))
}

fn shape(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Object(_) => "mapping",
        JsonValue::Array(_) => "list",
        JsonValue::String(_) => "string",
        JsonValue::Number(_) => "number",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Null => "null",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_recursive_mapping_merge() {
        let base = json!({"request": {"url": "/a", "headers": {"H": "1"}, "timeout": 30}});
        let overlay = json!({"request": {"url": "/b", "headers": {"X": "2"}}});
        let merged = deep_merge(base, overlay, "").unwrap();
        assert_eq!(
            merged,
            json!({"request": {"url": "/b", "headers": {"H": "1", "X": "2"}, "timeout": 30}})
        );
    }

    #[test]
    fn test_lists_replace_entirely() {
        let merged = deep_merge(json!({"tags": [1, 2, 3]}), json!({"tags": [9]}), "").unwrap();
        assert_eq!(merged, json!({"tags": [9]}));
    }

    #[test]
    fn test_scalar_taken_from_overlay() {
        let merged = deep_merge(json!({"n": 1}), json!({"n": 2}), "").unwrap();
        assert_eq!(merged, json!({"n": 2}));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let err = deep_merge(json!({"a": {"b": 1}}), json!({"a": [1]}), "").unwrap_err();
        assert!(matches!(err, ResolveError::Merge(_)));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_disjoint_keys_commute() {
        let left = deep_merge(json!({"a": 1}), json!({"b": 2}), "").unwrap();
        let right = deep_merge(json!({"b": 2}), json!({"a": 1}), "").unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn test_associative_for_compatible_mappings() {
        let a = json!({"x": {"p": 1}});
        let b = json!({"x": {"q": 2}});
        let c = json!({"x": {"r": 3}});

        let left = deep_merge(
            deep_merge(a.clone(), b.clone(), "").unwrap(),
            c.clone(),
            "",
        )
        .unwrap();
        let right = deep_merge(a, deep_merge(b, c, "").unwrap(), "").unwrap();
        assert_eq!(left, right);
    }
}
