//! Path and JSON pointer plumbing for reference resolution.

use std::path::{Component, Path, PathBuf};

use super::ResolveError;

/// Validates and resolves a `$ref` file path.
///
/// The path is joined against the referring file's directory; the result
/// must stay under `root_path`, and the path may not begin with more than
/// `max_parent_traversal_depth` leading `..` segments.
///
/// # Errors
///
/// Returns `ResolveError::Path` on either violation.
pub fn validate_ref_path(
    ref_path: &str,
    base_dir: &Path,
    root_path: &Path,
    max_parent_traversal_depth: usize,
) -> Result<PathBuf, ResolveError> {
    let mut parent_traversals = 0;
    for component in Path::new(ref_path).components() {
        if component == Component::ParentDir {
            parent_traversals += 1;
        } else {
            break;
        }
    }
    if parent_traversals > max_parent_traversal_depth {
        return Err(ResolveError::Path(format!(
            "reference '{ref_path}' exceeds the parent traversal depth of {max_parent_traversal_depth}"
        )));
    }

    let joined = if Path::new(ref_path).is_absolute() {
        PathBuf::from(ref_path)
    } else {
        base_dir.join(ref_path)
    };
    let resolved = normalize(&joined);
    if !resolved.starts_with(normalize(root_path)) {
        return Err(ResolveError::Path(format!(
            "reference '{ref_path}' points outside the allowed directory tree"
        )));
    }
    Ok(resolved)
}

/// Lexically normalizes a path, folding `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Splits an RFC 6901 JSON pointer into unescaped segments.
///
/// # Errors
///
/// Returns `ResolveError::Pointer` if the pointer is non-empty and does not
/// start with `/`.
pub fn parse_json_pointer(pointer: &str) -> Result<Vec<String>, ResolveError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(ResolveError::Pointer(format!(
            "pointer '{pointer}' must start with '/'"
        )));
    };
    Ok(rest
        .split('/')
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Applies a parsed pointer to a document.
///
/// # Errors
///
/// Returns `ResolveError::Pointer` when a segment is missing or the value
/// at hand cannot be indexed.
pub fn navigate<'a>(
    document: &'a serde_json::Value,
    pointer: &str,
) -> Result<&'a serde_json::Value, ResolveError> {
    let mut current = document;
    for segment in parse_json_pointer(pointer)? {
        current = match current {
            serde_json::Value::Object(map) => map.get(&segment).ok_or_else(|| {
                ResolveError::Pointer(format!("key '{segment}' not found in pointer '{pointer}'"))
            })?,
            serde_json::Value::Array(items) => {
                let index: usize = segment.parse().map_err(|_| {
                    ResolveError::Pointer(format!(
                        "segment '{segment}' is not an array index in pointer '{pointer}'"
                    ))
                })?;
                items.get(index).ok_or_else(|| {
                    ResolveError::Pointer(format!(
                        "index {index} out of bounds in pointer '{pointer}'"
                    ))
                })?
            }
            _ => {
                return Err(ResolveError::Pointer(format!(
                    "cannot descend into a scalar at '{segment}' in pointer '{pointer}'"
                )))
            }
        };
    }
    Ok(current)
}
