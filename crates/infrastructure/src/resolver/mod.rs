//! `$ref` reference resolution.
//!
//! A `$ref` value has the form `[file_path][#json_pointer]`. File paths
//! resolve relative to the referring file, constrained to the root path and
//! a parent-traversal limit. Sibling keys deep-merge over the referenced
//! value. Resolution is bottom-up, so merges always see concrete values,
//! and a stack of `(file, pointer)` frames catches reference cycles.

mod merge;
mod path;

use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use thiserror::Error;

pub use merge::deep_merge;
pub use path::{navigate, normalize, parse_json_pointer, validate_ref_path};

/// Errors during reference resolution. All are fatal for the scenario.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A `$ref` file path violates the root or traversal constraints.
    #[error("path error: {0}")]
    Path(String),

    /// A JSON pointer is malformed or does not resolve.
    #[error("pointer error: {0}")]
    Pointer(String),

    /// Sibling keys cannot merge over the referenced value.
    #[error("merge error: {0}")]
    Merge(String),

    /// A reference re-enters a frame still being resolved.
    #[error("circular reference: {0}")]
    Cycle(String),

    /// A `$ref` value is not a string.
    #[error("malformed $ref: {0}")]
    Malformed(String),

    /// A referenced file could not be read.
    #[error("cannot read '{path}': {message}")]
    Io { path: PathBuf, message: String },

    /// A referenced file is not valid JSON.
    #[error("'{path}' is not valid JSON: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Resolves `$ref` directives in scenario documents.
#[derive(Debug)]
pub struct ReferenceResolver {
    max_parent_traversal_depth: usize,
    root_path: Option<PathBuf>,
    active: Vec<(PathBuf, String)>,
}

impl ReferenceResolver {
    /// Creates a resolver with the given parent-traversal limit.
    pub fn new(max_parent_traversal_depth: usize) -> Self {
        Self {
            max_parent_traversal_depth,
            root_path: None,
            active: Vec::new(),
        }
    }

    /// Constrains all file references to the given root. Without this, the
    /// first resolved file's directory becomes the root.
    #[must_use]
    pub fn with_root(mut self, root_path: impl Into<PathBuf>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    /// Loads a JSON file and resolves every reference in it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] on I/O, parse, path, pointer, merge, or
    /// cycle failures.
    pub fn resolve_file(&mut self, file: &Path) -> Result<JsonValue, ResolveError> {
        let file = path::normalize(file);
        let document = read_json(&file)?;
        let dir = file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        if self.root_path.is_none() {
            self.root_path = Some(dir.clone());
        }
        self.resolve_in_file(document.clone(), &file, &dir, &document)
    }

    /// Resolves references in an already parsed document.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`resolve_file`](Self::resolve_file).
    pub fn resolve_document(
        &mut self,
        document: JsonValue,
        base_dir: &Path,
    ) -> Result<JsonValue, ResolveError> {
        if self.root_path.is_none() {
            self.root_path = Some(base_dir.to_path_buf());
        }
        let pseudo_file = base_dir.join("<document>");
        self.resolve_in_file(document.clone(), &pseudo_file, base_dir, &document)
    }

    fn resolve_in_file(
        &mut self,
        value: JsonValue,
        file: &Path,
        dir: &Path,
        root_doc: &JsonValue,
    ) -> Result<JsonValue, ResolveError> {
        match value {
            JsonValue::Object(map) if map.contains_key("$ref") => {
                self.resolve_ref(map, file, dir, root_doc)
            }
            JsonValue::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key, self.resolve_in_file(item, file, dir, root_doc)?);
                }
                Ok(JsonValue::Object(out))
            }
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_in_file(item, file, dir, root_doc)?);
                }
                Ok(JsonValue::Array(out))
            }
            other => Ok(other),
        }
    }

    fn resolve_ref(
        &mut self,
        mut map: serde_json::Map<String, JsonValue>,
        file: &Path,
        dir: &Path,
        root_doc: &JsonValue,
    ) -> Result<JsonValue, ResolveError> {
        let ref_value = map.remove("$ref").expect("checked by caller");
        let JsonValue::String(reference) = ref_value else {
            return Err(ResolveError::Malformed(format!(
                "$ref must be a string, got {ref_value}"
            )));
        };

        let (file_part, pointer) = match reference.split_once('#') {
            Some((file_part, pointer)) => (file_part, pointer),
            None => (reference.as_str(), ""),
        };

        let referenced = if file_part.is_empty() {
            self.resolve_internal(pointer, file, dir, root_doc)?
        } else {
            self.resolve_external(file_part, pointer, dir)?
        };

        if map.is_empty() {
            return Ok(referenced);
        }

        let mut siblings = serde_json::Map::with_capacity(map.len());
        for (key, item) in map {
            siblings.insert(key, self.resolve_in_file(item, file, dir, root_doc)?);
        }
        deep_merge(referenced, JsonValue::Object(siblings), "")
    }

    fn resolve_internal(
        &mut self,
        pointer: &str,
        file: &Path,
        dir: &Path,
        root_doc: &JsonValue,
    ) -> Result<JsonValue, ResolveError> {
        let frame = (file.to_path_buf(), pointer.to_string());
        self.enter(frame.clone())?;
        let result = (|| {
            let target = navigate(root_doc, pointer)?.clone();
            self.resolve_in_file(target, file, dir, root_doc)
        })();
        self.leave(&frame);
        result
    }

    fn resolve_external(
        &mut self,
        file_part: &str,
        pointer: &str,
        dir: &Path,
    ) -> Result<JsonValue, ResolveError> {
        let root = self
            .root_path
            .clone()
            .unwrap_or_else(|| dir.to_path_buf());
        let resolved_path = validate_ref_path(
            file_part,
            dir,
            &root,
            self.max_parent_traversal_depth,
        )?;

        let frame = (resolved_path.clone(), pointer.to_string());
        self.enter(frame.clone())?;
        let result = (|| {
            let external_doc = read_json(&resolved_path)?;
            let target = navigate(&external_doc, pointer)?.clone();
            let external_dir = resolved_path
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            self.resolve_in_file(target, &resolved_path, &external_dir, &external_doc)
        })();
        self.leave(&frame);
        result
    }

    fn enter(&mut self, frame: (PathBuf, String)) -> Result<(), ResolveError> {
        if self.active.contains(&frame) {
            return Err(ResolveError::Cycle(format!(
                "'{}#{}' is already being resolved",
                frame.0.display(),
                frame.1
            )));
        }
        self.active.push(frame);
        Ok(())
    }

    fn leave(&mut self, frame: &(PathBuf, String)) {
        if let Some(position) = self.active.iter().rposition(|f| f == frame) {
            self.active.remove(position);
        }
    }
}

fn read_json(path: &Path) -> Result<JsonValue, ResolveError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ResolveError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ResolveError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
