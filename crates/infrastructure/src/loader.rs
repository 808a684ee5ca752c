//! Scenario loading and discovery.
//!
//! Scenario files are named `test_<name>.<suffix>.json` (suffix `http` by
//! default). Loading resolves every `$ref` and validates the document into
//! the typed model; any failure aborts the scenario.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use relay_domain::{EngineConfig, Scenario, ValidationError};

use crate::resolver::{ReferenceResolver, ResolveError};

/// Fatal errors at scenario load time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    /// Reference resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The resolved document does not fit the scenario model.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A discovered scenario file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFile {
    /// Path to the file.
    pub path: PathBuf,
    /// The `<name>` captured from `test_<name>.<suffix>.json`.
    pub name: String,
}

/// Loads a scenario file: resolve references, then validate the model.
///
/// `root_path` bounds all file references; when `None`, the scenario's own
/// directory is the root.
///
/// # Errors
///
/// Returns [`LoadError`] on resolution or validation failure.
pub fn load_scenario(
    path: &Path,
    config: &EngineConfig,
    root_path: Option<&Path>,
) -> Result<Scenario, LoadError> {
    let mut resolver = ReferenceResolver::new(config.ref_parent_traversal_depth);
    if let Some(root) = root_path {
        resolver = resolver.with_root(root);
    }
    let document = resolver.resolve_file(path)?;
    let scenario = Scenario::from_document(document)?;
    debug!(path = %path.display(), stages = scenario.stages.len(), "scenario loaded");
    Ok(scenario)
}

/// Extracts the scenario name from a file name matching
/// `test_<name>.<suffix>.json`.
pub fn scenario_name(file_name: &str, suffix: &str) -> Option<String> {
    let rest = file_name.strip_prefix("test_")?;
    let rest = rest.strip_suffix(".json")?;
    let name = rest.strip_suffix(suffix)?.strip_suffix('.')?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Recursively discovers scenario files under `dir`, in deterministic
/// lexicographic order.
///
/// # Errors
///
/// Returns the underlying I/O error if a directory cannot be read.
pub fn discover(dir: &Path, suffix: &str) -> std::io::Result<Vec<ScenarioFile>> {
    let mut found = Vec::new();
    walk(dir, suffix, &mut found)?;
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

fn walk(dir: &Path, suffix: &str, found: &mut Vec<ScenarioFile>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, suffix, found)?;
        } else if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(name) = scenario_name(file_name, suffix) {
                found.push(ScenarioFile { path, name });
            }
        }
    }
    Ok(())
}
