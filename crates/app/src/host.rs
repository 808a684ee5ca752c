//! Console host: fixture table, cancellation flag, and line-per-stage
//! reporting for CLI runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use relay_application::ports::{Host, HostError, MarkerScope};

/// Host implementation for the `relay` binary.
pub struct ConsoleHost {
    fixtures: HashMap<String, JsonValue>,
    cancel: Arc<AtomicBool>,
    failures: AtomicUsize,
}

impl ConsoleHost {
    /// Creates a console host with the given fixture table and a shared
    /// cancellation flag (set by the Ctrl-C watcher).
    pub fn new(fixtures: HashMap<String, JsonValue>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            fixtures,
            cancel,
            failures: AtomicUsize::new(0),
        }
    }

    /// Number of failures reported so far.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn key(stage: &str, iteration: Option<&str>) -> String {
        match iteration {
            Some(key) => format!("{stage} [{key}]"),
            None => stage.to_string(),
        }
    }
}

impl Host for ConsoleHost {
    fn fixture_value(&self, name: &str) -> Result<JsonValue, HostError> {
        self.fixtures
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::UnknownFixture(name.to_string()))
    }

    fn report_pass(&self, stage: &str, iteration: Option<&str>) {
        println!("  PASS  {}", Self::key(stage, iteration));
    }

    fn report_fail(&self, stage: &str, iteration: Option<&str>, error: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        println!("  FAIL  {}", Self::key(stage, iteration));
        for line in error.lines() {
            println!("        {line}");
        }
    }

    fn report_skip(&self, stage: &str, iteration: Option<&str>, reason: &str) {
        println!("  SKIP  {} ({reason})", Self::key(stage, iteration));
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn apply_markers(&self, _scope: MarkerScope, target: &str, markers: &[String]) {
        tracing::debug!(target = target, markers = markers.join(","), "markers");
    }
}
