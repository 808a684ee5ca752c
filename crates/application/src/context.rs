//! Layered name resolution context.
//!
//! The context is a stack of frames. Lookup walks from the most recently
//! pushed frame downwards, so later layers shadow earlier ones. Frames are
//! shared by reference; `snapshot()` is O(1) and writes after a snapshot
//! copy only the written frame.
//!
//! Layer order during stage execution, highest priority first: iteration
//! variables, current-stage saves, stage substitutions, stage fixtures,
//! global saves from prior stages, scenario substitutions.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors raised by context writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The name is provided by a fixture; fixtures are immutable within a
    /// scenario.
    #[error("'{0}' is provided by a fixture and cannot be overwritten")]
    FixtureShadow(String),

    /// No writable layer is on the stack.
    #[error("context has no mutable layer")]
    NoMutableLayer,
}

/// What a frame holds; fixture frames additionally protect their names from
/// being redefined by writes anywhere in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Scenario-level substitutions (read-only).
    ScenarioSubstitutions,
    /// Saves accumulated from prior stages.
    GlobalSaves,
    /// Host-provided fixture values (read-only, protected).
    Fixtures,
    /// Stage-level substitutions.
    StageSubstitutions,
    /// Values saved by the current stage's save steps.
    StageSaves,
    /// Parametrize / parallel iteration variables (read-only).
    Iteration,
}

impl FrameKind {
    const fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::ScenarioSubstitutions | Self::Fixtures | Self::Iteration
        )
    }
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    values: Arc<IndexMap<String, JsonValue>>,
}

/// A stacked name→value environment.
#[derive(Debug, Clone, Default)]
pub struct LayeredContext {
    frames: Vec<Frame>,
}

impl LayeredContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a frame on top of the stack.
    pub fn push(&mut self, kind: FrameKind, values: IndexMap<String, JsonValue>) {
        self.frames.push(Frame {
            kind,
            values: Arc::new(values),
        });
    }

    /// Pops the top frame, returning its values.
    pub fn pop(&mut self) -> Option<IndexMap<String, JsonValue>> {
        self.frames
            .pop()
            .map(|frame| Arc::try_unwrap(frame.values).unwrap_or_else(|arc| (*arc).clone()))
    }

    /// Looks a name up, highest-priority layer first.
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.values.get(name))
    }

    /// Returns true if any layer defines the name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Writes a binding into the topmost mutable layer.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::FixtureShadow` if a fixture layer defines the
    /// name, or `ContextError::NoMutableLayer` if every layer is read-only.
    pub fn set(&mut self, name: impl Into<String>, value: JsonValue) -> Result<(), ContextError> {
        let name = name.into();
        if self
            .frames
            .iter()
            .any(|f| f.kind == FrameKind::Fixtures && f.values.contains_key(&name))
        {
            return Err(ContextError::FixtureShadow(name));
        }

        let frame = self
            .frames
            .iter_mut()
            .rev()
            .find(|f| !f.kind.is_read_only())
            .ok_or(ContextError::NoMutableLayer)?;
        Arc::make_mut(&mut frame.values).insert(name, value);
        Ok(())
    }

    /// Merges a whole map into the topmost mutable layer, in map order.
    ///
    /// # Errors
    ///
    /// Same conditions as [`set`](Self::set); the merge stops at the first
    /// rejected name.
    pub fn set_all(&mut self, values: IndexMap<String, JsonValue>) -> Result<(), ContextError> {
        for (name, value) in values {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// Merges bindings directly into the lowest frame of the given kind,
    /// regardless of stack position. Used by the runner to promote stage
    /// saves into the global layer.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::NoMutableLayer` if no such frame exists, or
    /// `ContextError::FixtureShadow` if a binding collides with a fixture.
    pub fn merge_into(
        &mut self,
        kind: FrameKind,
        values: IndexMap<String, JsonValue>,
    ) -> Result<(), ContextError> {
        for name in values.keys() {
            if self
                .frames
                .iter()
                .any(|f| f.kind == FrameKind::Fixtures && f.values.contains_key(name))
            {
                return Err(ContextError::FixtureShadow(name.clone()));
            }
        }
        let frame = self
            .frames
            .iter_mut()
            .find(|f| f.kind == kind)
            .ok_or(ContextError::NoMutableLayer)?;
        let map = Arc::make_mut(&mut frame.values);
        for (name, value) in values {
            map.insert(name, value);
        }
        Ok(())
    }

    /// O(1) copy for branching into a parallel iteration. Frames are shared;
    /// subsequent writes copy only the frame they touch.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Flattens the visible bindings into one map (used for reporting).
    pub fn flatten(&self) -> IndexMap<String, JsonValue> {
        let mut flat = IndexMap::new();
        for frame in &self.frames {
            for (k, v) in frame.values.iter() {
                flat.insert(k.clone(), v.clone());
            }
        }
        flat
    }
}
