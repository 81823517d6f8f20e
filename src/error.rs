//! Error types for combining and running tasks.

use serde_json::Value;
use thiserror::Error;

use crate::aggregate::GroupErrors;

/// Error raised while assembling a pipeline, before any task runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CombineError {
    /// A plain value was supplied where a task or task group was expected.
    #[error("invalid argument kind: expected a task, list or map, got {kind}")]
    InvalidArgumentKind {
        /// Kind of the offending value (`"number"`, `"string"`, ...).
        kind: &'static str,
    },
}

impl CombineError {
    pub(crate) fn invalid(value: &Value) -> Self {
        Self::InvalidArgumentKind {
            kind: kind_of(value),
        }
    }
}

/// Names the kind of a plain value the way it is reported in errors.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Error reported by a task through its completion handle.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A task failed. The payload is opaque and propagated verbatim.
    #[error("{0}")]
    Failed(#[source] anyhow::Error),

    /// One or more members of a fan-out group failed.
    #[error("{} of {} group members failed", .0.errors.failed(), .0.members())]
    Group(GroupFailure),

    /// A completion handle was dropped without being invoked.
    #[error("task dropped its completion without reporting an outcome")]
    Abandoned,
}

impl TaskError {
    /// Wrap any error as an opaque task failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(err.into())
    }

    /// Create a task failure from a message.
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Failed(anyhow::Error::msg(message))
    }

    /// Returns the group failure if this error came from a fan-out group.
    pub fn as_group(&self) -> Option<&GroupFailure> {
        match self {
            Self::Group(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Outcome of a fan-out group in which at least one member failed.
///
/// Carries the shape-preserving error aggregate and the partial results of
/// the members that succeeded.
#[derive(Debug)]
pub struct GroupFailure {
    /// Errors, present only at the failed positions.
    pub errors: GroupErrors,
    /// Aggregate result with one slot per member (`Null` where absent).
    pub results: Value,
}

impl GroupFailure {
    /// Number of members in the failed group.
    pub fn members(&self) -> usize {
        match &self.results {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }
}
