//! Shape-preserving fan-in containers.
//!
//! A group collects one slot per member. Once every member has reported,
//! the slots are rendered back into the shape of the original group: a
//! list group yields a list, a map group yields a map.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{GroupFailure, TaskError};

/// Container kind of a fan-out group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Shape {
    /// List group with the given number of positions.
    List(usize),
    /// Map group; slot `i` belongs to `keys[i]`.
    Map(Vec<String>),
}

impl Shape {
    pub(crate) fn width(&self) -> usize {
        match self {
            Self::List(len) => *len,
            Self::Map(keys) => keys.len(),
        }
    }
}

/// Errors of a fan-out group, in the group's shape.
///
/// List form keeps the full group length with `None` at members that did
/// not fail. Map form holds only the keys of failed members.
#[derive(Debug)]
pub enum GroupErrors {
    List(Vec<Option<TaskError>>),
    Map(BTreeMap<String, TaskError>),
}

impl GroupErrors {
    /// Number of members that failed.
    pub fn failed(&self) -> usize {
        match self {
            Self::List(slots) => slots.iter().filter(|slot| slot.is_some()).count(),
            Self::Map(map) => map.len(),
        }
    }

    /// Number of positions covered by this aggregate.
    ///
    /// For the list form this is the group length; the map form only
    /// covers failed keys.
    pub fn width(&self) -> usize {
        match self {
            Self::List(slots) => slots.len(),
            Self::Map(map) => map.len(),
        }
    }

    /// Error recorded at a list position.
    pub fn at(&self, index: usize) -> Option<&TaskError> {
        match self {
            Self::List(slots) => slots.get(index).and_then(Option::as_ref),
            Self::Map(_) => None,
        }
    }

    /// Error recorded under a map key.
    pub fn get(&self, key: &str) -> Option<&TaskError> {
        match self {
            Self::List(_) => None,
            Self::Map(map) => map.get(key),
        }
    }

    /// Renders the errors as their messages, keeping the group's shape.
    ///
    /// Holes in the list form become `Null`.
    pub fn to_messages(&self) -> Value {
        match self {
            Self::List(slots) => Value::Array(
                slots
                    .iter()
                    .map(|slot| match slot {
                        Some(err) => Value::String(err.to_string()),
                        None => Value::Null,
                    })
                    .collect(),
            ),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(key, err)| (key.clone(), Value::String(err.to_string())))
                    .collect(),
            ),
        }
    }
}

/// Fixed-size slot storage for one group invocation.
#[derive(Debug)]
pub(crate) struct Slots {
    results: Vec<Option<Value>>,
    errors: Vec<Option<TaskError>>,
}

impl Slots {
    pub(crate) fn new(width: usize) -> Self {
        Self {
            results: std::iter::repeat_with(|| None).take(width).collect(),
            errors: std::iter::repeat_with(|| None).take(width).collect(),
        }
    }

    /// Records a member's outcome. Only the first result value is kept.
    pub(crate) fn record(&mut self, slot: usize, outcome: Result<Vec<Value>, TaskError>) {
        match outcome {
            Ok(values) => self.results[slot] = values.into_iter().next(),
            Err(err) => self.errors[slot] = Some(err),
        }
    }

    /// Renders the slots in the group's shape.
    ///
    /// Yields the aggregate result when no member failed, otherwise a
    /// [`TaskError::Group`] carrying both aggregates.
    pub(crate) fn finish(self, shape: &Shape) -> Result<Value, TaskError> {
        let Slots { results, errors } = self;
        let results = render_results(shape, results);

        if errors.iter().all(Option::is_none) {
            return Ok(results);
        }

        let errors = match shape {
            Shape::List(_) => GroupErrors::List(errors),
            Shape::Map(keys) => GroupErrors::Map(
                keys.iter()
                    .cloned()
                    .zip(errors)
                    .filter_map(|(key, err)| err.map(|err| (key, err)))
                    .collect(),
            ),
        };

        Err(TaskError::Group(GroupFailure { errors, results }))
    }
}

fn render_results(shape: &Shape, results: Vec<Option<Value>>) -> Value {
    match shape {
        Shape::List(_) => Value::Array(
            results
                .into_iter()
                .map(|slot| slot.unwrap_or(Value::Null))
                .collect(),
        ),
        Shape::Map(keys) => {
            let mut map = Map::new();
            for (key, slot) in keys.iter().zip(results) {
                map.insert(key.clone(), slot.unwrap_or(Value::Null));
            }
            Value::Object(map)
        }
    }
}
