//! Fan-out normalization: turning task groups into single tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::trace;

use crate::aggregate::{Shape, Slots};
use crate::error::{CombineError, TaskError};
use crate::task::{Done, Outcome, Task, TaskLike};

/// Normalize a task-like item into a single task.
///
/// A task is returned unchanged. A list or map group becomes a task that
/// starts every member with the same arguments and completes once all of
/// them have reported, with results (and errors, if any) in the group's
/// shape. Nested groups are normalized recursively, so an invalid entry
/// at any depth is rejected here, before anything runs.
pub fn normalize(item: TaskLike) -> Result<Task, CombineError> {
    match item {
        TaskLike::Single(task) => Ok(task),
        TaskLike::Sequence(items) => {
            let members = items
                .into_iter()
                .map(|item| {
                    if is_missing(&item) {
                        Ok(None)
                    } else {
                        normalize(item).map(Some)
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(fan_out(Shape::List(members.len()), members))
        }
        TaskLike::Group(entries) => {
            let mut keys = Vec::with_capacity(entries.len());
            let mut members = Vec::with_capacity(entries.len());
            for (key, item) in entries {
                if is_missing(&item) {
                    continue;
                }
                let member = Some(normalize(item)?);
                match keys.iter().position(|existing| *existing == key) {
                    Some(index) => members[index] = member,
                    None => {
                        keys.push(key);
                        members.push(member);
                    }
                }
            }
            Ok(fan_out(Shape::Map(keys), members))
        }
        TaskLike::Skip => Err(CombineError::invalid(&Value::Null)),
        TaskLike::Value(value) => Err(CombineError::invalid(&value)),
    }
}

/// Entries that groups skip instead of rejecting: absent entries and falsy
/// plain values.
fn is_missing(item: &TaskLike) -> bool {
    match item {
        TaskLike::Skip => true,
        TaskLike::Value(value) => match value {
            Value::Null => true,
            Value::Bool(flag) => !flag,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(_) | Value::Object(_) => false,
        },
        _ => false,
    }
}

/// Per-invocation aggregation context of a group.
struct GroupState {
    shape: Arc<Shape>,
    remaining: AtomicUsize,
    inner: Mutex<GroupInner>,
}

struct GroupInner {
    slots: Slots,
    done: Option<Done>,
}

impl GroupState {
    fn complete(&self, slot: usize, outcome: Outcome) {
        lock(&self.inner).slots.record(slot, outcome);

        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        let (slots, done) = {
            let mut inner = lock(&self.inner);
            let slots = std::mem::replace(&mut inner.slots, Slots::new(0));
            (slots, inner.done.take())
        };

        trace!(width = self.shape.width(), "group complete");
        if let Some(done) = done {
            done.finish(wrap(slots.finish(&self.shape)));
        }
    }
}

fn fan_out(shape: Shape, members: Vec<Option<Task>>) -> Task {
    let shape = Arc::new(shape);
    let members: Arc<[Option<Task>]> = members.into();

    Task::new(move |done, args| {
        let pending = members.iter().flatten().count();
        trace!(width = shape.width(), pending, "group dispatch");

        if pending == 0 {
            return done.finish(wrap(Slots::new(shape.width()).finish(&shape)));
        }

        // Every member is counted before the first one starts, so a member
        // completing synchronously cannot finish the group early.
        let group = Arc::new(GroupState {
            shape: shape.clone(),
            remaining: AtomicUsize::new(pending),
            inner: Mutex::new(GroupInner {
                slots: Slots::new(shape.width()),
                done: Some(done),
            }),
        });

        for (slot, member) in members.iter().enumerate() {
            let Some(member) = member else { continue };
            let group = group.clone();
            member.call(
                Done::new(move |outcome| group.complete(slot, outcome)),
                args.clone(),
            );
        }
    })
}

fn wrap(aggregate: Result<Value, TaskError>) -> Outcome {
    aggregate.map(|value| vec![value])
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
