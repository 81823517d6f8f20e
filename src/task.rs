//! Tasks, completion handles and task-like composition items.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;

/// Outcome a task reports: its positional results, or an error.
pub type Outcome = Result<Vec<Value>, TaskError>;

type TaskFn = dyn Fn(Done, Vec<Value>) + Send + Sync;

/// Single-use completion handle passed to every task.
///
/// Consuming the handle reports the task's outcome exactly once.
pub struct Done(Box<dyn FnOnce(Outcome) + Send>);

impl Done {
    /// Wrap a continuation.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Report an outcome.
    pub fn finish(self, outcome: Outcome) {
        (self.0)(outcome)
    }

    /// Report success with the given results.
    pub fn ok(self, values: Vec<Value>) {
        self.finish(Ok(values))
    }

    /// Report a failure.
    pub fn err(self, err: TaskError) {
        self.finish(Err(err))
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Done")
    }
}

/// A unit of asynchronous work.
///
/// A task receives its completion handle and its positional arguments. It
/// may complete synchronously or hand the handle to background work.
#[derive(Clone)]
pub struct Task {
    name: Option<Arc<str>>,
    f: Arc<TaskFn>,
}

impl Task {
    /// Create an anonymous task.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Done, Vec<Value>) + Send + Sync + 'static,
    {
        Self {
            name: None,
            f: Arc::new(f),
        }
    }

    /// Create a task with a name used for logging and recording.
    pub fn named<F>(name: &str, f: F) -> Self
    where
        F: Fn(Done, Vec<Value>) + Send + Sync + 'static,
    {
        Self {
            name: Some(Arc::from(name)),
            f: Arc::new(f),
        }
    }

    /// Adapt an async [`Step`] into a task running on the current tokio runtime.
    pub fn from_step<S: Step>(step: S) -> Self {
        let step = Arc::new(step);
        let name = step.name();
        Self::named(name, move |done, args| {
            let step = step.clone();
            spawn_completion(name, done, async move { step.execute(args).await });
        })
    }

    /// Adapt an async closure into a task running on the current tokio runtime.
    pub fn from_async<F, Fut>(name: &str, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let label: Arc<str> = Arc::from(name);
        Self {
            name: Some(label.clone()),
            f: Arc::new(move |done: Done, args: Vec<Value>| {
                spawn_completion(&label, done, f(args))
            }),
        }
    }

    /// Name of this task, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Invoke the task.
    pub fn call(&self, done: Done, args: Vec<Value>) {
        (self.f)(done, args)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

fn spawn_completion<Fut>(name: &str, done: Done, fut: Fut)
where
    Fut: Future<Output = Outcome> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { done.finish(fut.await) });
        }
        Err(_) => done.err(TaskError::msg(format!(
            "no tokio runtime available for async task '{name}'"
        ))),
    }
}

/// An async unit of work that can be lifted into a [`Task`].
#[async_trait]
pub trait Step: Send + Sync + 'static {
    /// The name of this step for logging and recording.
    fn name(&self) -> &'static str;

    /// Execute the step with the given positional arguments.
    async fn execute(&self, args: Vec<Value>) -> Outcome;
}

/// Anything that can take the place of a task in a composition.
#[derive(Debug, Clone)]
pub enum TaskLike {
    /// A task.
    Single(Task),
    /// List group: members run concurrently, results form a list.
    Sequence(Vec<TaskLike>),
    /// Map group: members run concurrently, results form a map. Members
    /// start in the order the entries are listed.
    Group(Vec<(String, TaskLike)>),
    /// A missing entry. Skipped inside groups.
    Skip,
    /// A plain value where a task was expected. Always rejected.
    Value(Value),
}

impl TaskLike {
    /// Build a list group.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskLike>,
    {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Build a map group, keeping the order of `entries`.
    ///
    /// A repeated key replaces the earlier entry in place.
    pub fn map<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<TaskLike>,
    {
        let mut group: Vec<(String, TaskLike)> = Vec::new();
        for (key, item) in entries {
            let key = key.into();
            let item = item.into();
            match group.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = item,
                None => group.push((key, item)),
            }
        }
        Self::Group(group)
    }
}

impl From<Task> for TaskLike {
    fn from(task: Task) -> Self {
        Self::Single(task)
    }
}

impl From<Option<Task>> for TaskLike {
    fn from(task: Option<Task>) -> Self {
        task.map_or(Self::Skip, Self::Single)
    }
}

impl<T: Into<TaskLike>> From<Vec<T>> for TaskLike {
    fn from(items: Vec<T>) -> Self {
        Self::list(items)
    }
}

impl<T: Into<TaskLike>, const N: usize> From<[T; N]> for TaskLike {
    fn from(items: [T; N]) -> Self {
        Self::list(items)
    }
}

impl<K: Into<String>, T: Into<TaskLike>> From<BTreeMap<K, T>> for TaskLike {
    fn from(entries: BTreeMap<K, T>) -> Self {
        Self::map(entries)
    }
}

impl From<Value> for TaskLike {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}
