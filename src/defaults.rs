//! Tasks with default options.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::extend::extend;
use crate::task::{Done, Task, TaskLike};

type ConfiguredFn = dyn Fn(&Value, Done, Vec<Value>) + Send + Sync;

/// A task body paired with an options object.
///
/// The body receives the options ahead of the completion handle and the
/// task arguments. [`Configured::options`] derives a copy whose options
/// are deep-extended with overrides, leaving the original untouched.
#[derive(Clone)]
pub struct Configured {
    name: Option<Arc<str>>,
    options: Arc<Value>,
    f: Arc<ConfiguredFn>,
}

impl Configured {
    /// Wrap `f`, which receives the current options on every call, with a
    /// copy of `defaults` as its options.
    pub fn new<F>(defaults: &Value, f: F) -> Self
    where
        F: Fn(&Value, Done, Vec<Value>) + Send + Sync + 'static,
    {
        Self {
            name: None,
            options: Arc::new(extend([defaults])),
            f: Arc::new(f),
        }
    }

    /// Name the produced tasks.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(Arc::from(name));
        self
    }

    /// Derive a copy with `overrides` deep-extended over the current options.
    pub fn options(&self, overrides: &Value) -> Self {
        Self {
            name: self.name.clone(),
            options: Arc::new(extend([self.options.as_ref(), overrides])),
            f: self.f.clone(),
        }
    }

    /// The options this body will receive.
    pub fn current(&self) -> &Value {
        &self.options
    }

    /// Produce a task that runs the body with the current options.
    pub fn task(&self) -> Task {
        let options = self.options.clone();
        let f = self.f.clone();
        let body = move |done: Done, args: Vec<Value>| f(&options, done, args);
        match &self.name {
            Some(name) => Task::named(name, body),
            None => Task::new(body),
        }
    }
}

impl fmt::Debug for Configured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configured")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

impl From<Configured> for TaskLike {
    fn from(configured: Configured) -> Self {
        TaskLike::Single(configured.task())
    }
}
