//! # Flowchain
//!
//! Compose callback-style async tasks into sequential and fan-out pipelines.
//!
//! A task receives a single-use completion handle ([`Done`]) and its
//! positional arguments, and reports either its results or an error.
//! Tasks, lists of tasks and maps of tasks can be chained:
//!
//! - each step receives the results of the step before it,
//! - a list or map step starts all of its members with the same arguments
//!   and hands on one aggregate in the same shape (list or map),
//! - the first error skips every remaining step.
//!
//! ## Quick Start
//!
//! ```rust
//! use flowchain::{combine, tasks, Task, TaskLike};
//! use serde_json::json;
//!
//! let fetch = Task::named("fetch", |done, _| done.ok(vec![json!(1)]));
//! let double = Task::new(|done, args| {
//!     let n = args[0].as_i64().unwrap_or_default();
//!     done.ok(vec![json!(n * 2)]);
//! });
//! let square = Task::new(|done, args| {
//!     let n = args[0].as_i64().unwrap_or_default();
//!     done.ok(vec![json!(n * n)]);
//! });
//!
//! combine(
//!     tasks![fetch, TaskLike::map([("double", double), ("square", square)])],
//!     |outcome| {
//!         assert_eq!(outcome.unwrap(), vec![json!({ "double": 2, "square": 1 })]);
//!     },
//! )
//! .unwrap();
//! ```
//!
//! ## Pipelines
//!
//! [`Pipeline`] builds a reusable, named pipeline with an optional
//! [`Recorder`] observing every step:
//!
//! ```rust,ignore
//! let pipeline = Pipeline::new("ingest")
//!     .then(Task::from_step(Download))
//!     .then([parse_a, parse_b])
//!     .with_recorder(TracingRecorder::new())
//!     .build()?;
//!
//! let outcome = pipeline.run_async().await;
//! ```

pub mod aggregate;
pub mod defaults;
pub mod error;
pub mod extend;
pub mod normalize;
pub mod pipeline;
pub mod recorder;
pub mod sequence;
pub mod task;

pub use aggregate::GroupErrors;
pub use defaults::Configured;
pub use error::{CombineError, GroupFailure, TaskError};
pub use extend::{extend, ExtendOptions};
pub use normalize::normalize;
pub use pipeline::{
    combine, combine_async, BuiltPipeline, Node, Pipeline, PipelineGraph, StepNode,
};
pub use recorder::{NoopRecorder, Recorder, RunId, RunStatus, StepStatus, TracingRecorder};
pub use sequence::sequence;
pub use task::{Done, Outcome, Step, Task, TaskLike};

/// Build a `Vec<TaskLike>` from heterogeneous task-like items.
///
/// ```rust
/// # use flowchain::{tasks, Task, TaskLike};
/// let a = Task::new(|done, _| done.ok(vec![]));
/// let b = Task::new(|done, _| done.ok(vec![]));
/// let items: Vec<TaskLike> = tasks![a.clone(), [a, b]];
/// assert_eq!(items.len(), 2);
/// ```
#[macro_export]
macro_rules! tasks {
    ($($item:expr),* $(,)?) => {
        ::std::vec![$($crate::TaskLike::from($item)),*]
    };
}
