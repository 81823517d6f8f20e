//! Pipeline builder and executor.

use std::future::Future;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{CombineError, TaskError};
use crate::normalize::normalize;
use crate::recorder::{NoopRecorder, Recorder, RunId, RunStatus, StepStatus};
use crate::sequence::sequence;
use crate::task::{Done, Outcome, Task, TaskLike};

/// Combine task-like items into a pipeline and run it.
///
/// Each item is normalized (groups become single fan-out tasks), then the
/// items run in order, each receiving the previous item's results.
/// `callback` is invoked exactly once with the last item's outcome or the
/// first error. Invalid items are rejected before any task runs.
pub fn combine<I, F>(items: I, callback: F) -> Result<(), CombineError>
where
    I: IntoIterator,
    I::Item: Into<TaskLike>,
    F: FnOnce(Outcome) + Send + 'static,
{
    let tasks = items
        .into_iter()
        .map(|item| normalize(item.into()))
        .collect::<Result<Vec<_>, _>>()?;

    sequence(tasks, Vec::new(), Done::new(callback));
    Ok(())
}

/// Like [`combine`], but returns a future resolving to the final outcome.
///
/// The pipeline starts immediately. If the chain's completion is dropped
/// without being invoked, the future resolves to [`TaskError::Abandoned`].
pub fn combine_async<I>(items: I) -> Result<impl Future<Output = Outcome>, CombineError>
where
    I: IntoIterator,
    I::Item: Into<TaskLike>,
{
    let (tx, rx) = oneshot::channel();
    combine(items, move |outcome| {
        let _ = tx.send(outcome);
    })?;
    Ok(async move { rx.await.unwrap_or(Err(TaskError::Abandoned)) })
}

/// Serializable representation of a pipeline's structure.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineGraph {
    pub name: String,
    pub steps: Vec<StepNode>,
}

/// A top-level step in the pipeline graph.
#[derive(Debug, Clone, Serialize)]
pub struct StepNode {
    pub name: String,
    pub index: usize,
    pub node: Node,
}

/// Structure of a step: a task, or a group of nested nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Task { name: Option<String> },
    List { members: Vec<Node> },
    Map {
        #[serde(serialize_with = "entries")]
        members: Vec<(String, Node)>,
    },
    Skip,
}

/// Map members serialize as an object, in member order.
fn entries<S: Serializer>(members: &[(String, Node)], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(members.iter().map(|(key, node)| (key, node)))
}

impl Node {
    fn describe(item: &TaskLike) -> Self {
        match item {
            TaskLike::Single(task) => Node::Task {
                name: task.name().map(str::to_string),
            },
            TaskLike::Sequence(items) => Node::List {
                members: items.iter().map(Node::describe).collect(),
            },
            TaskLike::Group(entries) => Node::Map {
                members: entries
                    .iter()
                    .map(|(key, item)| (key.clone(), Node::describe(item)))
                    .collect(),
            },
            // Values only describe invalid or skipped entries; build()
            // rejects the invalid ones.
            TaskLike::Skip | TaskLike::Value(_) => Node::Skip,
        }
    }

    /// Label used when recording this step.
    fn label(&self, index: usize) -> String {
        match self {
            Node::Task { name: Some(name) } => name.clone(),
            Node::Task { name: None } => format!("step_{index}"),
            Node::List { members } => format!("list[{}]", members.len()),
            Node::Map { members } => {
                let keys: Vec<&str> = members.iter().map(|(key, _)| key.as_str()).collect();
                format!("map{{{}}}", keys.join(","))
            }
            Node::Skip => "skip".to_string(),
        }
    }
}

/// Builder for constructing pipelines.
pub struct Pipeline {
    name: String,
    items: Vec<TaskLike>,
    recorder: Arc<dyn Recorder>,
}

impl Pipeline {
    /// Create a new pipeline builder with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            recorder: Arc::new(NoopRecorder),
        }
    }

    /// Add a step: a task, or a list or map group.
    pub fn then(mut self, item: impl Into<TaskLike>) -> Self {
        self.items.push(item.into());
        self
    }

    /// Set the recorder for this pipeline.
    pub fn with_recorder<R: Recorder + 'static>(mut self, recorder: R) -> Self {
        self.recorder = Arc::new(recorder);
        self
    }

    /// Normalize every step, ready for execution.
    pub fn build(self) -> Result<BuiltPipeline, CombineError> {
        let mut steps = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.into_iter().enumerate() {
            let node = Node::describe(&item);
            let label: Arc<str> = Arc::from(node.label(index));
            steps.push(BuiltStep {
                task: normalize(item)?,
                label,
                node,
            });
        }

        Ok(BuiltPipeline {
            name: self.name,
            steps,
            recorder: self.recorder,
        })
    }
}

struct BuiltStep {
    task: Task,
    label: Arc<str>,
    node: Node,
}

/// A built pipeline ready for execution.
///
/// Every run builds its own continuation chain and group state, so runs
/// never share in-flight data.
pub struct BuiltPipeline {
    name: String,
    steps: Vec<BuiltStep>,
    recorder: Arc<dyn Recorder>,
}

impl BuiltPipeline {
    /// Run the pipeline, reporting the final outcome to `callback`.
    pub fn run<F>(&self, callback: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.run_with(Vec::new(), callback)
    }

    /// Run the pipeline with initial arguments for the first step.
    pub fn run_with<F>(&self, args: Vec<Value>, callback: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let run_id = self.recorder.start_run(&self.name);

        let tasks = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| self.instrument(step, index, run_id))
            .collect();

        let recorder = self.recorder.clone();
        let finish = Done::new(move |outcome: Outcome| {
            let status = match &outcome {
                Ok(_) => RunStatus::Completed,
                Err(err) => RunStatus::Failed {
                    error: err.to_string(),
                },
            };
            recorder.complete_run(run_id, &status);
            callback(outcome);
        });

        sequence(tasks, args, finish);
    }

    /// Run the pipeline and wait for its outcome.
    pub async fn run_async(&self) -> Outcome {
        let (tx, rx) = oneshot::channel();
        self.run(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.unwrap_or(Err(TaskError::Abandoned))
    }

    /// Get the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of top-level steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Export the pipeline structure as a graph.
    pub fn to_graph(&self) -> PipelineGraph {
        PipelineGraph {
            name: self.name.clone(),
            steps: self
                .steps
                .iter()
                .enumerate()
                .map(|(index, step)| StepNode {
                    name: step.label.to_string(),
                    index,
                    node: step.node.clone(),
                })
                .collect(),
        }
    }

    fn instrument(&self, step: &BuiltStep, index: usize, run_id: RunId) -> Task {
        let task = step.task.clone();
        let label = step.label.clone();
        let recorder = self.recorder.clone();

        Task::named(&step.label, move |done, args| {
            recorder.start_step(run_id, &label, index);

            let recorder = recorder.clone();
            let label = label.clone();
            task.call(
                Done::new(move |outcome| {
                    let status = match &outcome {
                        Ok(_) => StepStatus::Completed,
                        Err(err) => StepStatus::Failed {
                            error: err.to_string(),
                        },
                    };
                    recorder.complete_step(run_id, &label, index, &status);
                    done.finish(outcome);
                }),
                args,
            );
        })
    }
}
