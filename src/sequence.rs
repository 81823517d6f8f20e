//! Sequencing: chaining tasks so each one's results feed the next.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::debug;

use crate::task::{Done, Outcome, Task};

/// Run `tasks` one after another.
///
/// The first task receives `args`; every following task receives the
/// results of its predecessor. The first error skips all remaining tasks
/// and goes straight to `finish`. The last task reports to `finish`
/// directly, so its outcome (error included) arrives unchanged. With no
/// tasks, `finish` receives `args` right away.
pub fn sequence(tasks: Vec<Task>, args: Vec<Value>, finish: Done) {
    let finish = Finish::new(finish);
    let total = tasks.len();

    // Continuations are built from the last task back to the first; each
    // one owns the continuation of the task after it.
    let mut next = finish.done();
    for (index, task) in tasks.into_iter().enumerate().rev() {
        let finish = finish.clone();
        let after = next;
        next = Done::new(move |outcome| match outcome {
            Ok(values) => task.call(after, values),
            Err(err) => {
                debug!(index, total, error = %err, "Short-circuiting pipeline");
                finish.complete(Err(err));
            }
        });
    }

    next.ok(args);
}

/// Shared handle to the final callback, taken by whichever path finishes
/// the chain.
#[derive(Clone)]
struct Finish(Arc<Mutex<Option<Done>>>);

impl Finish {
    fn new(done: Done) -> Self {
        Self(Arc::new(Mutex::new(Some(done))))
    }

    fn done(&self) -> Done {
        let finish = self.clone();
        Done::new(move |outcome| finish.complete(outcome))
    }

    fn complete(&self, outcome: Outcome) {
        let done = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(done) = done {
            done.finish(outcome);
        }
    }
}
