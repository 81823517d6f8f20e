//! Tests for fan-out groups: shape preservation, argument passing and
//! error aggregation.

use flowchain::{combine_async, tasks, GroupErrors, Outcome, Task, TaskError, TaskLike};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn after<F>(millis: u64, f: F) -> Task
where
    F: Fn(Vec<Value>) -> Outcome + Send + Sync + 'static,
{
    Task::new(move |done, args| {
        let outcome = f(args);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            done.finish(outcome);
        });
    })
}

fn ok(value: Value) -> Task {
    after(1, move |_| Ok(vec![value.clone()]))
}

fn fail(message: &'static str) -> Task {
    after(1, move |_| Err(TaskError::msg(message)))
}

#[tokio::test]
async fn test_map_group_results() {
    let outcome = combine_async(tasks![TaskLike::map([
        ("a", ok(json!("one"))),
        ("b", ok(json!(2))),
    ])])
    .unwrap()
    .await;

    let results = outcome.unwrap();
    assert_eq!(results, vec![json!({ "a": "one", "b": 2 })]);
    assert!(results[0].is_object());
}

#[tokio::test]
async fn test_list_group_results() {
    let outcome = combine_async(tasks![[ok(json!("one")), ok(json!(2))]])
        .unwrap()
        .await;

    let results = outcome.unwrap();
    assert_eq!(results, vec![json!(["one", 2])]);
    assert!(results[0].is_array());
}

#[tokio::test]
async fn test_list_order_ignores_completion_order() {
    let outcome = combine_async(tasks![[
        after(30, |_| Ok(vec![json!("slow")])),
        after(15, |_| Ok(vec![json!("medium")])),
        after(1, |_| Ok(vec![json!("fast")])),
    ]])
    .unwrap()
    .await;

    assert_eq!(outcome.unwrap(), vec![json!(["slow", "medium", "fast"])]);
}

#[tokio::test]
async fn test_group_members_receive_previous_results() {
    let outcome = combine_async(tasks![
        ok(json!(1)),
        [
            after(1, |args| Ok(vec![json!(format!("one {}", args[0]))])),
            after(1, |args| Ok(vec![json!(1 + args[0].as_i64().unwrap())])),
        ],
    ])
    .unwrap()
    .await;

    assert_eq!(outcome.unwrap(), vec![json!(["one 1", 2])]);
}

#[tokio::test]
async fn test_only_first_result_is_kept_per_member() {
    let outcome = combine_async(tasks![TaskLike::map([(
        "pair",
        Task::new(|done, _| done.ok(vec![json!(1), json!(2)])),
    )])])
    .unwrap()
    .await;

    assert_eq!(outcome.unwrap(), vec![json!({ "pair": 1 })]);
}

#[tokio::test]
async fn test_map_errors_only_at_failed_keys() {
    let outcome = combine_async(tasks![TaskLike::map([
        ("a", ok(json!("one"))),
        ("b", fail("error one")),
        ("c", ok(json!(3))),
        ("d", fail("error two")),
        ("e", ok(json!("five"))),
    ])])
    .unwrap()
    .await;

    let err = outcome.unwrap_err();
    let failure = err.as_group().unwrap();
    assert!(matches!(failure.errors, GroupErrors::Map(_)));
    assert_eq!(failure.errors.failed(), 2);
    assert_eq!(
        failure.errors.to_messages(),
        json!({ "b": "error one", "d": "error two" })
    );
    assert!(failure.errors.get("a").is_none());
    assert_eq!(
        failure.results,
        json!({ "a": "one", "b": null, "c": 3, "d": null, "e": "five" })
    );
    assert_eq!(err.to_string(), "2 of 5 group members failed");
}

#[tokio::test]
async fn test_list_errors_keep_holes() {
    let outcome = combine_async(tasks![[
        ok(json!("one")),
        fail("err"),
        ok(json!(3)),
    ]])
    .unwrap()
    .await;

    let err = outcome.unwrap_err();
    let failure = err.as_group().unwrap();
    assert_eq!(failure.errors.width(), 3);
    assert!(failure.errors.at(0).is_none());
    assert_eq!(failure.errors.at(1).unwrap().to_string(), "err");
    assert!(failure.errors.at(2).is_none());
    assert_eq!(failure.errors.to_messages(), json!([null, "err", null]));
    assert_eq!(failure.results, json!(["one", null, 3]));
}

#[tokio::test]
async fn test_failure_does_not_stop_siblings() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();

    let outcome = combine_async(tasks![[
        fail("early"),
        after(20, move |_| {
            flag.store(true, Ordering::SeqCst);
            Ok(vec![json!("late")])
        }),
    ]])
    .unwrap()
    .await;

    let err = outcome.unwrap_err();
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(err.as_group().unwrap().results, json!([null, "late"]));
}

#[tokio::test]
async fn test_members_start_in_order_before_any_completes() {
    let events = Arc::new(Mutex::new(Vec::new()));

    let member = |index: usize| {
        let events = events.clone();
        Task::new(move |done, _| {
            events.lock().unwrap().push(format!("start {index}"));
            let events = events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                events.lock().unwrap().push(format!("done {index}"));
                done.ok(vec![json!(index)]);
            });
        })
    };

    let outcome = combine_async(tasks![[member(0), member(1), member(2)]])
        .unwrap()
        .await;

    assert_eq!(outcome.unwrap(), vec![json!([0, 1, 2])]);
    let events = events.lock().unwrap();
    assert_eq!(events[..3], ["start 0", "start 1", "start 2"]);
}

#[tokio::test]
async fn test_map_members_start_in_written_order() {
    let events = Arc::new(Mutex::new(Vec::new()));

    let member = |key: &'static str| {
        let events = events.clone();
        Task::new(move |done, _| {
            events.lock().unwrap().push(format!("start {key}"));
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                done.ok(vec![json!(key)]);
            });
        })
    };

    let outcome = combine_async(tasks![TaskLike::map([
        ("zeta", member("zeta")),
        ("alpha", member("alpha")),
        ("beta", member("beta")),
    ])])
    .unwrap()
    .await;

    assert_eq!(
        outcome.unwrap(),
        vec![json!({ "zeta": "zeta", "alpha": "alpha", "beta": "beta" })]
    );
    assert_eq!(
        *events.lock().unwrap(),
        ["start zeta", "start alpha", "start beta"]
    );
}

#[tokio::test]
async fn test_nested_groups_keep_their_shapes() {
    let outcome = combine_async(tasks![TaskLike::list([
        TaskLike::list([ok(json!(1)), ok(json!(2))]),
        TaskLike::map([("x", ok(json!("ex"))), ("y", ok(json!("why")))]),
        TaskLike::from(ok(json!(3))),
    ])])
    .unwrap()
    .await;

    assert_eq!(
        outcome.unwrap(),
        vec![json!([[1, 2], { "x": "ex", "y": "why" }, 3])]
    );
}

#[tokio::test]
async fn test_nested_failure_surfaces_as_member_error() {
    let outcome = combine_async(tasks![TaskLike::map([
        ("inner", TaskLike::list([ok(json!(1)), fail("deep")])),
        ("plain", TaskLike::from(ok(json!(2)))),
    ])])
    .unwrap()
    .await;

    let err = outcome.unwrap_err();
    let failure = err.as_group().unwrap();
    let inner = failure.errors.get("inner").unwrap().as_group().unwrap();
    assert_eq!(inner.errors.to_messages(), json!([null, "deep"]));
    assert_eq!(failure.results, json!({ "inner": null, "plain": 2 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_members_across_threads() {
    let members: Vec<Task> = (0..64)
        .map(|i| after((64 - i) % 7, move |_| Ok(vec![json!(i)])))
        .collect();

    let outcome = combine_async(tasks![members]).unwrap().await;

    let expected: Vec<Value> = (0..64).map(|i| json!(i)).collect();
    assert_eq!(outcome.unwrap(), vec![Value::Array(expected)]);
}

#[tokio::test]
async fn test_complex_pipeline() {
    let called = Arc::new(AtomicBool::new(false));
    let never = |flag: Arc<AtomicBool>| {
        Task::new(move |done, _| {
            flag.store(true, Ordering::SeqCst);
            done.ok(vec![]);
        })
    };

    let outcome = combine_async(tasks![
        TaskLike::map([("a", ok(json!("one"))), ("b", ok(json!("two")))]),
        [
            after(1, |args| {
                assert_eq!(args[0], json!({ "a": "one", "b": "two" }));
                Ok(vec![json!("three")])
            }),
            after(1, |args| {
                assert_eq!(args[0], json!({ "a": "one", "b": "two" }));
                Ok(vec![json!("four")])
            }),
        ],
        after(1, |args| {
            assert_eq!(args[0], json!(["three", "four"]));
            Ok(vec![json!("five")])
        }),
        TaskLike::map([
            (
                "c",
                after(1, |args| {
                    assert_eq!(args[0], json!("five"));
                    Err(TaskError::msg("error one"))
                }),
            ),
            (
                "d",
                after(1, |args| {
                    assert_eq!(args[0], json!("five"));
                    Err(TaskError::msg("error two"))
                }),
            ),
        ]),
        [never(called.clone()), never(called.clone())],
    ])
    .unwrap()
    .await;

    let err = outcome.unwrap_err();
    assert_eq!(
        err.as_group().unwrap().errors.to_messages(),
        json!({ "c": "error one", "d": "error two" })
    );
    assert!(!called.load(Ordering::SeqCst));
}
