mod common;

use common::{delay, init, message, test_error, TIMEOUT};
use futures::executor::block_on;
use parking_lot::Mutex;
use promise_chain::{all, race, Promise};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn slow(start: i32, millis: u64) -> Promise<i32> {
    Promise::resolved(start)
        .then(|v| Ok(v + 1))
        .and_then(move |v| {
            Ok(Promise::new(move |resolve, _| {
                delay(resolve, v + 1, millis);
                Ok(())
            }))
        })
        .then(|v| Ok(v + 1))
}

fn fast(start: i32) -> Promise<i32> {
    Promise::resolved(start)
        .then(|v| Ok(v + 1))
        .then(|v| Ok(v + 1))
        .then(|v| Ok(v + 1))
}

#[test]
fn test_all_basic() {
    init();
    let values = all!(Promise::resolved(1), Promise::resolved(2), Promise::resolved(3))
        .wait_timeout(TIMEOUT)
        .unwrap();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn test_all_empty() {
    init();
    let values = Promise::<i32>::all(Vec::new()).wait_timeout(TIMEOUT).unwrap();
    assert!(values.is_empty());
}

#[test]
fn test_all_keeps_input_order() {
    init();
    let completed = Arc::new(Mutex::new(Vec::new()));
    let record = |p: Promise<i32>| {
        let completed = completed.clone();
        p.then(move |v| {
            completed.lock().push(v);
            Ok(v)
        })
    };
    let values = Promise::all(vec![record(slow(10, 200)), record(fast(20)), record(fast(30))])
        .wait_timeout(TIMEOUT)
        .unwrap();
    assert_eq!(values, vec![13, 23, 33]);
    assert_eq!(completed.lock().last(), Some(&13));
}

#[test]
fn test_all_heterogeneous_payloads() {
    init();
    let values = Promise::<Box<dyn Any + Send>>::all(vec![
        Promise::resolved(1).then(|v: i32| Ok(Box::new(v) as Box<dyn Any + Send>)),
        Promise::resolved("two").then(|v: &str| Ok(Box::new(v.to_owned()) as Box<dyn Any + Send>)),
    ])
    .wait_timeout(TIMEOUT)
    .unwrap();
    assert_eq!(values[0].downcast_ref::<i32>(), Some(&1));
    assert_eq!(values[1].downcast_ref::<String>().map(String::as_str), Some("two"));
}

#[test]
fn test_all_reject() {
    init();
    let rejected = Arc::new(AtomicBool::new(false));
    let flag = rejected.clone();
    let failing = fast(30).then(move |_| -> Result<i32, _> {
        flag.store(true, Ordering::SeqCst);
        Err(test_error("reject"))
    });
    let reason = Promise::all(vec![slow(10, 150), slow(20, 150), failing])
        .wait_timeout(TIMEOUT)
        .unwrap_err();
    assert_eq!(message(&reason), "reject");
    assert!(rejected.load(Ordering::SeqCst));
}

#[test]
fn test_all_first_failure_wins() {
    init();
    let late = Promise::<i32>::new(|_, reject| {
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(150));
            reject(test_error("late"));
        });
        Ok(())
    });
    let early = Promise::<i32>::rejected(test_error("early"));
    let reason = Promise::all(vec![late, early]).wait_timeout(TIMEOUT).unwrap_err();
    assert_eq!(message(&reason), "early");
}

#[test]
fn test_race_resolve() {
    init();
    let value = race!(slow(10, 200), slow(20, 200), fast(30))
        .wait_timeout(TIMEOUT)
        .unwrap();
    assert_eq!(value, 33);
}

#[test]
fn test_race_reject() {
    init();
    let failing = fast(30).then(|_| -> Result<i32, _> { Err(test_error("reject")) });
    let reason = block_on(async { Promise::race(vec![slow(10, 200), slow(20, 200), failing]).await })
        .unwrap_err();
    assert_eq!(message(&reason), "reject");
}

#[test]
fn test_race_ignores_input_position() {
    init();
    let value = Promise::race(vec![slow(10, 300), fast(0)]).wait_timeout(TIMEOUT).unwrap();
    assert_eq!(value, 3);
}
