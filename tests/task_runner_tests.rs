//! Task runner behaviour driven through a real dispatcher

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use atlaswatch::dispatch::Dispatcher;
use atlaswatch::task::TaskRunner;

/// Unit that finishes on a worker thread after `delay`.
fn background_unit(
    log: &Arc<Mutex<Vec<usize>>>,
    id: usize,
    delay: Duration,
) -> impl FnOnce(atlaswatch::task::Continuation) + Send + 'static {
    let log = Arc::clone(log);
    move |next| {
        thread::spawn(move || {
            thread::sleep(delay);
            log.lock().unwrap().push(id);
            next.resume();
        });
    }
}

#[test]
fn test_background_units_complete_in_order() {
    let mut dispatcher = Dispatcher::new();
    let runner = TaskRunner::new(dispatcher.handle());
    let log = Arc::new(Mutex::new(Vec::new()));

    // Later units are faster; ordering must still follow insertion
    runner.enqueue(background_unit(&log, 1, Duration::from_millis(30)));
    runner.enqueue(background_unit(&log, 2, Duration::from_millis(10)));
    runner.enqueue(background_unit(&log, 3, Duration::from_millis(1)));

    let done = Arc::new(AtomicBool::new(false));
    let flag = done.clone();
    runner.run(move || flag.store(true, Ordering::SeqCst));

    dispatcher.run_until(|| done.load(Ordering::SeqCst));
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    assert!(!runner.is_running());
    assert!(runner.is_empty());
}

#[test]
fn test_second_run_is_ignored_while_running() {
    let mut dispatcher = Dispatcher::new();
    let runner = TaskRunner::new(dispatcher.handle());
    let log = Arc::new(Mutex::new(Vec::new()));
    runner.enqueue(background_unit(&log, 1, Duration::from_millis(5)));

    let completions = Arc::new(AtomicUsize::new(0));
    let first = completions.clone();
    runner.run(move || {
        first.fetch_add(1, Ordering::SeqCst);
    });
    let second = completions.clone();
    runner.run(move || {
        second.fetch_add(1, Ordering::SeqCst);
    });

    dispatcher.run_until(|| completions.load(Ordering::SeqCst) > 0);
    dispatcher.pump();
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(*log.lock().unwrap(), vec![1]);
}

#[test]
fn test_unit_that_never_resumes_stalls_the_chain() {
    let mut dispatcher = Dispatcher::new().with_tick(Duration::from_millis(5));
    let runner = TaskRunner::new(dispatcher.handle());
    let reached = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicBool::new(false));

    runner.enqueue(|_next| {});
    let flag = reached.clone();
    runner.enqueue(move |next| {
        flag.store(true, Ordering::SeqCst);
        next.resume();
    });
    let flag = completed.clone();
    runner.run(move || flag.store(true, Ordering::SeqCst));

    let mut ticks = 0;
    dispatcher.run_until(|| {
        ticks += 1;
        ticks > 20
    });

    assert!(!reached.load(Ordering::SeqCst));
    assert!(!completed.load(Ordering::SeqCst));
    assert!(runner.is_running());
}

#[test]
fn test_continuation_clones_share_one_shot() {
    let mut dispatcher = Dispatcher::new();
    let runner = TaskRunner::new(dispatcher.handle());
    let starts = Arc::new(AtomicUsize::new(0));

    let counter = starts.clone();
    runner.enqueue(move |next| {
        counter.fetch_add(1, Ordering::SeqCst);
        let other = next.clone();
        assert!(next.resume());
        assert!(!other.resume());
        assert!(other.is_fired());
    });
    let counter = starts.clone();
    runner.enqueue(move |next| {
        counter.fetch_add(1, Ordering::SeqCst);
        next.resume();
    });

    let done = Arc::new(AtomicBool::new(false));
    let flag = done.clone();
    runner.run(move || flag.store(true, Ordering::SeqCst));
    dispatcher.run_until(|| done.load(Ordering::SeqCst));

    assert_eq!(starts.load(Ordering::SeqCst), 2);
}
