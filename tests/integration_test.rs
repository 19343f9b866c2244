use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tandem::prelude::*;

fn pool(threads: usize) -> WorkerPool {
    let config = Config::builder().num_threads(threads).build().unwrap();
    WorkerPool::new(&config).unwrap()
}

#[test]
fn test_results_are_not_swapped() {
    let pool = pool(2);

    let a = pool
        .submit(|| thread::sleep(Duration::from_millis(30)), "A".to_string())
        .unwrap();
    let b = pool
        .submit(|| thread::sleep(Duration::from_millis(10)), "B".to_string())
        .unwrap();

    while !a.is_done() || !b.is_done() {
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(a.get().unwrap(), "A");
    assert_eq!(b.get().unwrap(), "B");

    pool.shutdown();
}

#[test]
fn test_get_before_completion_blocks() {
    let pool = pool(1);

    let start = Instant::now();
    let handle = pool
        .submit(|| thread::sleep(Duration::from_millis(50)), 17)
        .unwrap();

    assert!(!handle.is_done());
    assert_eq!(handle.get().unwrap(), 17);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_check_then_get_matches_direct_get() {
    let pool = pool(2);

    let polled = pool.submit_call(|| 5 * 5).unwrap();
    let direct = pool.submit_call(|| 5 * 5).unwrap();

    let mut backoff = PollBackoff::new(Duration::from_millis(1), Duration::from_millis(8));
    poll_until_done(std::slice::from_ref(&polled), &mut backoff, || {});
    assert!(polled.is_done());

    assert_eq!(polled.get().unwrap(), direct.get().unwrap());
}

#[test]
fn test_failure_is_isolated_to_its_handle() {
    let pool = pool(2);

    let failing = pool
        .submit_call(|| -> String { panic!("task blew up") })
        .unwrap();
    let healthy = pool.submit(|| {}, "fine".to_string()).unwrap();

    match failing.get() {
        Err(Error::TaskFailed { message, .. }) => assert!(message.contains("blew up")),
        other => panic!("expected a task failure, got {:?}", other),
    }
    assert_eq!(healthy.get().unwrap(), "fine");

    // the pool keeps working afterwards
    assert_eq!(pool.submit_call(|| 1).unwrap().get().unwrap(), 1);
}

#[test]
fn test_tasks_run_concurrently() {
    let pool = pool(4);
    let pause = Duration::from_millis(100);

    let start = Instant::now();
    let handles: Vec<_> = (0..4)
        .map(|i| pool.submit(move || thread::sleep(pause), i).unwrap())
        .collect();

    let results: Vec<i32> = join_all(handles)
        .into_iter()
        .collect::<Result<_>>()
        .unwrap();

    assert_eq!(results, vec![0, 1, 2, 3]);
    // four 100ms tasks on four workers must not take four times as long
    assert!(start.elapsed() < pause * 3);
}

#[test]
fn test_is_done_never_reverts() {
    let pool = pool(2);
    let handle = pool.submit_call(|| "x").unwrap();

    assert!(handle.wait_timeout(Duration::from_secs(5)));
    for _ in 0..1000 {
        assert!(handle.is_done());
        assert_eq!(handle.status(), TaskStatus::Completed);
    }
    assert_eq!(handle.get().unwrap(), "x");
}

#[test]
fn test_shutdown_after_completion_returns_promptly() {
    let pool = pool(2);

    let handles: Vec<_> = (0..8).map(|i| pool.submit_call(move || i * 2).unwrap()).collect();
    let results: Vec<i32> = join_all(handles)
        .into_iter()
        .collect::<Result<_>>()
        .unwrap();

    let start = Instant::now();
    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(5)));
    assert!(start.elapsed() < Duration::from_secs(5));

    assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    assert_eq!(pool.stats().completed, 8);
}

#[test]
fn test_cancel_pending_task() {
    let pool = pool(1);
    let (started_tx, started_rx) = std::sync::mpsc::channel();

    let blocker = pool
        .submit_cancellable(move |token| {
            started_tx.send(()).unwrap();
            token.sleep(Duration::from_secs(30))?;
            Ok("blocker")
        })
        .unwrap();
    started_rx.recv().unwrap();

    let ran = Arc::new(Mutex::new(false));
    let queued = {
        let ran = ran.clone();
        pool.submit(move || *ran.lock() = true, "queued").unwrap()
    };

    assert!(queued.cancel());
    assert!(queued.is_cancelled());
    assert!(blocker.cancel());

    assert!(matches!(blocker.get(), Err(Error::Cancelled(_))));
    assert!(matches!(queued.get(), Err(Error::Cancelled(_))));

    pool.join();
    assert!(!*ran.lock());
}

#[test]
fn test_cancelled_task_ignoring_token_still_resolves_cancelled() {
    let pool = pool(1);
    let (started_tx, started_rx) = std::sync::mpsc::channel();

    let handle = pool
        .submit_call(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(30));
            1
        })
        .unwrap();
    started_rx.recv().unwrap();

    assert!(handle.cancel());
    assert!(matches!(handle.get(), Err(Error::Cancelled(_))));
}

#[test]
fn test_get_timeout() {
    let pool = pool(1);
    let slow = pool
        .submit(|| thread::sleep(Duration::from_millis(200)), ())
        .unwrap();
    assert!(matches!(
        slow.get_timeout(Duration::from_millis(10)),
        Err(Error::Timeout)
    ));
}

#[test]
fn test_shared_pool_across_threads() {
    let pool = Arc::new(pool(2));
    let counter = Arc::new(Mutex::new(0));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                let handles: Vec<_> = (0..25)
                    .map(|_| {
                        let counter = counter.clone();
                        pool.submit(move || *counter.lock() += 1, ()).unwrap()
                    })
                    .collect();
                join_all(handles);
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }

    assert_eq!(*counter.lock(), 100);
    assert_eq!(pool.stats().completed, 100);
}

#[test]
fn test_drop_joins_workers() {
    let counter = Arc::new(Mutex::new(0));
    {
        let pool = pool(2);
        for _ in 0..10 {
            let counter = counter.clone();
            pool.execute(move || {
                thread::sleep(Duration::from_millis(2));
                *counter.lock() += 1;
            })
            .unwrap();
        }
    }
    assert_eq!(*counter.lock(), 10);
}
