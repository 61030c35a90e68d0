use std::error::Error;
use std::time::Duration;

use procqueue::Event;
use procqueue_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn signal_is_idempotent() {
    let event = Event::new();
    assert!(!event.is_signaled());

    assert!(event.signal(), "first signal should perform the transition");
    assert!(!event.signal(), "second signal should be a no-op");
    assert!(event.is_signaled());
}

#[test]
fn clones_share_the_same_signal() {
    let event = Event::new();
    let clone = event.clone();

    clone.signal();

    assert!(event.is_signaled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_async_waiters_wake_on_signal() -> TestResult {
    init_tracing();
    let event = Event::new();

    let mut waiters = Vec::new();
    for _ in 0..8 {
        let event = event.clone();
        waiters.push(tokio::spawn(async move { event.wait().await }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    event.signal();

    with_timeout(async {
        for waiter in waiters {
            waiter.await.expect("waiter panicked");
        }
    })
    .await;
    Ok(())
}

#[tokio::test]
async fn wait_after_signal_returns_immediately() {
    let event = Event::new();
    event.signal();

    with_timeout(event.wait()).await;
}

#[test]
fn blocking_wait_wakes_from_another_thread() {
    let event = Event::new();
    let signaller = event.clone();

    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        signaller.signal();
    });

    event.wait_blocking();
    assert!(event.is_signaled());
    handle.join().unwrap();
}

#[test]
fn blocking_wait_with_timeout_reports_outcome() {
    let event = Event::new();

    assert!(!event.wait_blocking_timeout(Duration::from_millis(10)));

    event.signal();
    assert!(event.wait_blocking_timeout(Duration::from_millis(10)));
}
