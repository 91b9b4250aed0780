use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rampart::{CircularEventConsumer, GuardEvent, Retry, RetryConfig, RetryError, RetryEvent};

#[derive(Debug)]
struct TestError;

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "test error")
    }
}

impl std::error::Error for TestError {}

fn retry(max_attempts: u32) -> Retry {
    let config = RetryConfig::builder()
        .max_attempts(max_attempts)
        .wait_duration(Duration::from_millis(10))
        .build()
        .unwrap();
    Retry::new("fetch", config)
}

/// A permanently failing function is invoked exactly `max_attempts` times and
/// the event stream shows two retries followed by one error.
#[test]
fn permanent_failure_exhausts_attempts() {
    let retry = retry(3);
    let consumer = Arc::new(CircularEventConsumer::new(16));
    let _sub = retry.events().subscribe_arc(consumer.clone());

    let invocations = Arc::new(AtomicUsize::new(0));
    let i = Arc::clone(&invocations);
    let err = retry
        .call(move || {
            i.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError)
        })
        .unwrap_err();

    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert!(matches!(
        err,
        RetryError::MaxRetriesExceeded { attempts: 3, .. }
    ));

    let types: Vec<&str> = consumer
        .buffered_events()
        .iter()
        .map(|event| event.event_type())
        .collect();
    assert_eq!(types, vec!["Retry", "Retry", "Error"]);
}

/// A failure followed by a success yields the value and a success event
/// carrying the attempt count.
#[test]
fn transient_failure_recovers() {
    let retry = retry(3);
    let consumer = Arc::new(CircularEventConsumer::new(16));
    let _sub = retry.events().subscribe_arc(consumer.clone());

    let invocations = Arc::new(AtomicUsize::new(0));
    let i = Arc::clone(&invocations);
    let value = retry
        .call(move || {
            if i.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TestError)
            } else {
                Ok("v")
            }
        })
        .unwrap();

    assert_eq!(value, "v");
    let events = consumer.buffered_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], RetryEvent::Retry { attempt: 1, .. }));
    assert!(matches!(events[1], RetryEvent::Success { attempts: 2, .. }));
}

/// Concurrent calls through one instance keep independent attempt counters.
#[test]
fn concurrent_calls_do_not_share_attempt_state() {
    let retry = Arc::new(retry(3));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let retry = Arc::clone(&retry);
        handles.push(std::thread::spawn(move || {
            let invocations = AtomicUsize::new(0);
            let result = retry.call(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError)
            });
            (invocations.into_inner(), result.is_err())
        }));
    }
    for handle in handles {
        let (invocations, failed) = handle.join().unwrap();
        assert_eq!(invocations, 3);
        assert!(failed);
    }

    let metrics = retry.metrics();
    assert_eq!(metrics.number_of_failed_calls_with_retry_attempt, 8);
}

/// The wait between attempts is observed.
#[test]
fn waits_between_attempts() {
    let config = RetryConfig::builder()
        .max_attempts(3)
        .wait_duration(Duration::from_millis(40))
        .build()
        .unwrap();
    let retry = Retry::new("fetch", config);

    let start = std::time::Instant::now();
    let _ = retry.call(|| Err::<(), _>(TestError));
    // Two waits of 40 ms between three attempts.
    assert!(start.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn async_calls_retry_and_recover() {
    let retry = retry(4);
    let invocations = Arc::new(AtomicUsize::new(0));
    let i = Arc::clone(&invocations);

    let value = retry
        .call_async(move || {
            let i = Arc::clone(&i);
            async move {
                if i.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError)
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 7);
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert_eq!(
        retry
            .metrics()
            .number_of_successful_calls_with_retry_attempt,
        1
    );
}
