//! Tailing Worker Tests
//!
//! Drives a single worker through the scripted mock backend:
//! - cursor invalidation closes the old cursor before a new one opens
//! - transient query failures retry on the same cursor
//! - missing collections terminate quietly or fatally per configuration
//! - empty polls respect the interval but wake promptly on stop

use std::sync::Arc;
use std::time::Duration;

use bson::doc;
use captail::mock::{MemorySink, MockStep, MockStreamFactory, OpenOutcome};
use captail::{stop_channel, CollectionRef, TailError, TailWorker, WorkerResult};

fn target() -> CollectionRef {
    CollectionRef::new("mydb", "capped1")
}

fn worker(
    factory: &Arc<MockStreamFactory>,
    sink: &Arc<MemorySink>,
    interval: Duration,
    raise_on_missing: bool,
) -> (captail::StopHandle, TailWorker) {
    let (handle, signal) = stop_channel();
    let worker = TailWorker::new(
        target(),
        factory.clone() as Arc<dyn captail::StreamFactory>,
        sink.clone() as Arc<dyn captail::EventSink>,
        interval,
        raise_on_missing,
        signal,
    );
    (handle, worker)
}

async fn wait_for_events(sink: &MemorySink, count: usize) {
    while sink.len() < count {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_cursor_exhaustion_reconnects_without_overlap() {
    let factory = Arc::new(MockStreamFactory::new());
    factory.script_opens(
        &target(),
        vec![
            OpenOutcome::Stream(vec![MockStep::Doc(doc! { "a": 1 }), MockStep::Exhaust]),
            OpenOutcome::Stream(vec![MockStep::Doc(doc! { "a": 2 })]),
        ],
    );
    let sink = Arc::new(MemorySink::new());
    let (handle, worker) = worker(&factory, &sink, Duration::from_millis(50), true);

    let task = tokio::spawn(worker.run());
    wait_for_events(&sink, 2).await;
    handle.stop();
    let result = task.await.unwrap();

    assert!(matches!(result, WorkerResult::StoppedByRequest));
    assert_eq!(factory.open_count(), 2);
    assert!(!factory.saw_overlapping_streams());

    let events = sink.events();
    assert_eq!(events[0].message.get_i32("a").unwrap(), 1);
    assert_eq!(events[1].message.get_i32("a").unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_query_failure_retries_on_same_cursor() {
    let factory = Arc::new(MockStreamFactory::new());
    factory.script_opens(
        &target(),
        vec![OpenOutcome::Stream(vec![
            MockStep::Doc(doc! { "a": 1 }),
            MockStep::QueryFail,
            MockStep::Doc(doc! { "a": 2 }),
        ])],
    );
    let sink = Arc::new(MemorySink::new());
    let (handle, worker) = worker(&factory, &sink, Duration::from_millis(50), true);

    let task = tokio::spawn(worker.run());
    wait_for_events(&sink, 2).await;
    handle.stop();
    let result = task.await.unwrap();

    assert!(matches!(result, WorkerResult::StoppedByRequest));
    // No reconnect happened: one open served both documents.
    assert_eq!(factory.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_query_failures_back_off() {
    let interval = Duration::from_secs(1);
    let factory = Arc::new(MockStreamFactory::new());
    factory.script_opens(
        &target(),
        vec![OpenOutcome::Stream(vec![
            MockStep::QueryFail,
            MockStep::QueryFail,
            MockStep::QueryFail,
            MockStep::QueryFail,
            MockStep::Doc(doc! { "done": true }),
        ])],
    );
    let sink = Arc::new(MemorySink::new());
    let (handle, worker) = worker(&factory, &sink, interval, true);

    let task = tokio::spawn(worker.run());
    wait_for_events(&sink, 1).await;
    handle.stop();
    task.await.unwrap();

    let polls = factory.poll_times();
    assert!(polls.len() >= 5);
    // The first three failures retry immediately; once the threshold is hit
    // the interval is inserted before the next attempt.
    let immediate = polls[2] - polls[1];
    let backed_off = polls[3] - polls[2];
    assert!(immediate < interval);
    assert!(backed_off >= interval);
}

#[tokio::test]
async fn test_missing_collection_tolerated() {
    let factory = Arc::new(MockStreamFactory::new());
    let sink = Arc::new(MemorySink::new());
    let (_handle, worker) = worker(&factory, &sink, Duration::from_millis(50), false);

    let result = worker.run().await;
    assert!(matches!(result, WorkerResult::CollectionMissingTolerated));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_missing_collection_fatal_when_strict() {
    let factory = Arc::new(MockStreamFactory::new());
    let sink = Arc::new(MemorySink::new());
    let (_handle, worker) = worker(&factory, &sink, Duration::from_millis(50), true);

    let result = worker.run().await;
    assert!(matches!(
        result,
        WorkerResult::Fatal(TailError::CollectionMissing { .. })
    ));
}

#[tokio::test]
async fn test_not_capped_is_fatal() {
    let factory = Arc::new(MockStreamFactory::new());
    factory.script_opens(&target(), vec![OpenOutcome::NotCapped]);
    let sink = Arc::new(MemorySink::new());
    let (_handle, worker) = worker(&factory, &sink, Duration::from_millis(50), false);

    let result = worker.run().await;
    assert!(matches!(result, WorkerResult::Fatal(TailError::NotCapped { .. })));
}

#[tokio::test]
async fn test_unreachable_server_is_fatal() {
    let factory = Arc::new(MockStreamFactory::new());
    factory.script_opens(&target(), vec![OpenOutcome::Unreachable]);
    let sink = Arc::new(MemorySink::new());
    let (_handle, worker) = worker(&factory, &sink, Duration::from_millis(50), true);

    let result = worker.run().await;
    assert!(matches!(result, WorkerResult::Fatal(TailError::Connection(_))));
}

#[tokio::test(start_paused = true)]
async fn test_missing_on_reconnect_tolerated() {
    let factory = Arc::new(MockStreamFactory::new());
    // One good open that dies immediately; the re-open finds the collection gone.
    factory.script_opens(&target(), vec![OpenOutcome::Stream(vec![MockStep::Exhaust])]);
    let sink = Arc::new(MemorySink::new());
    let (_handle, worker) = worker(&factory, &sink, Duration::from_millis(50), false);

    let result = worker.run().await;
    assert!(matches!(result, WorkerResult::CollectionMissingTolerated));
}

#[tokio::test(start_paused = true)]
async fn test_empty_polls_wait_at_least_interval() {
    let interval = Duration::from_secs(1);
    let factory = Arc::new(MockStreamFactory::new());
    factory.script_opens(&target(), vec![OpenOutcome::Stream(vec![])]);
    let sink = Arc::new(MemorySink::new());
    let (handle, worker) = worker(&factory, &sink, interval, true);

    let task = tokio::spawn(worker.run());
    while factory.poll_times().len() < 4 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.stop();
    task.await.unwrap();

    let polls = factory.poll_times();
    for pair in polls.windows(2) {
        assert!(pair[1] - pair[0] >= interval);
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_wakes_sleeping_worker_promptly() {
    let interval = Duration::from_secs(60);
    let factory = Arc::new(MockStreamFactory::new());
    factory.script_opens(&target(), vec![OpenOutcome::Stream(vec![])]);
    let sink = Arc::new(MemorySink::new());
    let (handle, worker) = worker(&factory, &sink, interval, true);

    let task = tokio::spawn(worker.run());
    // Let the worker poll once and enter its interval wait.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let stop_raised = tokio::time::Instant::now();
    handle.stop();
    let result = task.await.unwrap();

    assert!(matches!(result, WorkerResult::StoppedByRequest));
    assert!(stop_raised.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_rich_fields_normalize_to_plain_strings() {
    let oid = bson::oid::ObjectId::new();
    let original = doc! {
        "id": oid,
        "payload": bson::Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: vec![1, 2, 3],
        },
        "level": "info",
        "count": 7_i32,
    };
    let expected_size = bson::to_vec(&original).unwrap().len() as u64;

    let factory = Arc::new(MockStreamFactory::new());
    factory.script_opens(
        &target(),
        vec![OpenOutcome::Stream(vec![MockStep::Doc(original)])],
    );
    let sink = Arc::new(MemorySink::new());
    let (handle, worker) = worker(&factory, &sink, Duration::from_millis(50), true);

    let task = tokio::spawn(worker.run());
    wait_for_events(&sink, 1).await;
    handle.stop();
    task.await.unwrap();

    let events = sink.events();
    let event = &events[0];
    assert_eq!(event.database, "mydb");
    assert_eq!(event.collection, "capped1");
    assert_eq!(event.message_size, expected_size);
    assert_eq!(event.message.get_str("id").unwrap(), oid.to_hex());
    assert_eq!(event.message.get_str("payload").unwrap(), "010203");
    assert_eq!(event.message.get_str("level").unwrap(), "info");
    assert_eq!(event.message.get_i32("count").unwrap(), 7);
}
