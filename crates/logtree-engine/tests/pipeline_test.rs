//! End-to-end pipeline tests: session tree, write pipeline, and lifecycle
//! event observation through the event bus.

use logtree_engine::{
    DataKind, EventBus, Label, LifecycleEvent, Log, MemStore, Props, RecordEvtKind, RecordKind,
    SessionEvtKind, SessionKind,
};
use std::sync::Arc;

#[tokio::test]
async fn test_lifecycle_events_flow_through_the_bus() {
    let store = MemStore::new();
    let (bus, mut stream) = EventBus::channel();
    let log = Log::builder(store).notifier(bus).build();

    let session = log
        .open_session(Props::for_session(SessionKind::AppRun))
        .await
        .unwrap();
    session.write("hello", None).await.unwrap();
    session.close().await.unwrap();
    drop(session);
    drop(log);

    let mut kinds = Vec::new();
    while let Some(evt) = stream.next().await {
        kinds.push(match evt {
            LifecycleEvent::Session(evt) => match evt.kind {
                SessionEvtKind::Opened { .. } => "session-opened",
                SessionEvtKind::Closing => "session-closing",
                SessionEvtKind::Closed => "session-closed",
            },
            LifecycleEvent::Record(evt) => match evt.kind {
                RecordEvtKind::Opened => "record-opened",
                RecordEvtKind::Closed => "record-closed",
            },
            // LifecycleEvent is #[non_exhaustive]; no other variants exist today.
            evt => unreachable!("unexpected lifecycle event: {evt:?}"),
        });
    }
    assert_eq!(
        kinds,
        vec![
            "session-opened",
            "record-opened",
            "record-closed",
            "session-closing",
            "session-closed",
        ]
    );
}

#[tokio::test]
async fn test_logged_list_matches_close_event_order() {
    let store = MemStore::new();
    let (bus, mut stream) = EventBus::channel();
    let log = Log::builder(store).notifier(bus).build();
    let session = log
        .open_session(Props::for_session(SessionKind::Generic))
        .await
        .unwrap();

    // Open both records up front, then close in reverse order so completion
    // order visibly differs from creation order.
    let first = session.open_record(Props::record_defaults()).await.unwrap();
    let second = session.open_record(Props::record_defaults()).await.unwrap();
    second.close().await.unwrap();
    first.close().await.unwrap();

    let closed = stream.wait_for_closed_records(2).await;
    assert_eq!(closed, vec![second.uri().to_string(), first.uri().to_string()]);

    let logged: Vec<String> = session
        .logged_records()
        .iter()
        .map(|r| r.uri().to_string())
        .collect();
    assert_eq!(logged, closed);
}

#[tokio::test]
async fn test_concurrent_writers_all_complete() {
    let store = MemStore::new();
    let (bus, mut stream) = EventBus::channel();
    let log = Log::builder(Arc::clone(&store) as Arc<dyn logtree_engine::Store>).notifier(bus).build();
    let session = log
        .open_session(Props::for_session(SessionKind::Generic))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let session = Arc::clone(&session);
        tasks.push(tokio::spawn(async move {
            session.write(format!("entry {}", i), None).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let closed = stream.wait_for_closed_records(16).await;
    assert_eq!(closed.len(), 16);
    assert_eq!(session.logged_records().len(), 16);
    assert!(session.open_records().is_empty());

    // Every record body survived intact, whatever order the closes landed in.
    let mut bodies: Vec<String> = session
        .logged_records()
        .iter()
        .map(|r| String::from_utf8(store.contents(r.uri()).unwrap()).unwrap())
        .collect();
    bodies.sort();
    let mut expected: Vec<String> = (0..16).map(|i| format!("entry {}", i)).collect();
    expected.sort();
    assert_eq!(bodies, expected);
}

#[tokio::test]
async fn test_session_tree_closes_leaf_first() {
    let store = MemStore::new();
    let log = Log::new(store);
    let root = log
        .open_session(Props::for_session(SessionKind::AppRun))
        .await
        .unwrap();
    let request = root
        .open_child(Props::for_session(SessionKind::ServerRequest))
        .await
        .unwrap();

    assert_eq!(request.parent_id(), Some(root.id()));

    request.write("handling", None).await.unwrap();
    root.write("accepted", None).await.unwrap();

    // Root close in the background outlasts the still-active child.
    let closing = {
        let root = Arc::clone(&root);
        tokio::spawn(async move { root.close().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(!root.is_closed());

    request.close().await.unwrap();
    closing.await.unwrap().unwrap();
    assert!(root.is_closed());

    assert_eq!(root.logged_records().len(), 1);
    assert_eq!(request.logged_records().len(), 1);
}

#[tokio::test]
async fn test_exception_record_carries_trace_text() {
    let store = MemStore::new();
    let log = Log::builder(Arc::clone(&store) as Arc<dyn logtree_engine::Store>).build();
    let session = log
        .open_session(Props::for_session(SessionKind::ServerRequest))
        .await
        .unwrap();

    let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer vanished");
    let fault = logtree_engine::Fault::from_error(&err);
    let trace = fault.trace.clone();

    let record = session
        .write(
            fault,
            Some(&[
                Label::Record(RecordKind::Exception),
                Label::Data(DataKind::Text),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(record.props().record_kind(), RecordKind::Exception);
    assert_eq!(
        String::from_utf8(store.contents(record.uri()).unwrap()).unwrap(),
        trace
    );
}

#[tokio::test]
async fn test_write_failure_still_fires_exactly_one_outcome() {
    let store = MemStore::new();
    let log = Log::builder(Arc::clone(&store) as Arc<dyn logtree_engine::Store>).build();
    let session = log
        .open_session(Props::for_session(SessionKind::Generic))
        .await
        .unwrap();

    // Fail a different stage each time; the caller sees exactly one error
    // per call and the session keeps working.
    store.fail_next_allocate();
    assert!(session.write("a", None).await.is_err());
    store.fail_next_append();
    assert!(session.write("b", None).await.is_err());
    let record = session.write("c", None).await.unwrap();
    assert_eq!(store.contents(record.uri()).unwrap(), b"c");

    session.close().await.unwrap();
}
