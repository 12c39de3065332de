#![cfg(feature = "metrics")]
//! Tests for `brokerwire` metrics.
//!
//! Sessions are driven inside `metrics::with_local_recorder` and the results
//! read back from `metrics_util::debugging::DebuggingRecorder`.
use brokerwire::{
    AcknowledgeMode,
    ConnectionConfig,
    id::{ConnectionId, ConsumerId, SessionId},
    metrics as names,
};
use brokerwire_testing::{
    CollectingListener,
    TEST_QUEUE,
    expired_dispatch,
    session_with,
    session_with_config,
    text_dispatch,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;

fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter(snapshotter: &Snapshotter, name: &str) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(k, _, _, v)| match v {
            DebugValue::Counter(c) if k.key().name() == name => Some(c),
            _ => None,
        })
        .unwrap_or(0)
}

#[rstest]
#[case(1)]
#[case(4)]
fn queued_and_expired_messages_are_counted(#[case] count: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();

    metrics::with_local_recorder(&recorder, || {
        let (session, _transport) = session_with(AcknowledgeMode::Auto);
        let consumer = session
            .create_consumer(TEST_QUEUE, None)
            .expect("consumer");
        for sequence in 1..=count {
            session
                .on_dispatch(text_dispatch(consumer.id(), sequence, "live"))
                .expect("dispatch");
            session
                .on_dispatch(expired_dispatch(consumer.id(), sequence + 100))
                .expect("dispatch");
        }
    });

    assert_eq!(counter(&snapshotter, names::MESSAGES_DISPATCHED), count);
    assert_eq!(counter(&snapshotter, names::MESSAGES_EXPIRED), count);
}

#[test]
fn protocol_violations_are_counted() {
    let (snapshotter, recorder) = debugging_recorder_setup();

    metrics::with_local_recorder(&recorder, || {
        let (session, _transport) = session_with(AcknowledgeMode::Auto);
        let stranger = ConsumerId::new(SessionId::new(ConnectionId::new(1), 1), 9);
        assert!(session.on_dispatch(text_dispatch(stranger, 1, "stray")).is_err());
    });

    assert_eq!(counter(&snapshotter, names::PROTOCOL_VIOLATIONS), 1);
}

#[test]
fn redeliveries_are_counted_per_message() {
    let (snapshotter, recorder) = debugging_recorder_setup();

    metrics::with_local_recorder(&recorder, || {
        let config = ConnectionConfig::default().max_redeliveries(None);
        let (session, _transport) = session_with_config(AcknowledgeMode::Client, config);
        let consumer = session
            .create_consumer(TEST_QUEUE, None)
            .expect("consumer");
        for sequence in 1..=3 {
            session
                .on_dispatch(text_dispatch(consumer.id(), sequence, "m"))
                .expect("dispatch");
        }
        consumer.set_listener(CollectingListener::new()).expect("listener");
        session.recover().expect("recover");
        session.recover().expect("recover");
    });

    assert_eq!(counter(&snapshotter, names::MESSAGES_REDELIVERED), 6);
}

#[test]
fn open_sessions_gauge_tracks_close() {
    let (snapshotter, recorder) = debugging_recorder_setup();

    metrics::with_local_recorder(&recorder, || {
        let (first, _) = session_with(AcknowledgeMode::Auto);
        let (second, _) = session_with(AcknowledgeMode::Client);
        first.close();
        first.close();
        drop(second);
    });

    let gauge = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(k, _, _, v)| match v {
            DebugValue::Gauge(g) if k.key().name() == names::SESSIONS_ACTIVE => Some(g.0),
            _ => None,
        });
    assert_eq!(gauge, Some(0.0));
}
