//! Delivery, expiry and acknowledgement behaviour of non-transacted sessions.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use brokerwire::{
    AcknowledgeMode,
    ConnectionConfig,
    DispatchOutcome,
    IllegalState,
    SessionError,
    command::{AckKind, MessageDispatch, WireCommand},
    id::{ConnectionId, ConsumerId, SessionId},
    message::Message,
};
use brokerwire_testing::{
    CollectingListener,
    TEST_QUEUE,
    TestResult,
    expired_dispatch,
    receive_expect,
    session_with,
    session_with_config,
    text_dispatch,
};
use rstest::rstest;

fn sequences(messages: &[Message]) -> Vec<u64> {
    messages.iter().map(|m| m.id().sequence()).collect()
}

#[rstest]
#[tokio::test]
async fn auto_ack_listener_receives_hello_once() -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer("topic://news", None)?;
    let listener = CollectingListener::new();
    consumer.set_listener(listener.clone())?;

    let dispatcher = session.clone();
    let consumer_id = consumer.id();
    std::thread::spawn(move || dispatcher.on_dispatch(text_dispatch(consumer_id, 1, "Hello")))
        .join()
        .expect("dispatch thread")?;

    assert!(listener.wait_for(1, Duration::from_secs(1)).await);
    let messages = listener.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text(), Some("Hello"));

    let acks = transport.acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].kind, AckKind::Standard);
    assert_eq!(acks[0].first, messages[0].id());
    assert_eq!(acks[0].count, 1);
    assert_eq!(session.pending_acknowledgements(), 0);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn auto_ack_receive_acknowledges_on_return() -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    session.on_dispatch(text_dispatch(consumer.id(), 1, "one"))?;

    let message = receive_expect!(consumer.receive_timeout(Duration::from_secs(1)));

    assert_eq!(message.text(), Some("one"));
    assert_eq!(transport.acks().len(), 1);
    assert_eq!(session.pending_acknowledgements(), 0);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn receive_preserves_arrival_order() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    for sequence in 1..=100 {
        session.on_dispatch(text_dispatch(consumer.id(), sequence, "payload"))?;
    }

    let mut received = Vec::new();
    for _ in 0..100 {
        received.push(receive_expect!(consumer.receive()));
    }

    assert_eq!(sequences(&received), (1..=100).collect::<Vec<_>>());
    assert!(consumer.receive_no_wait()?.is_none());
    Ok(())
}

#[rstest]
#[case::pull(false)]
#[case::listener(true)]
fn expired_messages_are_never_observed(#[case] with_listener: bool) -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    let listener = CollectingListener::new();
    if with_listener {
        consumer.set_listener(listener.clone())?;
    }

    let outcome = session.on_dispatch(expired_dispatch(consumer.id(), 1))?;
    assert_eq!(outcome, DispatchOutcome::Expired);
    session.on_dispatch(text_dispatch(consumer.id(), 2, "live"))?;

    let observed = if with_listener {
        listener.messages()
    } else {
        let mut out = Vec::new();
        while let Some(message) = consumer.receive_no_wait()? {
            out.push(message);
        }
        out
    };
    assert_eq!(sequences(&observed), vec![2]);
    assert_eq!(transport.acks().len(), 1, "only the live message is acknowledged");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn receive_timeout_elapses_without_message() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    let started = tokio::time::Instant::now();

    let received = consumer.receive_timeout(Duration::from_millis(500)).await?;

    assert!(received.is_none());
    assert!(started.elapsed() >= Duration::from_millis(500));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn receive_timeout_keeps_its_deadline_after_a_wasted_wake() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    let started = tokio::time::Instant::now();
    let waiter = tokio::spawn({
        let consumer = consumer.clone();
        async move {
            let received = consumer.receive_timeout(Duration::from_millis(500)).await;
            (received, started.elapsed())
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    session.on_dispatch(text_dispatch(consumer.id(), 1, "taken"))?;
    let taken = consumer.receive_no_wait()?;

    let (received, elapsed) = waiter.await?;
    assert_eq!(taken.map(|m| m.id().sequence()), Some(1));
    assert!(matches!(received, Ok(None)));
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(600), "deadline restarted: {elapsed:?}");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn blocked_receive_wakes_when_message_arrives() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    let waiter = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.receive_timeout(Duration::ZERO).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    session.on_dispatch(text_dispatch(consumer.id(), 9, "late"))?;

    let received = tokio::time::timeout(Duration::from_secs(1), waiter).await??;
    assert_eq!(received?.map(|m| m.id().sequence()), Some(9));
    Ok(())
}

#[rstest]
#[case::consumer_close(false)]
#[case::session_close(true)]
#[tokio::test]
async fn close_wakes_blocked_receive_with_no_message(#[case] close_session: bool) -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    let waiter = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.receive().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    if close_session {
        session.close();
    } else {
        consumer.close();
    }

    let received = tokio::time::timeout(Duration::from_secs(1), waiter).await??;
    assert!(matches!(received, Ok(None)));
    assert!(consumer.is_closed());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn receive_on_closed_consumer_is_illegal() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    consumer.close();
    consumer.close();

    let result = consumer.receive_no_wait();
    assert!(matches!(
        result,
        Err(SessionError::IllegalState(IllegalState::ConsumerClosed))
    ));

    session.close();
    let result = consumer.receive().await;
    assert!(matches!(
        result,
        Err(SessionError::IllegalState(IllegalState::SessionClosed))
    ));
    Ok(())
}

#[rstest]
fn receive_with_listener_is_illegal() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    consumer.set_listener(CollectingListener::new())?;

    assert!(matches!(
        consumer.receive_no_wait(),
        Err(SessionError::IllegalState(IllegalState::ListenerRegistered))
    ));
    consumer.clear_listener()?;
    assert!(consumer.receive_no_wait()?.is_none());
    Ok(())
}

#[rstest]
fn listener_receives_messages_queued_before_registration() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    for sequence in 1..=3 {
        session.on_dispatch(text_dispatch(consumer.id(), sequence, "early"))?;
    }
    let listener = CollectingListener::new();

    consumer.set_listener(listener.clone())?;

    assert_eq!(sequences(&listener.messages()), vec![1, 2, 3]);
    assert_eq!(consumer.queued(), 0);
    Ok(())
}

#[rstest]
fn client_ack_is_cumulative() -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Client);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    for sequence in 1..=5 {
        session.on_dispatch(text_dispatch(consumer.id(), sequence, "m"))?;
    }
    let mut received = Vec::new();
    while let Some(message) = consumer.receive_no_wait()? {
        received.push(message);
    }
    assert_eq!(received.len(), 5);
    assert!(transport.acks().is_empty());

    received[2].acknowledge()?;

    assert_eq!(session.pending_acknowledgements(), 2);
    let acks = transport.acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].kind, AckKind::Standard);
    assert_eq!(acks[0].first, received[0].id());
    assert_eq!(acks[0].last, received[2].id());
    assert_eq!(acks[0].count, 3);

    received[1].acknowledge()?;
    assert_eq!(transport.acks().len(), 1, "covered messages are not acked twice");

    received[4].acknowledge()?;
    assert_eq!(session.pending_acknowledgements(), 0);
    assert_eq!(transport.acks()[1].count, 2);
    Ok(())
}

#[rstest]
fn individual_ack_covers_one_message() -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Individual);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    for sequence in 1..=3 {
        session.on_dispatch(text_dispatch(consumer.id(), sequence, "m"))?;
    }
    let received: Vec<_> = (0..3)
        .filter_map(|_| consumer.receive_no_wait().ok().flatten())
        .collect();

    received[1].acknowledge()?;

    assert_eq!(session.pending_acknowledgements(), 2);
    let acks = transport.acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].kind, AckKind::Individual);
    assert_eq!(acks[0].first, received[1].id());
    assert_eq!(acks[0].last, received[1].id());
    Ok(())
}

#[rstest]
fn failed_client_ack_leaves_messages_pending() -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Client);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    for sequence in 1..=3 {
        session.on_dispatch(text_dispatch(consumer.id(), sequence, "m"))?;
    }
    let received: Vec<_> = (0..3)
        .filter_map(|_| consumer.receive_no_wait().ok().flatten())
        .collect();
    transport.fail_when(|command| matches!(command, WireCommand::MessageAck(_)));

    assert!(matches!(
        received[1].acknowledge(),
        Err(SessionError::Transport(_))
    ));
    assert_eq!(session.pending_acknowledgements(), 3);

    transport.heal();
    received[1].acknowledge()?;
    assert_eq!(session.pending_acknowledgements(), 1);
    assert_eq!(transport.acks()[0].count, 2);
    Ok(())
}

#[rstest]
#[case(AcknowledgeMode::Client)]
#[case(AcknowledgeMode::Individual)]
fn recover_redelivers_in_original_order(#[case] mode: AcknowledgeMode) -> TestResult {
    let (session, _transport) = session_with(mode);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    for sequence in 1..=4 {
        session.on_dispatch(text_dispatch(consumer.id(), sequence, "m"))?;
    }
    let first: Vec<_> = (0..2)
        .filter_map(|_| consumer.receive_no_wait().ok().flatten())
        .collect();

    session.recover()?;

    let mut second = Vec::new();
    while let Some(message) = consumer.receive_no_wait()? {
        second.push(message);
    }
    assert_eq!(sequences(&second), vec![1, 2, 3, 4]);
    for (before, after) in first.iter().zip(&second) {
        assert_eq!(before.id(), after.id());
        assert_eq!(after.redelivery_count(), before.redelivery_count() + 1);
        assert!(after.is_redelivered());
    }
    assert!(!second[2].is_redelivered());
    Ok(())
}

#[rstest]
fn acknowledge_after_session_close_is_illegal() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Client);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    session.on_dispatch(text_dispatch(consumer.id(), 1, "m"))?;
    let message = consumer.receive_no_wait()?.ok_or("queued message")?;

    session.close();

    assert!(matches!(
        message.acknowledge(),
        Err(SessionError::IllegalState(IllegalState::SessionClosed))
    ));
    Ok(())
}

#[rstest]
fn panicking_auto_listener_gets_message_again() -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let collected = CollectingListener::new();
    consumer.set_listener({
        let calls = Arc::clone(&calls);
        let collected = collected.clone();
        move |message: &Message| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("listener failure");
            }
            brokerwire::MessageListener::on_message(&collected, message);
        }
    })?;

    session.on_dispatch(text_dispatch(consumer.id(), 1, "retry me"))?;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let messages = collected.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].redelivery_count(), 1);
    assert_eq!(transport.acks_of(AckKind::Standard).len(), 1);
    Ok(())
}

#[rstest]
fn redelivery_limit_poisons_message() -> TestResult {
    let config = ConnectionConfig::default().max_redeliveries(Some(1));
    let (session, transport) = session_with_config(AcknowledgeMode::Auto, config);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    let calls = Arc::new(AtomicUsize::new(0));
    consumer.set_listener({
        let calls = Arc::clone(&calls);
        move |_: &Message| {
            calls.fetch_add(1, Ordering::SeqCst);
            panic!("always fails");
        }
    })?;

    session.on_dispatch(text_dispatch(consumer.id(), 1, "poison"))?;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let poison = transport.acks_of(AckKind::Poison);
    assert_eq!(poison.len(), 1);
    assert_eq!(poison[0].first.sequence(), 1);
    assert_eq!(consumer.queued(), 0);
    Ok(())
}

#[rstest]
fn dispatch_to_closed_consumer_is_returned_to_broker() -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;
    session.on_dispatch(text_dispatch(consumer.id(), 1, "queued"))?;
    consumer.close();

    let outcome = session.on_dispatch(text_dispatch(consumer.id(), 2, "late"))?;

    assert_eq!(outcome, DispatchOutcome::Returned);
    let returned: Vec<_> = transport
        .redelivers()
        .iter()
        .map(|r| r.message_id.sequence())
        .collect();
    assert_eq!(returned, vec![1, 2]);
    Ok(())
}

#[rstest]
#[case::never_created(ConsumerId::new(SessionId::new(ConnectionId::new(1), 1), 7))]
#[case::zero(ConsumerId::new(SessionId::new(ConnectionId::new(1), 1), 0))]
#[case::other_session(ConsumerId::new(SessionId::new(ConnectionId::new(1), 2), 1))]
fn unresolvable_dispatch_is_a_protocol_violation(#[case] target: ConsumerId) -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Auto);
    let _consumer = session.create_consumer(TEST_QUEUE, None)?;

    let result = session.on_dispatch(text_dispatch(target, 1, "stray"));

    assert!(matches!(result, Err(SessionError::ProtocolViolation(_))));
    assert!(transport.redelivers().is_empty());
    assert!(!session.is_closed());
    Ok(())
}

#[rstest]
fn dispatch_without_message_is_a_protocol_violation() -> TestResult {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    let consumer = session.create_consumer(TEST_QUEUE, None)?;

    let result = session.on_dispatch(MessageDispatch {
        consumer_id: consumer.id(),
        message: None,
    });

    assert!(matches!(result, Err(SessionError::ProtocolViolation(_))));
    Ok(())
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("topic://")]
#[case("bogus://name")]
fn malformed_destination_is_rejected(#[case] destination: &str) {
    let (session, _transport) = session_with(AcknowledgeMode::Auto);
    assert!(matches!(
        session.create_consumer(destination, None),
        Err(SessionError::InvalidDestination(_))
    ));
    assert!(matches!(
        session.create_producer(destination),
        Err(SessionError::InvalidDestination(_))
    ));
}

#[rstest]
fn consumer_accessors_reflect_creation() -> TestResult {
    let (session, transport) = session_with(AcknowledgeMode::Auto);
    let plain = session.create_consumer(TEST_QUEUE, None)?;
    let selective = session.create_consumer("topic://prices", Some("region = 'EU'"))?;

    assert_eq!(plain.selector(), "");
    assert_eq!(selective.selector(), "region = 'EU'");
    assert!(selective.destination().kind().is_topic());
    assert_ne!(plain.id(), selective.id());
    let infos = transport
        .commands()
        .into_iter()
        .filter(|c| matches!(c, WireCommand::ConsumerInfo(_)))
        .count();
    assert_eq!(infos, 2);
    Ok(())
}
