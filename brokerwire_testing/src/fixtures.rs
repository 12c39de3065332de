//! Message and session builders for tests.

use std::sync::Arc;

use brokerwire::{
    AcknowledgeMode,
    ConnectionConfig,
    command::MessageDispatch,
    destination::Destination,
    id::{ConnectionId, ConsumerId, MessageId, ProducerId, SessionId},
    message::Message,
    session::Session,
};
use rstest::fixture;

use crate::RecordingTransport;

/// Name of the queue used by the message builders.
pub const TEST_QUEUE: &str = "test.queue";

/// Producer standing in for a remote sender on the broker side.
#[must_use]
pub fn remote_producer() -> ProducerId {
    ProducerId::new(SessionId::new(ConnectionId::new(99), 1), 1)
}

/// Text message with sequence number `sequence` from [`remote_producer`].
///
/// # Panics
///
/// Never; [`TEST_QUEUE`] is a valid queue name.
#[must_use]
pub fn text_message(sequence: u64, text: &str) -> Message {
    Message::new(
        MessageId::new(remote_producer(), sequence),
        Destination::queue(TEST_QUEUE).expect("valid test queue"),
    )
    .with_text(text)
}

/// Dispatch of [`text_message`] to `consumer`.
#[must_use]
pub fn text_dispatch(consumer: ConsumerId, sequence: u64, text: &str) -> MessageDispatch {
    MessageDispatch::new(consumer, text_message(sequence, text))
}

/// Dispatch of a message that expired long ago.
#[must_use]
pub fn expired_dispatch(consumer: ConsumerId, sequence: u64) -> MessageDispatch {
    MessageDispatch::new(
        consumer,
        text_message(sequence, "expired").with_expiration(1),
    )
}

/// Id for the first session of connection 1.
#[must_use]
pub fn session_id() -> SessionId { SessionId::new(ConnectionId::new(1), 1) }

/// Session in `mode` over a fresh [`RecordingTransport`].
#[must_use]
pub fn session_with(mode: AcknowledgeMode) -> (Session, Arc<RecordingTransport>) {
    session_with_config(mode, ConnectionConfig::default())
}

/// Session in `mode` with `config` over a fresh [`RecordingTransport`].
#[must_use]
pub fn session_with_config(
    mode: AcknowledgeMode,
    config: ConnectionConfig,
) -> (Session, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new();
    let session = Session::with_config(session_id(), mode, transport.clone(), config);
    (session, transport)
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn recording_transport() -> Arc<RecordingTransport> { RecordingTransport::new() }
