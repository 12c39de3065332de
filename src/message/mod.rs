//! Wire-level message envelope.
//!
//! A [`Message`] pairs a body with its header set: identity, destination,
//! typed properties, timing and the redelivery counter. Everything except
//! the redelivery counter is fixed once the broker dispatches it.

mod ack;

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

pub(crate) use ack::Acknowledger;

use crate::{
    destination::Destination,
    id::{MessageId, TransactionId},
    session::SessionError,
    value::{FromPrimitive, PrimitiveMap, PrimitiveValue, PropertyError},
};

/// Payload carried by a [`Message`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum MessageBody {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Map(PrimitiveMap),
}

/// A broker message as seen by the client.
///
/// # Examples
///
/// ```
/// use brokerwire::{
///     destination::Destination,
///     id::{ConnectionId, MessageId, ProducerId, SessionId},
///     message::Message,
/// };
///
/// let producer = ProducerId::new(SessionId::new(ConnectionId::new(1), 1), 1);
/// let message = Message::new(MessageId::new(producer, 1), Destination::queue("orders")?)
///     .with_text("hello")
///     .with_property("attempt", 2i32);
/// assert_eq!(message.text(), Some("hello"));
/// assert_eq!(message.property::<i64>("attempt"), Ok(2));
/// assert!(!message.is_expired());
/// # Ok::<(), brokerwire::destination::DestinationError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Message {
    id: MessageId,
    destination: Destination,
    body: MessageBody,
    properties: PrimitiveMap,
    correlation_id: Option<String>,
    transaction: Option<TransactionId>,
    timestamp: u64,
    expiration: u64,
    redelivery_count: u32,
    acknowledger: Option<Acknowledger>,
}

impl Message {
    /// Create a message with an empty body that never expires.
    #[must_use]
    pub fn new(id: MessageId, destination: Destination) -> Self {
        Self {
            id,
            destination,
            body: MessageBody::Empty,
            properties: PrimitiveMap::new(),
            correlation_id: None,
            transaction: None,
            timestamp: 0,
            expiration: 0,
            redelivery_count: 0,
            acknowledger: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: MessageBody) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_body(MessageBody::Text(text.into()))
    }

    #[must_use]
    pub fn with_bytes(self, bytes: impl Into<Bytes>) -> Self {
        self.with_body(MessageBody::Bytes(bytes.into()))
    }

    /// Attach a typed property.
    #[must_use]
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PrimitiveValue>,
    ) -> Self {
        self.properties.set(key, value);
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set the send time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the absolute expiry in milliseconds since the Unix epoch; `0`
    /// means the message never expires.
    #[must_use]
    pub fn with_expiration(mut self, expiration: u64) -> Self {
        self.expiration = expiration;
        self
    }

    #[must_use]
    pub fn with_redelivery_count(mut self, count: u32) -> Self {
        self.redelivery_count = count;
        self
    }

    #[must_use]
    pub const fn id(&self) -> MessageId { self.id }

    #[must_use]
    pub fn destination(&self) -> &Destination { &self.destination }

    #[must_use]
    pub fn body(&self) -> &MessageBody { &self.body }

    /// Borrow the body as text, if it is a text body.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn properties(&self) -> &PrimitiveMap { &self.properties }

    /// Read a property through the primitive value codec.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError`] if the property is absent or cannot be read
    /// as `T`.
    pub fn property<T: FromPrimitive>(&self, key: &str) -> Result<T, PropertyError> {
        self.properties.get(key)
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> { self.correlation_id.as_deref() }

    /// Transaction the message was sent under, if any.
    #[must_use]
    pub const fn transaction_id(&self) -> Option<TransactionId> { self.transaction }

    #[must_use]
    pub const fn timestamp(&self) -> u64 { self.timestamp }

    #[must_use]
    pub const fn expiration(&self) -> u64 { self.expiration }

    #[must_use]
    pub const fn redelivery_count(&self) -> u32 { self.redelivery_count }

    /// Whether this delivery is a redelivery of an earlier one.
    #[must_use]
    pub const fn is_redelivered(&self) -> bool { self.redelivery_count > 0 }

    /// Whether the message had expired at `now` (milliseconds since epoch).
    #[must_use]
    pub const fn is_expired_at(&self, now: u64) -> bool {
        self.expiration != 0 && now >= self.expiration
    }

    /// Whether the message has expired according to the system clock.
    #[must_use]
    pub fn is_expired(&self) -> bool { self.is_expired_at(now_millis()) }

    /// Acknowledge this message according to its session's mode.
    ///
    /// In AUTO mode and for messages that did not arrive through a session
    /// this does nothing. In CLIENT mode it acknowledges every message the
    /// session delivered up to and including this one; in INDIVIDUAL mode
    /// only this one. TRANSACTED sessions resolve acknowledgements at
    /// commit, so the call has no immediate effect there either.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the session has closed and
    /// [`SessionError::Transport`] if the acknowledgement could not be sent.
    pub fn acknowledge(&self) -> Result<(), SessionError> {
        match &self.acknowledger {
            Some(acknowledger) => acknowledger.acknowledge(),
            None => Ok(()),
        }
    }

    pub(crate) fn stamp(
        &mut self,
        id: MessageId,
        destination: Destination,
        timestamp: u64,
        expiration: u64,
    ) {
        self.id = id;
        self.destination = destination;
        self.timestamp = timestamp;
        self.expiration = expiration;
    }

    pub(crate) fn set_transaction(&mut self, transaction: Option<TransactionId>) {
        self.transaction = transaction;
    }

    pub(crate) fn attach(&mut self, acknowledger: Acknowledger) {
        self.acknowledger = Some(acknowledger);
    }

    /// Strip the delivery handle and bump the redelivery counter.
    pub(crate) fn prepare_redelivery(&mut self) {
        self.acknowledger = None;
        self.redelivery_count = self.redelivery_count.saturating_add(1);
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
