//! Identity tuples naming connections, sessions, endpoints and messages.
//!
//! Every id embeds its parent, so a [`MessageId`] alone is enough to locate
//! the producer, session and connection that created it. Equality is
//! structural and survives redelivery.

use std::sync::atomic::{AtomicU64, Ordering};

use derive_more::{Display, From, Into};

/// Identifier of a broker connection.
///
/// # Examples
///
/// ```
/// use brokerwire::id::ConnectionId;
/// let id = ConnectionId::new(7);
/// assert_eq!(id.get(), 7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
#[display("{_0}")]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

/// `(connection, value)` pair naming a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{connection}:{value}")]
pub struct SessionId {
    connection: ConnectionId,
    value: u64,
}

impl SessionId {
    #[must_use]
    pub const fn new(connection: ConnectionId, value: u64) -> Self { Self { connection, value } }

    #[must_use]
    pub const fn connection_id(self) -> ConnectionId { self.connection }

    #[must_use]
    pub const fn value(self) -> u64 { self.value }
}

/// `(connection, session, value)` triple naming a consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{session}:{value}")]
pub struct ConsumerId {
    session: SessionId,
    value: u64,
}

impl ConsumerId {
    #[must_use]
    pub const fn new(session: SessionId, value: u64) -> Self { Self { session, value } }

    #[must_use]
    pub const fn session_id(self) -> SessionId { self.session }

    #[must_use]
    pub const fn value(self) -> u64 { self.value }
}

/// `(connection, session, value)` triple naming a producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{session}:{value}")]
pub struct ProducerId {
    session: SessionId,
    value: u64,
}

impl ProducerId {
    #[must_use]
    pub const fn new(session: SessionId, value: u64) -> Self { Self { session, value } }

    #[must_use]
    pub const fn session_id(self) -> SessionId { self.session }

    #[must_use]
    pub const fn value(self) -> u64 { self.value }
}

/// Globally unique message identity: the producer plus its send sequence.
///
/// # Examples
///
/// ```
/// use brokerwire::id::{ConnectionId, MessageId, ProducerId, SessionId};
///
/// let session = SessionId::new(ConnectionId::new(1), 2);
/// let producer = ProducerId::new(session, 3);
/// let first = MessageId::new(producer, 1);
/// let second = MessageId::new(producer, 2);
/// assert!(first < second);
/// assert_eq!(first.to_string(), "ID:1:2:3:1");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("ID:{producer}:{sequence}")]
pub struct MessageId {
    producer: ProducerId,
    sequence: u64,
}

impl MessageId {
    #[must_use]
    pub const fn new(producer: ProducerId, sequence: u64) -> Self { Self { producer, sequence } }

    #[must_use]
    pub const fn producer_id(self) -> ProducerId { self.producer }

    #[must_use]
    pub const fn sequence(self) -> u64 { self.sequence }
}

/// Local transaction identifier scoped to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("TX:{connection}:{value}")]
pub struct TransactionId {
    connection: ConnectionId,
    value: u64,
}

impl TransactionId {
    #[must_use]
    pub const fn new(connection: ConnectionId, value: u64) -> Self { Self { connection, value } }

    #[must_use]
    pub const fn connection_id(self) -> ConnectionId { self.connection }

    #[must_use]
    pub const fn value(self) -> u64 { self.value }
}

/// Monotonic counter handing out the `value` part of child ids.
///
/// The first value returned is `1`.
#[derive(Debug, Default)]
pub(crate) struct Sequence(AtomicU64);

impl Sequence {
    pub(crate) fn next(&self) -> u64 { self.0.fetch_add(1, Ordering::Relaxed) + 1 }

    /// Highest value handed out so far, `0` if none.
    pub(crate) fn current(&self) -> u64 { self.0.load(Ordering::Relaxed) }
}
