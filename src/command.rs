//! Commands exchanged with the broker over the transport.
//!
//! Framing and marshalling are the transport's concern; this module only
//! fixes the closed set of commands the session engine produces and
//! consumes.

use derive_more::Display;

use crate::{
    destination::Destination,
    id::{ConsumerId, MessageId, ProducerId, SessionId, TransactionId},
    message::Message,
};

/// Broker-to-client delivery of one message to one consumer.
///
/// A dispatch without a message is a shape the session cannot resolve and
/// is dropped as a protocol violation.
#[derive(Clone, Debug)]
pub struct MessageDispatch {
    pub consumer_id: ConsumerId,
    pub message: Option<Message>,
}

impl MessageDispatch {
    #[must_use]
    pub fn new(consumer_id: ConsumerId, message: Message) -> Self {
        Self {
            consumer_id,
            message: Some(message),
        }
    }
}

/// How the broker should treat the acknowledged range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum AckKind {
    /// Consumed; covers every message from `first` to `last`.
    #[display("standard")]
    Standard,
    /// Consumed; covers exactly one message.
    #[display("individual")]
    Individual,
    /// Redelivery limit exceeded; the broker should dead-letter the message.
    #[display("poison")]
    Poison,
}

/// Acknowledgement of a contiguous range of messages for one consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageAck {
    pub consumer_id: ConsumerId,
    pub destination: Destination,
    pub kind: AckKind,
    pub first: MessageId,
    pub last: MessageId,
    pub count: u32,
    pub transaction: Option<TransactionId>,
}

/// Phase of a local transaction announced to the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum TransactionKind {
    #[display("begin")]
    Begin,
    #[display("commit")]
    CommitOnePhase,
    #[display("rollback")]
    Rollback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionInfo {
    pub id: TransactionId,
    pub kind: TransactionKind,
}

/// Hands an undeliverable dispatch back to the broker so it can be
/// redelivered elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Redeliver {
    pub consumer_id: ConsumerId,
    pub message_id: MessageId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerInfo {
    pub id: ConsumerId,
    pub destination: Destination,
    pub selector: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProducerInfo {
    pub id: ProducerId,
    pub destination: Destination,
}

/// Resource being torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveInfo {
    Session(SessionId),
    Consumer(ConsumerId),
    Producer(ProducerId),
}

/// Every command the engine sends or accepts.
#[derive(Clone, Debug)]
pub enum WireCommand {
    Dispatch(MessageDispatch),
    Message(Message),
    MessageAck(MessageAck),
    Transaction(TransactionInfo),
    Redeliver(Redeliver),
    SessionInfo(SessionId),
    ConsumerInfo(ConsumerInfo),
    ProducerInfo(ProducerInfo),
    Remove(RemoveInfo),
}

/// Discriminant of a [`WireCommand`], used in logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum WireCommandKind {
    #[display("dispatch")]
    Dispatch,
    #[display("message")]
    Message,
    #[display("ack")]
    MessageAck,
    #[display("transaction")]
    Transaction,
    #[display("redeliver")]
    Redeliver,
    #[display("session-info")]
    SessionInfo,
    #[display("consumer-info")]
    ConsumerInfo,
    #[display("producer-info")]
    ProducerInfo,
    #[display("remove")]
    Remove,
}

impl WireCommand {
    #[must_use]
    pub const fn kind(&self) -> WireCommandKind {
        match self {
            Self::Dispatch(_) => WireCommandKind::Dispatch,
            Self::Message(_) => WireCommandKind::Message,
            Self::MessageAck(_) => WireCommandKind::MessageAck,
            Self::Transaction(_) => WireCommandKind::Transaction,
            Self::Redeliver(_) => WireCommandKind::Redeliver,
            Self::SessionInfo(_) => WireCommandKind::SessionInfo,
            Self::ConsumerInfo(_) => WireCommandKind::ConsumerInfo,
            Self::ProducerInfo(_) => WireCommandKind::ProducerInfo,
            Self::Remove(_) => WireCommandKind::Remove,
        }
    }
}
