//! Acknowledgement and transaction bookkeeping.
//!
//! A session records every message it hands to the application as a
//! [`Delivery`]. What happens next depends on its [`AcknowledgeMode`]:
//! AUTO acknowledges on hand-off and keeps nothing, CLIENT and INDIVIDUAL
//! keep deliveries in a [`DeliveryLedger`] until the application
//! acknowledges them, and TRANSACTED keeps them in the active
//! [`TransactionContext`] until commit or rollback.
//!
//! The ledger and transaction hold only identities. Message data needed
//! for redelivery lives in the session's [`DeliveryArena`] and is removed
//! once a delivery is finally acknowledged.

mod arena;
mod ledger;
mod transaction;

use derive_more::Display;

pub(crate) use arena::DeliveryArena;
pub(crate) use ledger::DeliveryLedger;
pub(crate) use transaction::TransactionState;
pub(crate) use transaction::TransactionContext;

use crate::{
    command::{AckKind, MessageAck},
    id::{ConsumerId, MessageId, TransactionId},
};

/// Acknowledgement contract of a session, fixed at creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display)]
pub enum AcknowledgeMode {
    /// Each message is acknowledged as it is handed to the application.
    #[default]
    #[display("auto")]
    Auto,
    /// Acknowledging a message acknowledges everything delivered before it.
    #[display("client")]
    Client,
    /// Acknowledging a message acknowledges only that message.
    #[display("individual")]
    Individual,
    /// Acknowledgements are buffered and resolved by commit or rollback.
    #[display("transacted")]
    Transacted,
}

/// Session-local handle for one hand-off, unique even when the broker
/// dispatches the same [`MessageId`] twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct DeliveryTag(u64);

/// One message handed to the application and not yet settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub(crate) tag: DeliveryTag,
    pub(crate) message_id: MessageId,
    pub(crate) consumer_id: ConsumerId,
}

/// Per-mode acknowledgement state held by a session.
#[derive(Debug)]
pub(crate) enum AckState {
    Auto,
    Client(DeliveryLedger),
    Individual(DeliveryLedger),
    Transacted(TransactionContext),
}

impl AckState {
    pub(crate) fn for_mode(mode: AcknowledgeMode, transaction: TransactionId) -> Self {
        match mode {
            AcknowledgeMode::Auto => Self::Auto,
            AcknowledgeMode::Client => Self::Client(DeliveryLedger::default()),
            AcknowledgeMode::Individual => Self::Individual(DeliveryLedger::default()),
            AcknowledgeMode::Transacted => Self::Transacted(TransactionContext::new(transaction)),
        }
    }

    /// Number of deliveries awaiting acknowledgement.
    pub(crate) fn pending(&self) -> usize {
        match self {
            Self::Auto => 0,
            Self::Client(ledger) | Self::Individual(ledger) => ledger.len(),
            Self::Transacted(tx) => tx.pending_acks(),
        }
    }
}

/// Collapse `deliveries` into one acknowledgement per consumer, preserving
/// the order in which consumers first appear.
///
/// Deliveries whose message data is no longer in `arena` are skipped.
pub(crate) fn group_acks(
    deliveries: &[Delivery],
    arena: &DeliveryArena,
    kind: AckKind,
    transaction: Option<TransactionId>,
) -> Vec<MessageAck> {
    let mut acks: Vec<MessageAck> = Vec::new();
    for delivery in deliveries {
        let Some(message) = arena.get(delivery.tag) else {
            continue;
        };
        if let Some(ack) = acks
            .iter_mut()
            .find(|ack| ack.consumer_id == delivery.consumer_id)
        {
            ack.last = delivery.message_id;
            ack.count = ack.count.saturating_add(1);
        } else {
            acks.push(MessageAck {
                consumer_id: delivery.consumer_id,
                destination: message.destination().clone(),
                kind,
                first: delivery.message_id,
                last: delivery.message_id,
                count: 1,
                transaction,
            });
        }
    }
    acks
}
