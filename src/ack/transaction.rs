//! Buffered acknowledgements and sends of one local transaction.

use derive_more::Display;

use super::{Delivery, DeliveryLedger};
use crate::{id::TransactionId, message::Message};

/// Lifecycle phase of a local transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub(crate) enum TransactionState {
    #[display("active")]
    Active,
    #[display("committing")]
    Committing,
    #[display("rolling-back")]
    RollingBack,
}

/// The unit a TRANSACTED session commits or rolls back.
///
/// A session always holds exactly one `Active` context. Commit and rollback
/// swap in a fresh one and then settle the old context, so deliveries that
/// arrive afterwards can never join a transaction that is being resolved.
#[derive(Debug)]
pub(crate) struct TransactionContext {
    id: TransactionId,
    state: TransactionState,
    acks: DeliveryLedger,
    sends: Vec<Message>,
}

impl TransactionContext {
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            acks: DeliveryLedger::default(),
            sends: Vec::new(),
        }
    }

    pub(crate) const fn id(&self) -> TransactionId { self.id }

    pub(crate) const fn state(&self) -> TransactionState { self.state }

    pub(crate) fn record_delivery(&mut self, delivery: Delivery) {
        debug_assert_eq!(self.state, TransactionState::Active);
        self.acks.record(delivery);
    }

    pub(crate) fn buffer_send(&mut self, message: Message) {
        debug_assert_eq!(self.state, TransactionState::Active);
        self.sends.push(message);
    }

    pub(crate) fn pending_acks(&self) -> usize { self.acks.len() }

    #[cfg(test)]
    pub(crate) fn pending_sends(&self) -> usize { self.sends.len() }

    /// Whether the transaction has anything to resolve.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool { self.acks.is_empty() && self.sends.is_empty() }

    /// Enter `Committing` and hand over the buffered work in order.
    pub(crate) fn begin_commit(&mut self) -> (Vec<Delivery>, Vec<Message>) {
        self.state = TransactionState::Committing;
        (self.acks.take_all(), std::mem::take(&mut self.sends))
    }

    /// Enter `RollingBack`, discard buffered sends and return the deliveries
    /// that must be redelivered, oldest first.
    pub(crate) fn begin_rollback(&mut self) -> Vec<Delivery> {
        self.state = TransactionState::RollingBack;
        self.sends.clear();
        self.acks.take_all()
    }
}
