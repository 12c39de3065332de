//! Acknowledgement, commit, rollback and redelivery.

use std::{mem, sync::Arc};

use log::warn;
use tracing::debug;

use super::{
    IllegalState,
    Session,
    SessionError,
    SessionInner,
    TransactionError,
    state::SessionState,
};
use crate::{
    ack::{AckState, Delivery, DeliveryArena, DeliveryTag, TransactionContext, group_acks},
    command::{AckKind, MessageAck, TransactionInfo, TransactionKind, WireCommand},
    consumer::ConsumerCore,
    id::{ConsumerId, TransactionId},
    message::Message,
    transport::TransportError,
};

/// A commit that stopped part way. `began` records whether the broker saw
/// the transaction start.
struct CommitFailure {
    began: bool,
    error: TransportError,
}

impl Session {
    /// Apply every buffered acknowledgement and release every buffered send,
    /// then start a fresh transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the session is not
    /// transacted or is closed. Returns [`SessionError::Transaction`] if the
    /// commit could not be sent; the transaction is then rolled back and its
    /// messages redelivered.
    pub fn commit(&self) -> Result<(), SessionError> { self.inner.commit() }

    /// Discard buffered sends and redeliver every message received in the
    /// transaction, in original order, then start a fresh transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the session is not
    /// transacted or is closed.
    pub fn rollback(&self) -> Result<(), SessionError> { self.inner.rollback() }

    /// Redeliver every unacknowledged message, in original order. Has no
    /// effect in AUTO mode, where nothing stays unacknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the session is transacted
    /// or closed.
    pub fn recover(&self) -> Result<(), SessionError> { self.inner.recover() }
}

impl SessionInner {
    /// Acknowledge the delivery behind `tag` according to the session mode.
    pub(crate) fn acknowledge(&self, tag: DeliveryTag) -> Result<(), SessionError> {
        let mut state = self.lock_state();
        state.ensure_open()?;
        let SessionState { arena, acks, .. } = &mut *state;
        let (ledger, deliveries, kind) = match acks {
            AckState::Client(ledger) => {
                let deliveries = ledger.take_through(tag);
                (ledger, deliveries, AckKind::Standard)
            }
            AckState::Individual(ledger) => {
                let deliveries: Vec<_> = ledger.take_one(tag).into_iter().collect();
                (ledger, deliveries, AckKind::Individual)
            }
            AckState::Auto | AckState::Transacted(_) => return Ok(()),
        };
        if deliveries.is_empty() {
            return Ok(());
        }
        for ack in group_acks(&deliveries, arena, kind, None) {
            if let Err(e) = self.transport.send_command(WireCommand::MessageAck(ack)) {
                warn!("acknowledgement failed: session={}, error={e}", self.id);
                ledger.restore(deliveries);
                return Err(e.into());
            }
        }
        for delivery in &deliveries {
            arena.take(delivery.tag);
        }
        debug!(session = %self.id, count = deliveries.len(), %kind, "messages acknowledged");
        Ok(())
    }

    fn commit(self: &Arc<Self>) -> Result<(), SessionError> {
        let (to_pump, result) = {
            let mut state = self.lock_state();
            state.ensure_open()?;
            let SessionState { arena, acks, .. } = &mut *state;
            let AckState::Transacted(active) = acks else {
                return Err(IllegalState::NotTransacted.into());
            };
            let mut settling = mem::replace(active, TransactionContext::new(self.next_transaction_id()));
            let id = settling.id();
            let (deliveries, sends) = settling.begin_commit();
            match self.send_commit(id, arena, &deliveries, sends) {
                Ok(()) => {
                    for delivery in &deliveries {
                        arena.take(delivery.tag);
                    }
                    debug!(session = %self.id, transaction = %id, acks = deliveries.len(), "transaction committed");
                    return Ok(());
                }
                Err(CommitFailure { began, error }) => {
                    if began {
                        self.send_best_effort(WireCommand::Transaction(TransactionInfo {
                            id,
                            kind: TransactionKind::Rollback,
                        }));
                    }
                    warn!(
                        "commit failed: session={}, transaction={id}, error={error}",
                        self.id
                    );
                    let messages = take_messages(arena, deliveries);
                    (
                        self.redeliver_messages(&mut state, messages),
                        Err(TransactionError::Send(error).into()),
                    )
                }
            }
        };
        for core in to_pump {
            self.pump(&core);
        }
        result
    }

    /// Send one transaction to the broker. An empty transaction sends
    /// nothing.
    fn send_commit(
        &self,
        id: TransactionId,
        arena: &DeliveryArena,
        deliveries: &[Delivery],
        sends: Vec<Message>,
    ) -> Result<(), CommitFailure> {
        if deliveries.is_empty() && sends.is_empty() {
            return Ok(());
        }
        let send = |command, began| {
            self.transport
                .send_command(command)
                .map_err(|error| CommitFailure { began, error })
        };
        send(
            WireCommand::Transaction(TransactionInfo {
                id,
                kind: TransactionKind::Begin,
            }),
            false,
        )?;
        for message in sends {
            send(WireCommand::Message(message), true)?;
        }
        for ack in group_acks(deliveries, arena, AckKind::Standard, Some(id)) {
            send(WireCommand::MessageAck(ack), true)?;
        }
        send(
            WireCommand::Transaction(TransactionInfo {
                id,
                kind: TransactionKind::CommitOnePhase,
            }),
            true,
        )
    }

    fn rollback(self: &Arc<Self>) -> Result<(), SessionError> {
        let to_pump = {
            let mut state = self.lock_state();
            state.ensure_open()?;
            if !matches!(state.acks, AckState::Transacted(_)) {
                return Err(IllegalState::NotTransacted.into());
            }
            self.rollback_locked(&mut state)
        };
        for core in to_pump {
            self.pump(&core);
        }
        Ok(())
    }

    /// Replace the active transaction and redeliver what it received.
    /// Does nothing outside TRANSACTED mode.
    pub(super) fn rollback_locked(&self, state: &mut SessionState) -> Vec<Arc<ConsumerCore>> {
        let SessionState { arena, acks, .. } = &mut *state;
        let AckState::Transacted(active) = acks else {
            return Vec::new();
        };
        let mut settling = mem::replace(active, TransactionContext::new(self.next_transaction_id()));
        let deliveries = settling.begin_rollback();
        debug!(
            session = %self.id,
            transaction = %settling.id(),
            state = %settling.state(),
            redeliveries = deliveries.len(),
            "transaction rolled back"
        );
        let messages = take_messages(arena, deliveries);
        self.redeliver_messages(state, messages)
    }

    fn recover(self: &Arc<Self>) -> Result<(), SessionError> {
        let to_pump = {
            let mut state = self.lock_state();
            state.ensure_open()?;
            let deliveries = match &mut state.acks {
                AckState::Transacted(_) => return Err(IllegalState::Transacted.into()),
                AckState::Auto => Vec::new(),
                AckState::Client(ledger) | AckState::Individual(ledger) => ledger.take_all(),
            };
            debug!(session = %self.id, redeliveries = deliveries.len(), "session recovered");
            let messages = take_messages(&mut state.arena, deliveries);
            self.redeliver_messages(&mut state, messages)
        };
        for core in to_pump {
            self.pump(&core);
        }
        Ok(())
    }

    /// Put `messages` back at the head of their consumers' queues in the
    /// given order, with the redelivery counter bumped.
    ///
    /// Messages past the redelivery limit are poison-acknowledged instead,
    /// and messages whose consumer has gone are returned to the broker.
    /// Returns the consumers whose listeners now have work.
    pub(super) fn redeliver_messages(
        &self,
        state: &mut SessionState,
        messages: Vec<(ConsumerId, Message)>,
    ) -> Vec<Arc<ConsumerCore>> {
        let mut groups: Vec<(ConsumerId, Vec<Message>)> = Vec::new();
        let mut redelivered = 0_u64;
        for (consumer_id, mut message) in messages {
            message.prepare_redelivery();
            if self
                .config
                .exceeds_redelivery_limit(message.redelivery_count())
            {
                self.poison(consumer_id, &message);
                continue;
            }
            redelivered += 1;
            match groups.iter_mut().find(|(id, _)| *id == consumer_id) {
                Some((_, group)) => group.push(message),
                None => groups.push((consumer_id, vec![message])),
            }
        }
        crate::metrics::inc_redelivered(redelivered);

        let mut to_pump = Vec::new();
        for (consumer_id, group) in groups {
            let returned = match state.consumers.get(&consumer_id) {
                Some(core) => match core.queue.requeue_front(group) {
                    Ok(()) => {
                        if core.has_listener() {
                            to_pump.push(Arc::clone(core));
                        }
                        continue;
                    }
                    Err(group) => group,
                },
                None => group,
            };
            for message in returned {
                self.return_to_broker(consumer_id, message.id());
            }
        }
        to_pump
    }

    fn poison(&self, consumer_id: ConsumerId, message: &Message) {
        warn!(
            "redelivery limit exceeded: consumer={consumer_id}, message={}, redeliveries={}",
            message.id(),
            message.redelivery_count()
        );
        self.send_best_effort(WireCommand::MessageAck(MessageAck {
            consumer_id,
            destination: message.destination().clone(),
            kind: AckKind::Poison,
            first: message.id(),
            last: message.id(),
            count: 1,
            transaction: None,
        }));
    }
}

/// Pull the message data for `deliveries` out of the arena, oldest first.
fn take_messages(
    arena: &mut DeliveryArena,
    mut deliveries: Vec<Delivery>,
) -> Vec<(ConsumerId, Message)> {
    deliveries.sort_by_key(|delivery| delivery.tag);
    deliveries
        .into_iter()
        .filter_map(|delivery| {
            arena
                .take(delivery.tag)
                .map(|message| (delivery.consumer_id, message))
        })
        .collect()
}
