//! Session coordinator.
//!
//! A [`Session`] owns its consumers and producers, fixes one
//! [`AcknowledgeMode`] for its lifetime and is the single entry point for
//! dispatches addressed to it. Dispatch, acknowledgement, commit, rollback
//! and close all serialize on one session lock, so a commit never races
//! with a dispatch joining the transaction being resolved. Each consumer's
//! queue has its own lock, always taken after the session lock when both
//! are held.

mod counter;
mod dispatch;
mod error;
mod settle;
mod state;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

pub use counter::active_session_count;
pub use dispatch::DispatchOutcome;
pub use error::{IllegalState, SessionError, TransactionError};
use log::{info, warn};
use state::SessionState;

use crate::{
    ack::{AckState, AcknowledgeMode},
    command::{ConsumerInfo, ProducerInfo, Redeliver, RemoveInfo, WireCommand},
    connection::ConnectionConfig,
    consumer::{ConsumerCore, MessageConsumer},
    destination::{Destination, DestinationKind, IntoDestination},
    id::{ConsumerId, MessageId, ProducerId, Sequence, SessionId, TransactionId},
    message::Message,
    producer::MessageProducer,
    transport::Transport,
};

/// Shared session internals, referenced by consumers, producers and the
/// acknowledgement handles of delivered messages.
pub(crate) struct SessionInner {
    id: SessionId,
    mode: AcknowledgeMode,
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    tx_ids: Arc<Sequence>,
    consumer_ids: Sequence,
    producer_ids: Sequence,
    temp_ids: Sequence,
    state: Mutex<SessionState>,
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_closed(&self) -> bool { self.lock_state().closed }

    fn next_transaction_id(&self) -> TransactionId {
        TransactionId::new(self.id.connection_id(), self.tx_ids.next())
    }

    /// Send a command whose loss the session can tolerate, logging failures.
    fn send_best_effort(&self, command: WireCommand) {
        let kind = command.kind();
        if let Err(e) = self.transport.send_command(command) {
            warn!(
                "transport send failed: session={}, command={kind}, error={e}",
                self.id
            );
        }
    }

    /// Hand a message the session cannot deliver back to the broker.
    fn return_to_broker(&self, consumer_id: ConsumerId, message_id: MessageId) {
        self.send_best_effort(WireCommand::Redeliver(Redeliver {
            consumer_id,
            message_id,
        }));
    }

    pub(crate) fn close_consumer(&self, id: ConsumerId) {
        let mut state = self.lock_state();
        let Some(core) = state.consumers.remove(&id) else {
            return;
        };
        for message in core.queue.close() {
            self.return_to_broker(id, message.id());
        }
        self.send_best_effort(WireCommand::Remove(RemoveInfo::Consumer(id)));
        drop(state);
        info!("consumer closed: id={id}");
    }

    pub(crate) fn producer_is_open(&self, id: ProducerId) -> bool {
        let state = self.lock_state();
        !state.closed && state.producers.contains(&id)
    }

    pub(crate) fn close_producer(&self, id: ProducerId) {
        let mut state = self.lock_state();
        if state.producers.remove(&id) {
            self.send_best_effort(WireCommand::Remove(RemoveInfo::Producer(id)));
            drop(state);
            info!("producer closed: id={id}");
        }
    }

    /// Send `message` now, or buffer it in the active transaction.
    pub(crate) fn send_message(
        &self,
        producer: ProducerId,
        mut message: Message,
    ) -> Result<(), SessionError> {
        let mut state = self.lock_state();
        state.ensure_open()?;
        if !state.producers.contains(&producer) {
            return Err(IllegalState::ProducerClosed.into());
        }
        if let AckState::Transacted(tx) = &mut state.acks {
            message.set_transaction(Some(tx.id()));
            tx.buffer_send(message);
            return Ok(());
        }
        self.transport
            .send_command(WireCommand::Message(message))
            .map_err(SessionError::from)
    }

    fn close(&self) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        // Redelivery obligations of an open transaction are honoured before
        // the consumers go away; whatever lands back in a queue is returned
        // to the broker below.
        let _ = self.rollback_locked(&mut state);

        let mut consumers: Vec<_> = state.consumers.drain().collect();
        consumers.sort_by_key(|(id, _)| *id);
        for (id, core) in consumers {
            for message in core.queue.close() {
                self.return_to_broker(id, message.id());
            }
            self.send_best_effort(WireCommand::Remove(RemoveInfo::Consumer(id)));
        }
        let mut producers: Vec<_> = state.producers.drain().collect();
        producers.sort();
        for id in producers {
            self.send_best_effort(WireCommand::Remove(RemoveInfo::Producer(id)));
        }

        if let AckState::Client(ledger) | AckState::Individual(ledger) = &mut state.acks {
            ledger.take_all();
        }
        state.arena.clear();
        self.send_best_effort(WireCommand::Remove(RemoveInfo::Session(self.id)));
        state.closed = true;
        state.active = None;
        drop(state);
        info!("session closed: id={}", self.id);
    }
}

impl fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInner")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A single-threaded context for producing and consuming messages.
///
/// Cloning yields another handle to the same session.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use brokerwire::{
///     ack::AcknowledgeMode,
///     id::{ConnectionId, SessionId},
///     session::Session,
///     transport::ChannelTransport,
/// };
///
/// let (transport, _outbound) = ChannelTransport::new();
/// let session = Session::new(
///     SessionId::new(ConnectionId::new(1), 1),
///     AcknowledgeMode::Client,
///     Arc::new(transport),
/// );
/// let consumer = session.create_consumer("orders", None)?;
/// assert_eq!(consumer.destination().name(), "orders");
/// assert!(session.commit().is_err());
/// # Ok::<(), brokerwire::session::SessionError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session with the default [`ConnectionConfig`].
    #[must_use]
    pub fn new(id: SessionId, mode: AcknowledgeMode, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(id, mode, transport, ConnectionConfig::default())
    }

    #[must_use]
    pub fn with_config(
        id: SessionId,
        mode: AcknowledgeMode,
        transport: Arc<dyn Transport>,
        config: ConnectionConfig,
    ) -> Self {
        Self::from_parts(id, mode, transport, config, Arc::new(Sequence::default()))
    }

    pub(crate) fn from_parts(
        id: SessionId,
        mode: AcknowledgeMode,
        transport: Arc<dyn Transport>,
        config: ConnectionConfig,
        tx_ids: Arc<Sequence>,
    ) -> Self {
        let first_tx = TransactionId::new(id.connection_id(), tx_ids.next());
        let inner = SessionInner {
            id,
            mode,
            transport,
            config,
            tx_ids,
            consumer_ids: Sequence::default(),
            producer_ids: Sequence::default(),
            temp_ids: Sequence::default(),
            state: Mutex::new(SessionState::new(id, AckState::for_mode(mode, first_tx))),
        };
        info!("session opened: id={id}, mode={mode}");
        Self {
            inner: Arc::new(inner),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self { Self { inner } }

    /// Apply a removal requested by the broker.
    pub(crate) fn remote_remove(&self, info: RemoveInfo) {
        match info {
            RemoveInfo::Session(_) => self.close(),
            RemoveInfo::Consumer(id) => self.inner.close_consumer(id),
            RemoveInfo::Producer(id) => self.inner.close_producer(id),
        }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<SessionInner> { Arc::downgrade(&self.inner) }

    #[must_use]
    pub fn id(&self) -> SessionId { self.inner.id }

    #[must_use]
    pub fn acknowledge_mode(&self) -> AcknowledgeMode { self.inner.mode }

    #[must_use]
    pub fn is_transacted(&self) -> bool { self.inner.mode == AcknowledgeMode::Transacted }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.inner.is_closed() }

    /// Number of delivered messages not yet acknowledged or committed.
    #[must_use]
    pub fn pending_acknowledgements(&self) -> usize { self.inner.lock_state().acks.pending() }

    /// Register a consumer on `destination`. An empty or blank selector is
    /// treated as none.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidDestination`] for a malformed
    /// destination, [`SessionError::IllegalState`] if the session is closed
    /// and [`SessionError::Transport`] if the broker could not be told.
    pub fn create_consumer(
        &self,
        destination: impl IntoDestination,
        selector: Option<&str>,
    ) -> Result<MessageConsumer, SessionError> {
        let destination = destination.into_destination()?;
        let selector = selector
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned);
        let inner = &self.inner;
        let mut state = inner.lock_state();
        state.ensure_open()?;
        let id = ConsumerId::new(inner.id, inner.consumer_ids.next());
        inner
            .transport
            .send_command(WireCommand::ConsumerInfo(ConsumerInfo {
                id,
                destination: destination.clone(),
                selector: selector.clone(),
            }))?;
        let core = Arc::new(ConsumerCore::new(
            id,
            destination,
            selector,
            inner.config.expiry_checked_on_receive(),
        ));
        state.consumers.insert(id, Arc::clone(&core));
        drop(state);
        info!(
            "consumer opened: id={id}, destination={}",
            core.destination()
        );
        Ok(MessageConsumer::new(core, Arc::clone(inner)))
    }

    /// Register a producer sending to `destination`.
    ///
    /// # Errors
    ///
    /// See [`Session::create_consumer`].
    pub fn create_producer(
        &self,
        destination: impl IntoDestination,
    ) -> Result<MessageProducer, SessionError> {
        let destination = destination.into_destination()?;
        let inner = &self.inner;
        let mut state = inner.lock_state();
        state.ensure_open()?;
        let id = ProducerId::new(inner.id, inner.producer_ids.next());
        inner
            .transport
            .send_command(WireCommand::ProducerInfo(ProducerInfo {
                id,
                destination: destination.clone(),
            }))?;
        state.producers.insert(id);
        drop(state);
        info!("producer opened: id={id}, destination={destination}");
        Ok(MessageProducer::new(id, destination, Arc::clone(inner)))
    }

    /// Allocate a temporary queue name unique to this session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the session is closed.
    pub fn create_temporary_queue(&self) -> Result<Destination, SessionError> {
        self.temporary(DestinationKind::TemporaryQueue)
    }

    /// Allocate a temporary topic name unique to this session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the session is closed.
    pub fn create_temporary_topic(&self) -> Result<Destination, SessionError> {
        self.temporary(DestinationKind::TemporaryTopic)
    }

    fn temporary(&self, kind: DestinationKind) -> Result<Destination, SessionError> {
        self.inner.lock_state().ensure_open()?;
        let name = format!("{}:{}", self.inner.id, self.inner.temp_ids.next());
        Ok(Destination::new(kind, name)?)
    }

    /// Close every consumer and producer, rolling back an open transaction
    /// first. Blocked receivers wake with no message. Closing twice is a
    /// no-op.
    pub fn close(&self) { self.inner.close(); }
}
