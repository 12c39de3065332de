//! Message consumers and their dispatch queues.
//!
//! A consumer delivers in one of two mutually exclusive ways. Without a
//! listener the application pulls with [`MessageConsumer::receive`] and
//! friends. With a listener the session pushes each arriving message to it
//! synchronously, in arrival order, and `receive` is rejected.

mod listener;
mod queue;

use std::{
    fmt,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

pub use listener::MessageListener;
pub(crate) use listener::PanicMessage;
pub(crate) use queue::{Dequeue, DispatchQueue, EnqueueOutcome};

use crate::{
    destination::Destination,
    id::ConsumerId,
    message::Message,
    session::{IllegalState, SessionError, SessionInner},
};

type SharedListener = Arc<dyn MessageListener>;

/// Session-side state of one consumer.
pub(crate) struct ConsumerCore {
    id: ConsumerId,
    destination: Destination,
    selector: Option<String>,
    pub(crate) queue: DispatchQueue,
    listener: Mutex<Option<SharedListener>>,
    delivering: AtomicBool,
    pump_requested: AtomicBool,
}

impl ConsumerCore {
    pub(crate) fn new(
        id: ConsumerId,
        destination: Destination,
        selector: Option<String>,
        check_expiry_on_dequeue: bool,
    ) -> Self {
        Self {
            id,
            destination,
            selector,
            queue: DispatchQueue::new(check_expiry_on_dequeue),
            listener: Mutex::new(None),
            delivering: AtomicBool::new(false),
            pump_requested: AtomicBool::new(false),
        }
    }

    pub(crate) const fn id(&self) -> ConsumerId { self.id }

    pub(crate) fn destination(&self) -> &Destination { &self.destination }

    pub(crate) fn selector(&self) -> Option<&str> { self.selector.as_deref() }

    fn listener_slot(&self) -> MutexGuard<'_, Option<SharedListener>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn listener(&self) -> Option<SharedListener> { self.listener_slot().clone() }

    pub(crate) fn has_listener(&self) -> bool { self.listener_slot().is_some() }

    fn set_listener(&self, listener: Option<SharedListener>) { *self.listener_slot() = listener; }

    /// Ask for queued messages to be pushed to the listener.
    pub(crate) fn request_pump(&self) { self.pump_requested.store(true, Ordering::Release); }

    pub(crate) fn pump_pending(&self) -> bool { self.pump_requested.load(Ordering::Acquire) }

    /// Consume an outstanding pump request.
    pub(crate) fn take_pump_request(&self) -> bool {
        self.pump_requested.swap(false, Ordering::AcqRel)
    }

    /// Become the single thread delivering to the listener, if nobody is.
    pub(crate) fn try_begin_delivery(&self) -> bool {
        self.delivering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_delivery(&self) { self.delivering.store(false, Ordering::Release); }
}

impl fmt::Debug for ConsumerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCore")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("selector", &self.selector)
            .field("queued", &self.queue.len())
            .field("has_listener", &self.has_listener())
            .finish_non_exhaustive()
    }
}

/// Application handle for a consumer created by
/// [`crate::session::Session::create_consumer`].
#[derive(Clone)]
pub struct MessageConsumer {
    core: Arc<ConsumerCore>,
    session: Arc<SessionInner>,
}

impl MessageConsumer {
    pub(crate) fn new(core: Arc<ConsumerCore>, session: Arc<SessionInner>) -> Self {
        Self { core, session }
    }

    #[must_use]
    pub fn id(&self) -> ConsumerId { self.core.id() }

    #[must_use]
    pub fn destination(&self) -> &Destination { self.core.destination() }

    /// Message selector, or the empty string when none was given.
    #[must_use]
    pub fn selector(&self) -> &str { self.core.selector().unwrap_or_default() }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.core.queue.is_closed() }

    /// Number of messages waiting to be consumed.
    #[must_use]
    pub fn queued(&self) -> usize { self.core.queue.len() }

    /// Wait until a message arrives or the consumer closes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the consumer or its session
    /// is already closed, or a listener is registered.
    pub async fn receive(&self) -> Result<Option<Message>, SessionError> {
        self.receive_within(None).await
    }

    /// Wait up to `timeout` for a message. A zero timeout waits
    /// indefinitely, like [`MessageConsumer::receive`].
    ///
    /// Returns `Ok(None)` when the timeout elapses or the consumer is closed
    /// while waiting.
    ///
    /// # Errors
    ///
    /// See [`MessageConsumer::receive`].
    pub async fn receive_timeout(&self, timeout: Duration) -> Result<Option<Message>, SessionError> {
        self.receive_within((!timeout.is_zero()).then_some(timeout))
            .await
    }

    /// Take a message only if one is already queued.
    ///
    /// # Errors
    ///
    /// See [`MessageConsumer::receive`].
    pub fn receive_no_wait(&self) -> Result<Option<Message>, SessionError> {
        self.ensure_pull()?;
        Ok(match self.core.queue.try_dequeue() {
            Dequeue::Message(message) => self.session.hand_off_received(&self.core, message),
            Dequeue::Empty | Dequeue::Closed => None,
        })
    }

    async fn receive_within(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Option<Message>, SessionError> {
        self.ensure_pull()?;
        Ok(match self.core.queue.dequeue(timeout).await {
            Some(message) => self.session.hand_off_received(&self.core, message),
            None => None,
        })
    }

    fn ensure_pull(&self) -> Result<(), SessionError> {
        if self.session.is_closed() {
            return Err(SessionError::IllegalState(IllegalState::SessionClosed));
        }
        if self.core.queue.is_closed() {
            return Err(SessionError::IllegalState(IllegalState::ConsumerClosed));
        }
        if self.core.has_listener() {
            return Err(SessionError::IllegalState(
                IllegalState::ListenerRegistered,
            ));
        }
        Ok(())
    }

    /// Switch to push delivery. Messages already queued are delivered to
    /// `listener` before this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the consumer or its session
    /// is closed.
    pub fn set_listener(&self, listener: impl MessageListener) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.core.set_listener(Some(Arc::new(listener)));
        self.session.pump(&self.core);
        Ok(())
    }

    /// Return to pull delivery.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the consumer or its session
    /// is closed.
    pub fn clear_listener(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.core.set_listener(None);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.session.is_closed() {
            return Err(SessionError::IllegalState(IllegalState::SessionClosed));
        }
        if self.core.queue.is_closed() {
            return Err(SessionError::IllegalState(IllegalState::ConsumerClosed));
        }
        Ok(())
    }

    /// Close the consumer, waking blocked receivers with no message and
    /// returning undelivered messages to the broker. Closing twice is a
    /// no-op.
    pub fn close(&self) { self.session.close_consumer(self.core.id()); }
}

impl fmt::Debug for MessageConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageConsumer")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}
