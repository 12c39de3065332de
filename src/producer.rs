//! Message producers.

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    destination::Destination,
    id::{MessageId, ProducerId, Sequence},
    message::{Message, now_millis},
    session::{IllegalState, SessionError, SessionInner},
};

/// Sends messages to one destination on behalf of a session.
///
/// In a TRANSACTED session sends are buffered until the session commits and
/// discarded if it rolls back.
pub struct MessageProducer {
    id: ProducerId,
    destination: Destination,
    session: Arc<SessionInner>,
    sequence: Sequence,
    time_to_live: Option<Duration>,
}

impl MessageProducer {
    pub(crate) fn new(id: ProducerId, destination: Destination, session: Arc<SessionInner>) -> Self {
        Self {
            id,
            destination,
            session,
            sequence: Sequence::default(),
            time_to_live: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ProducerId { self.id }

    #[must_use]
    pub fn destination(&self) -> &Destination { &self.destination }

    #[must_use]
    pub fn time_to_live(&self) -> Option<Duration> { self.time_to_live }

    /// Expire messages sent from now on after `ttl`; `None` means never.
    pub fn set_time_to_live(&mut self, ttl: Option<Duration>) { self.time_to_live = ttl; }

    #[must_use]
    pub fn is_closed(&self) -> bool { !self.session.producer_is_open(self.id) }

    /// Stamp `message` with a fresh id, this producer's destination, the
    /// send time and expiry, then send or buffer it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the producer or session is
    /// closed and [`SessionError::Transport`] if an immediate send fails.
    pub fn send(&self, mut message: Message) -> Result<MessageId, SessionError> {
        if !self.session.producer_is_open(self.id) {
            return Err(if self.session.is_closed() {
                IllegalState::SessionClosed
            } else {
                IllegalState::ProducerClosed
            }
            .into());
        }
        let id = MessageId::new(self.id, self.sequence.next());
        let now = now_millis();
        let expiration = self.time_to_live.map_or(0, |ttl| {
            now.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
        });
        message.stamp(id, self.destination.clone(), now, expiration);
        self.session.send_message(self.id, message)?;
        Ok(id)
    }

    /// Deregister the producer. Closing twice is a no-op.
    pub fn close(&self) { self.session.close_producer(self.id); }
}

impl fmt::Debug for MessageProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageProducer")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("time_to_live", &self.time_to_live)
            .finish_non_exhaustive()
    }
}
