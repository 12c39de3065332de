//! Back-reference from a delivered message to its session.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    ack::DeliveryTag,
    session::{IllegalState, SessionError, SessionInner},
};

/// Non-owning handle letting [`super::Message::acknowledge`] reach the
/// session that delivered the message.
#[derive(Clone)]
pub(crate) struct Acknowledger {
    session: Weak<SessionInner>,
    tag: DeliveryTag,
}

impl Acknowledger {
    pub(crate) fn new(session: &Arc<SessionInner>, tag: DeliveryTag) -> Self {
        Self {
            session: Arc::downgrade(session),
            tag,
        }
    }

    pub(crate) fn acknowledge(&self) -> Result<(), SessionError> {
        let session = self
            .session
            .upgrade()
            .ok_or(SessionError::IllegalState(IllegalState::SessionClosed))?;
        session.acknowledge(self.tag)
    }
}

impl fmt::Debug for Acknowledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acknowledger")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}
