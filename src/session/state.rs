//! Mutable state guarded by the session lock.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use super::{IllegalState, SessionError, counter::OpenSession};
use crate::{
    ack::{AckState, DeliveryArena},
    consumer::ConsumerCore,
    id::{ConsumerId, ProducerId, SessionId},
};

/// Everything dispatch, acknowledgement, commit and rollback serialize on.
#[derive(Debug)]
pub(super) struct SessionState {
    pub(super) closed: bool,
    pub(super) consumers: HashMap<ConsumerId, Arc<ConsumerCore>>,
    pub(super) producers: HashSet<ProducerId>,
    pub(super) arena: DeliveryArena,
    pub(super) acks: AckState,
    pub(super) active: Option<OpenSession>,
}

impl SessionState {
    pub(super) fn new(id: SessionId, acks: AckState) -> Self {
        Self {
            closed: false,
            consumers: HashMap::new(),
            producers: HashSet::new(),
            arena: DeliveryArena::default(),
            acks,
            active: Some(OpenSession::register(id)),
        }
    }

    pub(super) fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(IllegalState::SessionClosed.into())
        } else {
            Ok(())
        }
    }
}
