//! Inbound dispatch routing and hand-off to the application.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::{error, warn};
use tracing::debug;

use super::{Session, SessionError, SessionInner, state::SessionState};
use crate::{
    ack::{AckState, AcknowledgeMode, Delivery},
    command::{AckKind, MessageAck, MessageDispatch, WireCommand},
    consumer::{ConsumerCore, Dequeue, EnqueueOutcome, MessageListener, PanicMessage},
    message::{Acknowledger, Message, now_millis},
};

/// What the session did with a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Queued for the consumer, and pushed to its listener if it has one.
    Queued,
    /// Already expired on arrival and discarded.
    Expired,
    /// The consumer or session is gone; the message was handed back to the
    /// broker for redelivery elsewhere.
    Returned,
}

impl Session {
    /// Accept a dispatch from the transport.
    ///
    /// A message for a registered consumer is queued after the expiry check
    /// and, when the consumer has a listener, delivered to it before this
    /// call returns.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ProtocolViolation`] when the dispatch has no
    /// message, names another session, or names a consumer this session
    /// never created. The dispatch is dropped and session state is left
    /// untouched.
    pub fn on_dispatch(&self, dispatch: MessageDispatch) -> Result<DispatchOutcome, SessionError> {
        self.inner.on_dispatch(dispatch)
    }
}

impl SessionInner {
    pub(crate) fn on_dispatch(
        self: &Arc<Self>,
        dispatch: MessageDispatch,
    ) -> Result<DispatchOutcome, SessionError> {
        let MessageDispatch {
            consumer_id,
            message,
        } = dispatch;
        let Some(message) = message else {
            return Err(self.violation(format!(
                "dispatch for consumer {consumer_id} carries no message"
            )));
        };
        if consumer_id.session_id() != self.id {
            return Err(self.violation(format!(
                "dispatch for consumer {consumer_id} reached session {}",
                self.id
            )));
        }

        let (outcome, listener_core) = {
            let state = self.lock_state();
            if state.closed {
                self.return_to_broker(consumer_id, message.id());
                return Ok(DispatchOutcome::Returned);
            }
            let Some(core) = state.consumers.get(&consumer_id).cloned() else {
                let value = consumer_id.value();
                if value == 0 || value > self.consumer_ids.current() {
                    drop(state);
                    return Err(self.violation(format!("unknown consumer {consumer_id}")));
                }
                self.return_to_broker(consumer_id, message.id());
                return Ok(DispatchOutcome::Returned);
            };

            let message_id = message.id();
            match core.queue.enqueue(message, now_millis()) {
                EnqueueOutcome::Queued => {
                    crate::metrics::inc_dispatched();
                    debug!(consumer = %consumer_id, %message_id, "message queued");
                    let listener_core = core.has_listener().then_some(core);
                    (DispatchOutcome::Queued, listener_core)
                }
                EnqueueOutcome::Expired => {
                    crate::metrics::inc_expired();
                    debug!(consumer = %consumer_id, %message_id, "discarding expired message");
                    (DispatchOutcome::Expired, None)
                }
                EnqueueOutcome::Rejected(message) => {
                    self.return_to_broker(consumer_id, message.id());
                    (DispatchOutcome::Returned, None)
                }
            }
        };

        if let Some(core) = listener_core {
            self.pump(&core);
        }
        Ok(outcome)
    }

    fn violation(&self, detail: String) -> SessionError {
        warn!("protocol violation: session={}, detail={detail}", self.id);
        crate::metrics::inc_protocol_violations();
        SessionError::ProtocolViolation(detail)
    }

    /// Push queued messages to the consumer's listener.
    ///
    /// Only one thread delivers to a given listener at a time. A caller that
    /// finds delivery already in progress, including a listener re-entering
    /// through rollback or recover, leaves a request behind and returns; the
    /// active deliverer picks it up.
    ///
    /// Each message is taken off the queue and recorded as delivered under
    /// the session lock. A rollback or recover on another thread therefore
    /// requeues either before the take, and the redelivered messages come
    /// first, or after the record, and the taken message is redelivered
    /// with them.
    pub(crate) fn pump(self: &Arc<Self>, core: &Arc<ConsumerCore>) {
        core.request_pump();
        while core.pump_pending() && core.try_begin_delivery() {
            while core.take_pump_request() {
                while let Some(listener) = core.listener() {
                    let delivered = {
                        let mut state = self.lock_state();
                        let Dequeue::Message(message) = core.queue.try_dequeue() else {
                            break;
                        };
                        self.record_delivery(&mut state, core, message)
                    };
                    if let Some(delivered) = delivered {
                        self.deliver_to_listener(core, listener.as_ref(), delivered);
                    }
                }
            }
            core.end_delivery();
        }
    }

    fn deliver_to_listener(
        self: &Arc<Self>,
        core: &Arc<ConsumerCore>,
        listener: &dyn MessageListener,
        delivered: Message,
    ) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_message(&delivered)));
        match outcome {
            Ok(()) => {
                if self.mode == AcknowledgeMode::Auto {
                    self.auto_acknowledge(core, &delivered);
                }
            }
            Err(payload) => {
                let panic = PanicMessage::new(payload);
                let message_id = delivered.id();
                error!(
                    "message listener panicked: consumer={}, message={message_id}, panic={panic}",
                    core.id()
                );
                tracing::error!(consumer = %core.id(), %message_id, %panic, "message listener panicked");
                if self.mode == AcknowledgeMode::Auto {
                    self.redeliver_after_failure(core, delivered);
                }
            }
        }
    }

    /// Pull-mode hand-off: record the delivery and, in AUTO mode,
    /// acknowledge it straight away.
    pub(crate) fn hand_off_received(
        self: &Arc<Self>,
        core: &Arc<ConsumerCore>,
        message: Message,
    ) -> Option<Message> {
        let delivered = self.hand_off(core, message)?;
        if self.mode == AcknowledgeMode::Auto {
            self.auto_acknowledge(core, &delivered);
        }
        Some(delivered)
    }

    /// Record `message` as delivered according to the acknowledgement
    /// mode and attach its acknowledgement handle.
    ///
    /// Returns `None`, after handing the message back to the broker, if the
    /// session closed while the message was in flight.
    fn hand_off(self: &Arc<Self>, core: &ConsumerCore, message: Message) -> Option<Message> {
        let mut state = self.lock_state();
        self.record_delivery(&mut state, core, message)
    }

    fn record_delivery(
        self: &Arc<Self>,
        state: &mut SessionState,
        core: &ConsumerCore,
        mut message: Message,
    ) -> Option<Message> {
        if state.closed {
            self.return_to_broker(core.id(), message.id());
            return None;
        }
        let SessionState { arena, acks, .. } = state;
        if matches!(acks, AckState::Auto) {
            return Some(message);
        }
        let tag = arena.insert(message.clone());
        let delivery = Delivery {
            tag,
            message_id: message.id(),
            consumer_id: core.id(),
        };
        match acks {
            AckState::Client(ledger) | AckState::Individual(ledger) => ledger.record(delivery),
            AckState::Transacted(tx) => tx.record_delivery(delivery),
            AckState::Auto => {}
        }
        message.attach(Acknowledger::new(self, tag));
        Some(message)
    }

    fn auto_acknowledge(&self, core: &ConsumerCore, message: &Message) {
        let state = self.lock_state();
        if state.closed {
            return;
        }
        self.send_best_effort(WireCommand::MessageAck(MessageAck {
            consumer_id: core.id(),
            destination: message.destination().clone(),
            kind: AckKind::Standard,
            first: message.id(),
            last: message.id(),
            count: 1,
            transaction: None,
        }));
    }

    fn redeliver_after_failure(self: &Arc<Self>, core: &ConsumerCore, message: Message) {
        let to_pump = {
            let mut state = self.lock_state();
            if state.closed {
                self.return_to_broker(core.id(), message.id());
                return;
            }
            self.redeliver_messages(&mut state, vec![(core.id(), message)])
        };
        for core in to_pump {
            self.pump(&core);
        }
    }
}
