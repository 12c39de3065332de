//! Per-consumer FIFO of arrived, not yet consumed messages.
//!
//! The queue has a single lock guarding both the entries and the liveness
//! flag, so a message is either queued before `close` or rejected by it;
//! there is no window where it can be accepted and then silently lost.
//! Blocked receivers park on a [`Notify`] and re-check the queue after
//! every wake-up.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    sync::Notify,
    time::{Instant, timeout_at},
};
use tracing::debug;

use crate::message::{Message, now_millis};

/// Result of offering a message to a [`DispatchQueue`].
#[derive(Debug)]
pub(crate) enum EnqueueOutcome {
    Queued,
    /// The message had already expired and was discarded.
    Expired,
    /// The queue is closed; the message is handed back to the caller.
    Rejected(Message),
}

/// Result of a non-blocking take.
#[derive(Debug)]
pub(crate) enum Dequeue {
    Message(Message),
    Empty,
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<Message>,
    closed: bool,
}

/// Ordered holding area between the session and the application.
#[derive(Debug)]
pub(crate) struct DispatchQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    check_expiry_on_dequeue: bool,
}

impl DispatchQueue {
    pub(crate) fn new(check_expiry_on_dequeue: bool) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            check_expiry_on_dequeue,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `message` unless it has expired at `now` or the queue is
    /// closed.
    pub(crate) fn enqueue(&self, message: Message, now: u64) -> EnqueueOutcome {
        if message.is_expired_at(now) {
            return EnqueueOutcome::Expired;
        }
        {
            let mut state = self.lock();
            if state.closed {
                return EnqueueOutcome::Rejected(message);
            }
            state.entries.push_back(message);
        }
        self.notify.notify_one();
        EnqueueOutcome::Queued
    }

    /// Put `messages` back at the head, keeping their relative order.
    ///
    /// # Errors
    ///
    /// Hands the messages back if the queue is closed.
    pub(crate) fn requeue_front(&self, messages: Vec<Message>) -> Result<(), Vec<Message>> {
        if messages.is_empty() {
            return Ok(());
        }
        {
            let mut state = self.lock();
            if state.closed {
                return Err(messages);
            }
            for message in messages.into_iter().rev() {
                state.entries.push_front(message);
            }
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Take the head without waiting.
    pub(crate) fn try_dequeue(&self) -> Dequeue {
        let mut state = self.lock();
        let now = now_millis();
        while let Some(message) = state.entries.pop_front() {
            if self.check_expiry_on_dequeue && message.is_expired_at(now) {
                debug!(message_id = %message.id(), "discarding message expired in queue");
                crate::metrics::inc_expired();
                continue;
            }
            return Dequeue::Message(message);
        }
        if state.closed {
            Dequeue::Closed
        } else {
            Dequeue::Empty
        }
    }

    /// Wait for the head, giving up after `timeout` if one is given.
    ///
    /// Returns `None` on timeout or once the queue is closed.
    pub(crate) async fn dequeue(&self, timeout: Option<Duration>) -> Option<Message> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent enqueue or close
            // cannot slip between the check and the wait.
            notified.as_mut().enable();

            match self.try_dequeue() {
                Dequeue::Message(message) => return Some(message),
                Dequeue::Closed => return None,
                Dequeue::Empty => {}
            }

            match deadline {
                Some(deadline) => {
                    if timeout_at(deadline, notified).await.is_err() {
                        return match self.try_dequeue() {
                            Dequeue::Message(message) => Some(message),
                            Dequeue::Empty | Dequeue::Closed => None,
                        };
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Mark the queue closed, wake every waiter and return what was left.
    pub(crate) fn close(&self) -> Vec<Message> {
        let leftovers = {
            let mut state = self.lock();
            state.closed = true;
            state.entries.drain(..).collect()
        };
        self.notify.notify_waiters();
        leftovers
    }

    pub(crate) fn is_closed(&self) -> bool { self.lock().closed }

    pub(crate) fn len(&self) -> usize { self.lock().entries.len() }
}
