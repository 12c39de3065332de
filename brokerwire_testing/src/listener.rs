//! Listener that collects pushed messages for assertions.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use brokerwire::{consumer::MessageListener, message::Message};
use tokio::{sync::Notify, time::Instant};

#[derive(Default)]
struct Inner {
    messages: Mutex<Vec<Message>>,
    notify: Notify,
    acknowledge: bool,
}

/// Cloneable [`MessageListener`] storing every message it is given.
///
/// Clones share storage, so a test can keep one handle and register the
/// other with a consumer.
#[derive(Clone, Default)]
pub struct CollectingListener {
    inner: Arc<Inner>,
}

impl CollectingListener {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// A listener that calls [`Message::acknowledge`] on every message.
    #[must_use]
    pub fn acknowledging() -> Self {
        Self {
            inner: Arc::new(Inner {
                acknowledge: true,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.inner
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Message> { self.lock().clone() }

    #[must_use]
    pub fn len(&self) -> usize { self.lock().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    pub fn clear(&self) { self.lock().clear(); }

    /// Wait until at least `count` messages have arrived or `timeout`
    /// elapses. Returns whether the count was reached.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.len() >= count;
            }
        }
    }
}

impl MessageListener for CollectingListener {
    fn on_message(&self, message: &Message) {
        if self.inner.acknowledge {
            let _ = message.acknowledge();
        }
        self.lock().push(message.clone());
        self.inner.notify.notify_waiters();
    }
}
