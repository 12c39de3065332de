//! Push-style delivery callbacks.

use std::{any::Any, fmt};

use crate::message::Message;

/// Receives messages pushed to a consumer.
///
/// `on_message` runs synchronously on the thread that delivered the
/// dispatch, usually the connection's inbound task. It must not call
/// `receive` on the consumer it is registered with. Acknowledging the
/// message, or committing and rolling back the owning session, is allowed.
///
/// A panic inside `on_message` is caught and logged. In AUTO mode the
/// message is then redelivered.
pub trait MessageListener: Send + Sync + 'static {
    fn on_message(&self, message: &Message);
}

impl<F> MessageListener for F
where
    F: Fn(&Message) + Send + Sync + 'static,
{
    fn on_message(&self, message: &Message) { self(message); }
}

/// Formats a caught panic payload for logging.
///
/// `String` and `&'static str` payloads are written verbatim; anything else
/// falls back to `Debug`.
pub(crate) struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self { Self(payload) }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}
