//! Abstract asynchronous command channel to the broker.
//!
//! The physical transport (sockets, TLS, failover) lives outside this crate.
//! Sessions only need a way to hand commands off; inbound commands are fed
//! to [`crate::connection::Connection::run`] or
//! [`crate::connection::Connection::on_command`].

use thiserror::Error;
use tokio::sync::mpsc;

use crate::command::WireCommand;

/// Errors reported by a [`Transport`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport no longer accepts commands.
    #[error("transport closed")]
    Closed,
    /// The transport rejected the command.
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Outbound half of a broker connection.
///
/// `send_command` must not block and must not call back into the session
/// that issued the command; sessions invoke it while holding their state
/// lock. Delivery is asynchronous: an `Ok` return means the command was
/// accepted, not that the broker processed it. Later failures are reported
/// through [`ExceptionListener`].
pub trait Transport: Send + Sync + 'static {
    /// Hand `command` to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the command cannot be accepted.
    fn send_command(&self, command: WireCommand) -> Result<(), TransportError>;
}

/// Receives connection-level failures out of band.
pub trait ExceptionListener: Send + Sync + 'static {
    fn on_exception(&self, error: &TransportError);
}

impl<F> ExceptionListener for F
where
    F: Fn(&TransportError) + Send + Sync + 'static,
{
    fn on_exception(&self, error: &TransportError) { self(error); }
}

/// [`Transport`] that forwards commands into an unbounded channel.
///
/// # Examples
///
/// ```
/// use brokerwire::{
///     command::{RemoveInfo, WireCommand},
///     id::{ConnectionId, SessionId},
///     transport::{ChannelTransport, Transport},
/// };
///
/// let (transport, mut outbound) = ChannelTransport::new();
/// let session = SessionId::new(ConnectionId::new(1), 1);
/// transport
///     .send_command(WireCommand::Remove(RemoveInfo::Session(session)))
///     .expect("channel open");
/// assert!(matches!(outbound.try_recv(), Ok(WireCommand::Remove(_))));
/// ```
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<WireCommand>,
}

impl ChannelTransport {
    /// Create the transport and the receiver draining its commands.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WireCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send_command(&self, command: WireCommand) -> Result<(), TransportError> {
        self.tx.send(command).map_err(|_| TransportError::Closed)
    }
}
