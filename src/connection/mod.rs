//! Broker connection: session registry and inbound command loop.
//!
//! A [`Connection`] owns the transport handle, creates sessions that share
//! it and routes inbound commands to them. The registry holds only weak
//! references, so dropping every handle to a session releases it; dead
//! entries are pruned lazily on lookup.

mod config;

use std::sync::{
    Arc,
    Weak,
    atomic::{AtomicBool, Ordering},
};

pub use config::ConnectionConfig;
use dashmap::DashMap;
use log::{info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    ack::AcknowledgeMode,
    command::{RemoveInfo, WireCommand},
    id::{ConnectionId, Sequence, SessionId},
    session::{IllegalState, Session, SessionError, SessionInner},
    transport::{ExceptionListener, Transport, TransportError},
};

struct ConnectionInner {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    sessions: DashMap<SessionId, Weak<SessionInner>>,
    session_ids: Sequence,
    tx_ids: Arc<Sequence>,
    exception_listener: Option<Arc<dyn ExceptionListener>>,
    closed: AtomicBool,
}

/// Builder for [`Connection`].
#[must_use]
pub struct ConnectionBuilder {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    exception_listener: Option<Arc<dyn ExceptionListener>>,
}

impl ConnectionBuilder {
    pub fn id(mut self, id: ConnectionId) -> Self {
        self.id = id;
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive transport failures reported through
    /// [`Connection::on_transport_error`].
    pub fn exception_listener(mut self, listener: impl ExceptionListener) -> Self {
        self.exception_listener = Some(Arc::new(listener));
        self
    }

    pub fn build(self) -> Connection {
        info!("connection opened: id={}", self.id);
        Connection {
            inner: Arc::new(ConnectionInner {
                id: self.id,
                transport: self.transport,
                config: self.config,
                sessions: DashMap::new(),
                session_ids: Sequence::default(),
                tx_ids: Arc::new(Sequence::default()),
                exception_listener: self.exception_listener,
                closed: AtomicBool::new(false),
            }),
        }
    }
}

/// Client side of one broker connection.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use brokerwire::{
///     ack::AcknowledgeMode,
///     command::WireCommand,
///     connection::Connection,
///     transport::ChannelTransport,
/// };
///
/// let (transport, mut outbound) = ChannelTransport::new();
/// let connection = Connection::builder(Arc::new(transport)).build();
/// let session = connection.create_session(AcknowledgeMode::Auto)?;
/// assert!(matches!(outbound.try_recv(), Ok(WireCommand::SessionInfo(id)) if id == session.id()));
/// assert!(connection.session(session.id()).is_some());
/// # Ok::<(), brokerwire::session::SessionError>(())
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn builder(transport: Arc<dyn Transport>) -> ConnectionBuilder {
        ConnectionBuilder {
            id: ConnectionId::new(1),
            transport,
            config: ConnectionConfig::default(),
            exception_listener: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId { self.inner.id }

    #[must_use]
    pub fn config(&self) -> ConnectionConfig { self.inner.config }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.inner.closed.load(Ordering::Acquire) }

    /// Open a session with a fixed acknowledgement mode.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalState`] if the connection is closed and
    /// [`SessionError::Transport`] if the broker could not be told.
    pub fn create_session(&self, mode: AcknowledgeMode) -> Result<Session, SessionError> {
        let inner = &self.inner;
        if self.is_closed() {
            return Err(IllegalState::ConnectionClosed.into());
        }
        let id = SessionId::new(inner.id, inner.session_ids.next());
        inner.transport.send_command(WireCommand::SessionInfo(id))?;
        let session = Session::from_parts(
            id,
            mode,
            Arc::clone(&inner.transport),
            inner.config,
            Arc::clone(&inner.tx_ids),
        );
        inner.sessions.insert(id, session.downgrade());
        Ok(session)
    }

    /// Look up a live session, pruning the entry if it has been dropped.
    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<Session> {
        let sessions = &self.inner.sessions;
        let guard = sessions.get(&id);
        let session = guard.as_ref().and_then(|weak| weak.upgrade());
        drop(guard);
        if session.is_none() {
            sessions.remove_if(&id, |_, weak| weak.strong_count() == 0);
        }
        session.map(Session::from_inner)
    }

    /// Prune dropped sessions and return the live ones.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<Session> {
        let sessions = &self.inner.sessions;
        let mut live = Vec::with_capacity(sessions.len());
        sessions.retain(|_, weak| match weak.upgrade() {
            Some(inner) => {
                live.push(Session::from_inner(inner));
                true
            }
            None => false,
        });
        live.sort_by_key(Session::id);
        live
    }

    /// Route one inbound command.
    ///
    /// Dispatches go to the session named by the consumer id. Broker-side
    /// removal of a consumer, producer or session closes it locally.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ProtocolViolation`] for a dispatch to an
    /// unknown session or a command the client never receives, and
    /// propagates errors from [`Session::on_dispatch`].
    pub fn on_command(&self, command: WireCommand) -> Result<(), SessionError> {
        match command {
            WireCommand::Dispatch(dispatch) => {
                let session_id = dispatch.consumer_id.session_id();
                let Some(session) = self.session(session_id) else {
                    return Err(self.violation(format!(
                        "dispatch for consumer {} names unknown session {session_id}",
                        dispatch.consumer_id
                    )));
                };
                session.on_dispatch(dispatch).map(|_| ())
            }
            WireCommand::Remove(info) => {
                let session_id = match info {
                    RemoveInfo::Session(id) => id,
                    RemoveInfo::Consumer(id) => id.session_id(),
                    RemoveInfo::Producer(id) => id.session_id(),
                };
                if let Some(session) = self.session(session_id) {
                    session.remote_remove(info);
                }
                Ok(())
            }
            other => Err(self.violation(format!("unexpected inbound {} command", other.kind()))),
        }
    }

    fn violation(&self, detail: String) -> SessionError {
        warn!(
            "protocol violation: connection={}, detail={detail}",
            self.inner.id
        );
        crate::metrics::inc_protocol_violations();
        SessionError::ProtocolViolation(detail)
    }

    /// Report a transport failure to the exception listener.
    ///
    /// Session state is left alone: unacknowledged messages stay pending
    /// until the application recovers, rolls back or closes.
    pub fn on_transport_error(&self, error: &TransportError) {
        warn!(
            "transport error: connection={}, error={error}",
            self.inner.id
        );
        if let Some(listener) = &self.inner.exception_listener {
            listener.on_exception(error);
        }
    }

    /// Feed inbound commands to [`Connection::on_command`] until `shutdown`
    /// fires or the channel closes.
    pub async fn run(
        &self,
        mut inbound: mpsc::UnboundedReceiver<WireCommand>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                command = inbound.recv() => match command {
                    Some(command) => {
                        let kind = command.kind();
                        if let Err(e) = self.on_command(command) {
                            debug!(connection = %self.inner.id, %kind, error = %e, "inbound command rejected");
                        }
                    }
                    None => break,
                },
            }
        }
        info!("inbound loop stopped: connection={}", self.inner.id);
    }

    /// Close every session. Closing twice is a no-op.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for session in self.active_sessions() {
            session.close();
        }
        self.inner.sessions.clear();
        info!("connection closed: id={}", self.inner.id);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("sessions", &self.inner.sessions.len())
            .finish_non_exhaustive()
    }
}
