//! Errors returned by session, consumer and producer operations.

use derive_more::Display;
use thiserror::Error;

use crate::{
    destination::DestinationError,
    transport::TransportError,
    value::TypeConversionError,
};

/// Why an operation is not valid in the current state.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum IllegalState {
    #[display("session is not transacted")]
    NotTransacted,
    #[display("operation not allowed on a transacted session")]
    Transacted,
    #[display("session is closed")]
    SessionClosed,
    #[display("consumer is closed")]
    ConsumerClosed,
    #[display("consumer has a message listener")]
    ListenerRegistered,
    #[display("producer is closed")]
    ProducerClosed,
    #[display("connection is closed")]
    ConnectionClosed,
}

/// A commit that could not be applied. The transaction has been rolled back
/// locally and its messages redelivered.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("commit failed and was rolled back: {0}")]
    Send(#[source] TransportError),
}

/// Errors from session-level operations.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid destination: {0}")]
    InvalidDestination(#[from] DestinationError),
    #[error("illegal state: {0}")]
    IllegalState(IllegalState),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// A dispatch the session cannot resolve. It has been dropped.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error(transparent)]
    TypeConversion(#[from] TypeConversionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<IllegalState> for SessionError {
    fn from(reason: IllegalState) -> Self { Self::IllegalState(reason) }
}
