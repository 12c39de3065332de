#![doc(html_root_url = "https://docs.rs/brokerwire/latest")]
//! Client-side engine of a message-broker protocol.
//!
//! The crate accepts dispatches pushed by a broker connection, routes them
//! to local consumers and enforces the acknowledgement contract a
//! messaging client must honour: at-least-once delivery, cumulative and
//! individual acknowledgement, local transactions with ordered redelivery
//! on rollback, and message expiry. The physical transport is abstracted
//! behind [`transport::Transport`].

pub mod ack;
pub mod command;
pub mod connection;
pub mod consumer;
pub mod destination;
pub mod id;
pub mod message;
pub mod metrics;
pub mod producer;
pub mod session;
pub mod transport;
pub mod value;

pub use ack::AcknowledgeMode;
pub use connection::{Connection, ConnectionConfig};
pub use consumer::{MessageConsumer, MessageListener};
pub use destination::{Destination, DestinationKind};
pub use message::{Message, MessageBody};
pub use producer::MessageProducer;
pub use session::{DispatchOutcome, IllegalState, Session, SessionError, TransactionError};
pub use transport::{ChannelTransport, Transport, TransportError};
pub use value::{PrimitiveValue, TypeConversionError};
