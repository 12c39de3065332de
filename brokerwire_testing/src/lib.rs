//! Shared helpers for `brokerwire` tests.
//!
//! [`RecordingTransport`] stands in for the broker connection and records
//! every outbound command; [`CollectingListener`] gathers pushed messages;
//! the fixtures build sessions and inject dispatches.
//!
//! ```rust
//! use brokerwire::AcknowledgeMode;
//! use brokerwire_testing::{CollectingListener, session_with, text_dispatch};
//!
//! let (session, transport) = session_with(AcknowledgeMode::Auto);
//! let consumer = session.create_consumer("test.queue", None).unwrap();
//! let listener = CollectingListener::new();
//! consumer.set_listener(listener.clone()).unwrap();
//! session.on_dispatch(text_dispatch(consumer.id(), 1, "Hello")).unwrap();
//! assert_eq!(listener.messages()[0].text(), Some("Hello"));
//! assert_eq!(transport.acks().len(), 1);
//! ```

pub mod fixtures;
pub mod listener;
pub mod logging;
pub mod macros;
pub mod transport;

pub use fixtures::{
    TEST_QUEUE,
    expired_dispatch,
    recording_transport,
    remote_producer,
    session_id,
    session_with,
    session_with_config,
    text_dispatch,
    text_message,
};
pub use listener::CollectingListener;
pub use logging::{LoggerHandle, logger};
pub use transport::RecordingTransport;

/// Result type for fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
