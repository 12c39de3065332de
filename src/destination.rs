//! Destinations consumers read from and producers write to.

use std::{fmt, str::FromStr};

use derive_more::Display;
use thiserror::Error;

/// Kind of a [`Destination`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum DestinationKind {
    #[display("queue")]
    Queue,
    #[display("topic")]
    Topic,
    #[display("temp-queue")]
    TemporaryQueue,
    #[display("temp-topic")]
    TemporaryTopic,
}

impl DestinationKind {
    #[must_use]
    pub const fn is_topic(self) -> bool { matches!(self, Self::Topic | Self::TemporaryTopic) }

    #[must_use]
    pub const fn is_temporary(self) -> bool {
        matches!(self, Self::TemporaryQueue | Self::TemporaryTopic)
    }

    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "queue" => Some(Self::Queue),
            "topic" => Some(Self::Topic),
            "temp-queue" => Some(Self::TemporaryQueue),
            "temp-topic" => Some(Self::TemporaryTopic),
            _ => None,
        }
    }
}

/// Reasons a destination is rejected.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DestinationError {
    /// The name is empty or whitespace only.
    #[error("destination name is empty")]
    Empty,
    /// The name contains a control character.
    #[error("destination name {0:?} contains a control character")]
    ControlCharacter(String),
    /// A `scheme://name` string used an unknown scheme.
    #[error("unknown destination scheme `{0}`")]
    UnknownScheme(String),
}

/// A validated, typed destination name.
///
/// # Examples
///
/// ```
/// use brokerwire::destination::{Destination, DestinationKind};
///
/// let topic: Destination = "topic://prices".parse().expect("valid destination");
/// assert_eq!(topic.kind(), DestinationKind::Topic);
/// assert_eq!(topic.name(), "prices");
/// assert!(Destination::queue("  ").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Destination {
    kind: DestinationKind,
    name: String,
}

impl Destination {
    /// Build a destination after validating `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if `name` is blank or contains control
    /// characters.
    pub fn new(kind: DestinationKind, name: impl Into<String>) -> Result<Self, DestinationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DestinationError::Empty);
        }
        if name.chars().any(char::is_control) {
            return Err(DestinationError::ControlCharacter(name));
        }
        Ok(Self { kind, name })
    }

    /// Build a queue destination.
    ///
    /// # Errors
    ///
    /// See [`Destination::new`].
    pub fn queue(name: impl Into<String>) -> Result<Self, DestinationError> {
        Self::new(DestinationKind::Queue, name)
    }

    /// Build a topic destination.
    ///
    /// # Errors
    ///
    /// See [`Destination::new`].
    pub fn topic(name: impl Into<String>) -> Result<Self, DestinationError> {
        Self::new(DestinationKind::Topic, name)
    }

    #[must_use]
    pub const fn kind(&self) -> DestinationKind { self.kind }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind, self.name)
    }
}

/// Parses `scheme://name`; a bare name is treated as a queue.
impl FromStr for Destination {
    type Err = DestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("://") {
            Some((scheme, name)) => {
                let kind = DestinationKind::from_scheme(scheme)
                    .ok_or_else(|| DestinationError::UnknownScheme(scheme.to_owned()))?;
                Self::new(kind, name)
            }
            None => Self::queue(s),
        }
    }
}

/// Values accepted wherever a destination is expected.
pub trait IntoDestination {
    /// Validate and convert into a [`Destination`].
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] when the value does not name a valid
    /// destination.
    fn into_destination(self) -> Result<Destination, DestinationError>;
}

impl IntoDestination for Destination {
    fn into_destination(self) -> Result<Destination, DestinationError> { Ok(self) }
}

impl IntoDestination for &Destination {
    fn into_destination(self) -> Result<Destination, DestinationError> { Ok(self.clone()) }
}

impl IntoDestination for &str {
    fn into_destination(self) -> Result<Destination, DestinationError> { self.parse() }
}

impl IntoDestination for String {
    fn into_destination(self) -> Result<Destination, DestinationError> { self.parse() }
}
