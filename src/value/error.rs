//! Error types for value conversion and property lookup.

use thiserror::Error;

use super::ValueKind;

/// A requested read could not be satisfied from the stored kind.
///
/// Narrowing requests, unparsable strings and unrelated kinds all surface as
/// this one error; callers cannot tell them apart by type.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("Unsupported Type Conversion")]
pub struct TypeConversionError {
    from: ValueKind,
    to: ValueKind,
}

impl TypeConversionError {
    pub(crate) const fn new(from: ValueKind, to: ValueKind) -> Self { Self { from, to } }

    /// Kind of the stored value.
    #[must_use]
    pub const fn source_kind(&self) -> ValueKind { self.from }

    /// Kind the caller asked for.
    #[must_use]
    pub const fn target_kind(&self) -> ValueKind { self.to }
}

/// Errors returned by [`super::PrimitiveMap::get`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PropertyError {
    /// No value is stored under the key.
    #[error("property `{0}` is not set")]
    Missing(String),
    /// A value is stored but cannot be read as the requested kind.
    #[error(transparent)]
    Conversion(#[from] TypeConversionError),
}
