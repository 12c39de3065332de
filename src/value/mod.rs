//! Type-tagged primitive values carried in message properties.
//!
//! [`PrimitiveValue`] is a closed union over the scalar kinds a broker may
//! attach to a message. Reads go through [`FromPrimitive`], which permits
//! lossless widening (`byte → short → int → long`, `float → double`) and
//! parsing from strings. Every other pairing is rejected with a single
//! [`TypeConversionError`], including strings that fail to parse.

mod convert;
mod error;
mod map;

use std::fmt;

use derive_more::Display;

pub use convert::FromPrimitive;
pub use error::{PropertyError, TypeConversionError};
pub use map::PrimitiveMap;

/// Discriminant of a [`PrimitiveValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ValueKind {
    #[display("bool")]
    Bool,
    #[display("byte")]
    Byte,
    #[display("char")]
    Char,
    #[display("short")]
    Short,
    #[display("int")]
    Int,
    #[display("long")]
    Long,
    #[display("float")]
    Float,
    #[display("double")]
    Double,
    #[display("string")]
    String,
}

/// A single property or header value.
///
/// # Examples
///
/// ```
/// use brokerwire::value::PrimitiveValue;
///
/// let value = PrimitiveValue::from_string("123");
/// let n: i32 = value.convert().expect("numeric string");
/// assert_eq!(n, 123);
/// assert!(PrimitiveValue::from_string("abc").convert::<i32>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum PrimitiveValue {
    Bool(bool),
    Byte(u8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl PrimitiveValue {
    /// Wrap a string value.
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self { Self::String(value.into()) }

    /// Return the kind tag of the stored value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Byte(_) => ValueKind::Byte,
            Self::Char(_) => ValueKind::Char,
            Self::Short(_) => ValueKind::Short,
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Float(_) => ValueKind::Float,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
        }
    }

    /// Read the value as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`TypeConversionError`] when `T` would narrow the stored value,
    /// when a string source does not parse as `T`, or for any other pairing
    /// of kinds.
    pub fn convert<T: FromPrimitive>(&self) -> Result<T, TypeConversionError> {
        T::from_primitive(self)
    }
}

/// Canonical, locale-independent textual form of each kind.
impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PrimitiveValue {
                fn from(value: $ty) -> Self { Self::$variant(value) }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    u8 => Byte,
    char => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self { Self::String(value.to_owned()) }
}

#[cfg(test)]
mod tests;
