//! Conversion rules from [`PrimitiveValue`] into Rust scalars.

use std::str::FromStr;

use super::{PrimitiveValue, TypeConversionError, ValueKind};

/// Types that can be read out of a [`PrimitiveValue`].
pub trait FromPrimitive: Sized {
    /// Kind reported in errors when a read of this type fails.
    const KIND: ValueKind;

    /// Convert `value` into `Self`.
    ///
    /// # Errors
    ///
    /// Returns [`TypeConversionError`] when the stored kind cannot be widened
    /// or parsed into `Self`.
    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError>;
}

const fn unsupported(value: &PrimitiveValue, to: ValueKind) -> TypeConversionError {
    TypeConversionError::new(value.kind(), to)
}

// Parse failures are swallowed and reported as the generic mismatch error.
fn parse<T: FromStr>(text: &str, to: ValueKind) -> Result<T, TypeConversionError> {
    text.parse()
        .map_err(|_| TypeConversionError::new(ValueKind::String, to))
}

impl FromPrimitive for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        match value {
            PrimitiveValue::Bool(v) => Ok(*v),
            // Any text other than a case-insensitive "true" reads as false.
            PrimitiveValue::String(s) => Ok(s.eq_ignore_ascii_case("true")),
            other => Err(unsupported(other, Self::KIND)),
        }
    }
}

impl FromPrimitive for u8 {
    const KIND: ValueKind = ValueKind::Byte;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        match value {
            PrimitiveValue::Byte(v) => Ok(*v),
            PrimitiveValue::String(s) => parse(s, Self::KIND),
            other => Err(unsupported(other, Self::KIND)),
        }
    }
}

impl FromPrimitive for char {
    const KIND: ValueKind = ValueKind::Char;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        match value {
            PrimitiveValue::Char(v) => Ok(*v),
            // Strings carry a char as its numeric byte code.
            PrimitiveValue::String(s) => parse::<u8>(s, Self::KIND).map(char::from),
            other => Err(unsupported(other, Self::KIND)),
        }
    }
}

impl FromPrimitive for i16 {
    const KIND: ValueKind = ValueKind::Short;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        match value {
            PrimitiveValue::Byte(v) => Ok(Self::from(*v)),
            PrimitiveValue::Short(v) => Ok(*v),
            PrimitiveValue::String(s) => parse(s, Self::KIND),
            other => Err(unsupported(other, Self::KIND)),
        }
    }
}

impl FromPrimitive for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        match value {
            PrimitiveValue::Byte(v) => Ok(Self::from(*v)),
            PrimitiveValue::Short(v) => Ok(Self::from(*v)),
            PrimitiveValue::Int(v) => Ok(*v),
            PrimitiveValue::String(s) => parse(s, Self::KIND),
            other => Err(unsupported(other, Self::KIND)),
        }
    }
}

impl FromPrimitive for i64 {
    const KIND: ValueKind = ValueKind::Long;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        match value {
            PrimitiveValue::Byte(v) => Ok(Self::from(*v)),
            PrimitiveValue::Short(v) => Ok(Self::from(*v)),
            PrimitiveValue::Int(v) => Ok(Self::from(*v)),
            PrimitiveValue::Long(v) => Ok(*v),
            PrimitiveValue::String(s) => parse(s, Self::KIND),
            other => Err(unsupported(other, Self::KIND)),
        }
    }
}

impl FromPrimitive for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        match value {
            PrimitiveValue::Float(v) => Ok(*v),
            PrimitiveValue::String(s) => parse(s, Self::KIND),
            other => Err(unsupported(other, Self::KIND)),
        }
    }
}

impl FromPrimitive for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        match value {
            PrimitiveValue::Float(v) => Ok(Self::from(*v)),
            PrimitiveValue::Double(v) => Ok(*v),
            PrimitiveValue::String(s) => parse(s, Self::KIND),
            other => Err(unsupported(other, Self::KIND)),
        }
    }
}

impl FromPrimitive for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_primitive(value: &PrimitiveValue) -> Result<Self, TypeConversionError> {
        Ok(value.to_string())
    }
}
