//! Ordered property map keyed by name.

use std::collections::BTreeMap;

use super::{FromPrimitive, PrimitiveValue, PropertyError};

/// Message properties with typed accessors.
///
/// # Examples
///
/// ```
/// use brokerwire::value::PrimitiveMap;
///
/// let mut props = PrimitiveMap::new();
/// props.set("retries", 3i16);
/// assert_eq!(props.get::<i64>("retries"), Ok(3));
/// assert_eq!(props.get::<String>("retries").as_deref(), Ok("3"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimitiveMap(BTreeMap<String, PrimitiveValue>);

impl PrimitiveMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Store `value` under `key`, returning any value it replaced.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PrimitiveValue>,
    ) -> Option<PrimitiveValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Read the value under `key` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::Missing`] when nothing is stored under `key`
    /// and [`PropertyError::Conversion`] when the stored value cannot be read
    /// as `T`.
    pub fn get<T: FromPrimitive>(&self, key: &str) -> Result<T, PropertyError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| PropertyError::Missing(key.to_owned()))?;
        Ok(value.convert()?)
    }

    /// Borrow the raw value under `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&PrimitiveValue> { self.0.get(key) }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<PrimitiveValue> { self.0.remove(key) }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool { self.0.contains_key(key) }

    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrimitiveValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<PrimitiveValue>> FromIterator<(K, V)> for PrimitiveMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
