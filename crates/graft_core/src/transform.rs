//! Scalar transforms: the leaf codecs between text and typed values.
//!
//! A type bound by a transform is a "primitive" to the engine: it never
//! recurses, it just parses and formats. Built-in transforms cover the
//! usual scalars; [`Transform::enumeration`] serializes enum values by
//! name, and [`Transform::with`] accepts arbitrary codec closures.

use core::any::Any;
use core::fmt::Display;
use core::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------
// Transform

type ParseFn = Arc<dyn Fn(&str) -> core::result::Result<Box<dyn Any>, String> + Send + Sync>;
type FormatFn = Arc<dyn Fn(&dyn Any) -> core::result::Result<String, String> + Send + Sync>;

/// A read/write pair transforming between node text and one scalar type.
///
/// # Examples
///
/// ```
/// use graft_core::Transform;
///
/// let transform = Transform::of::<i32>();
/// let value = transform.read("7").unwrap();
/// assert_eq!(*value.downcast::<i32>().unwrap(), 7);
/// assert_eq!(transform.write(&42_i32).unwrap(), "42");
/// ```
#[derive(Clone)]
pub struct Transform {
    type_name: &'static str,
    parse: ParseFn,
    format: FormatFn,
}

impl Transform {
    /// The standard transform for a type with `FromStr` and `Display`.
    pub fn of<T>() -> Self
    where
        T: Any + FromStr + Display,
        T::Err: Display,
    {
        Self {
            type_name: core::any::type_name::<T>(),
            parse: Arc::new(|text| match text.parse::<T>() {
                Ok(value) => Ok(Box::new(value)),
                Err(reason) => Err(reason.to_string()),
            }),
            format: Arc::new(|value| match value.downcast_ref::<T>() {
                Some(value) => Ok(value.to_string()),
                None => Err("value has a mismatched type".to_string()),
            }),
        }
    }

    /// A transform built from custom parse and format closures.
    pub fn with<T: Any>(
        parse: impl Fn(&str) -> core::result::Result<T, String> + Send + Sync + 'static,
        format: impl Fn(&T) -> core::result::Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_name: core::any::type_name::<T>(),
            parse: Arc::new(move |text| parse(text).map(|value| Box::new(value) as Box<dyn Any>)),
            format: Arc::new(move |value| match value.downcast_ref::<T>() {
                Some(value) => format(value),
                None => Err("value has a mismatched type".to_string()),
            }),
        }
    }

    /// A transform that serializes enum values by name.
    ///
    /// # Examples
    ///
    /// ```
    /// use graft_core::Transform;
    ///
    /// #[derive(Clone, PartialEq, Debug)]
    /// enum Mode {
    ///     On,
    ///     Off,
    /// }
    ///
    /// const MODES: &[(&str, Mode)] = &[("on", Mode::On), ("off", Mode::Off)];
    ///
    /// let transform = Transform::enumeration(MODES);
    /// let mode = transform.read("off").unwrap();
    /// assert_eq!(*mode.downcast::<Mode>().unwrap(), Mode::Off);
    /// assert_eq!(transform.write(&Mode::On).unwrap(), "on");
    /// ```
    pub fn enumeration<T>(values: &'static [(&'static str, T)]) -> Self
    where
        T: Any + Clone + PartialEq + Sync,
    {
        Self {
            type_name: core::any::type_name::<T>(),
            parse: Arc::new(move |text| {
                values
                    .iter()
                    .find(|(name, _)| *name == text)
                    .map(|(_, value)| Box::new(value.clone()) as Box<dyn Any>)
                    .ok_or_else(|| "not a declared enumeration name".to_string())
            }),
            format: Arc::new(move |value| {
                let value = value
                    .downcast_ref::<T>()
                    .ok_or_else(|| "value has a mismatched type".to_string())?;
                values
                    .iter()
                    .find(|(_, candidate)| candidate == value)
                    .map(|(name, _)| (*name).to_string())
                    .ok_or_else(|| "value has no declared enumeration name".to_string())
            }),
        }
    }

    /// The name of the transformed type, for error reporting.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Parses node text into a typed value.
    pub fn read(&self, text: &str) -> Result<Box<dyn Any>> {
        (self.parse)(text).map_err(|reason| Error::Transform {
            type_name: self.type_name,
            text: text.to_string(),
            reason,
        })
    }

    /// Formats a typed value into node text.
    pub fn write(&self, value: &dyn Any) -> Result<String> {
        (self.format)(value).map_err(|reason| Error::Transform {
            type_name: self.type_name,
            text: String::new(),
            reason,
        })
    }
}

impl core::fmt::Debug for Transform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transform")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Transform;

    #[test]
    fn standard_transform_round_trips() {
        let transform = Transform::of::<bool>();
        let value = transform.read("true").unwrap();
        assert!(*value.downcast::<bool>().unwrap());
        assert_eq!(transform.write(&false).unwrap(), "false");
    }

    #[test]
    fn parse_failure_names_the_offending_text() {
        let transform = Transform::of::<i32>();
        let error = transform.read("seven").unwrap_err();
        assert!(error.to_string().contains("seven"));
    }

    #[test]
    fn custom_transform_applies_both_closures() {
        // Stores temperatures in tenths of a degree on the wire.
        let transform = Transform::with::<i32>(
            |text| text.parse::<i32>().map(|v| v / 10).map_err(|e| e.to_string()),
            |value| Ok((value * 10).to_string()),
        );
        let value = transform.read("250").unwrap();
        assert_eq!(*value.downcast::<i32>().unwrap(), 25);
        assert_eq!(transform.write(&25_i32).unwrap(), "250");
    }

    #[derive(Clone, PartialEq, Debug)]
    enum Suit {
        Hearts,
        Spades,
    }

    const SUITS: &[(&str, Suit)] = &[("hearts", Suit::Hearts), ("spades", Suit::Spades)];

    #[test]
    fn enumeration_rejects_unknown_names() {
        let transform = Transform::enumeration(SUITS);
        assert!(transform.read("clubs").is_err());
        assert_eq!(transform.write(&Suit::Spades).unwrap(), "spades");
    }
}
