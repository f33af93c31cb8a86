//! Serde helpers for numbers that may arrive as strings
//!
//! The service is not consistent about numeric tokens: the same field can be
//! `42` in one frame and `"42"` in the next. Fields decorated with these
//! helpers accept both.
//!
//! ```rust
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Athlete {
//!     #[serde(deserialize_with = "sauce_core::lenient::number_or_string")]
//!     id: i64,
//!     #[serde(default, deserialize_with = "sauce_core::lenient::option_number_or_string")]
//!     power: Option<f64>,
//! }
//!
//! let a: Athlete = serde_json::from_str(r#"{"id":"7","power":250.5}"#).unwrap();
//! assert_eq!(a.id, 7);
//! assert_eq!(a.power, Some(250.5));
//! ```

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    Text(String),
}

impl<T> NumberOrString<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn into_number<E: de::Error>(self) -> Result<T, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(s) => s.trim().parse::<T>().map_err(E::custom),
        }
    }
}

/// Deserialize a number from either a JSON number or a JSON string
pub fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    NumberOrString::<T>::deserialize(deserializer)?.into_number()
}

/// Like [`number_or_string`], but `null` yields `None`
pub fn option_number_or_string<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    Option::<NumberOrString<T>>::deserialize(deserializer)?
        .map(NumberOrString::into_number)
        .transpose()
}
