//! Field helpers for servers that send numbers as strings (or vice versa).

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl NumberOrText {
    fn parse<T, E>(self) -> Result<T, E>
    where
        T: FromStr,
        T::Err: Display,
        E: de::Error,
    {
        let text = match self {
            NumberOrText::Unsigned(v) => v.to_string(),
            NumberOrText::Signed(v) => v.to_string(),
            NumberOrText::Float(v) => v.to_string(),
            NumberOrText::Text(s) => s,
        };
        text.trim().parse::<T>().map_err(E::custom)
    }
}

/// Accept a JSON number or its decimal text for any `FromStr` target.
pub fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    NumberOrText::deserialize(deserializer)?.parse()
}

/// [`number`] for optional fields; `null` reads as `None`.
pub fn opt_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    Option::<NumberOrText>::deserialize(deserializer)?
        .map(NumberOrText::parse::<T, D::Error>)
        .transpose()
}
