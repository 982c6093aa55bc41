// SPDX-License-Identifier: GPL-3.0-only

//! Lenient deserializers for fields reported by introspection tools.
//!
//! Depending on the tool version a size can arrive as a JSON number, a quoted
//! number, a humanized string like `"63.9M"`, or `null`. Booleans show up as
//! `true`, `1`, `"1"` and friends. These helpers fold all of them into one
//! canonical scalar.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::common::{parse_flag, parse_size};

/// Byte count from a number, a numeric or humanized string, or `null`.
pub fn bytes<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| D::Error::custom(format!("invalid byte count {number}"))),
        Some(Value::String(text)) => parse_size(&text).map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!(
            "unexpected byte count value {other}"
        ))),
    }
}

/// Boolean from `true`/`false`, `1`/`0`, their string forms, `""` or `null`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(value)) => Ok(value),
        Some(Value::Number(number)) => match number.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(D::Error::custom(format!("invalid boolean {number}"))),
        },
        Some(Value::String(text)) => parse_flag(&text).map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!("unexpected boolean value {other}"))),
    }
}

/// `null` becomes the type's default (empty string, empty list).
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
