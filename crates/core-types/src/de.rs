//! Lenient deserialization helpers for backend payloads.
//!
//! The backend is allowed to omit fields, send `null` where a list is
//! expected, or send `{}` where an object is absent. These helpers map all of
//! those onto the explicit empty states used by the rest of the workspace.

use std::fmt;

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::Deserialize;
use serde_json::Value;

/// Treats an explicit `null` the same as a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Maps `null`, a missing field, and `{}` to `None`.
pub fn empty_object_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some).map_err(de::Error::custom),
    }
}

/// Accepts `true`/`false`, `0`/`1`, and their string spellings.
///
/// CSV artifacts written by the bot store booleans as integers.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleBool;

    impl Visitor<'_> for FlexibleBool {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean, 0/1, or a boolean string")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::custom(format!("expected 0 or 1, got {other}"))),
            }
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::custom(format!("expected 0 or 1, got {other}"))),
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" | "" => Ok(false),
                other => Err(E::custom(format!("unrecognised boolean {other:?}"))),
            }
        }
    }

    deserializer.deserialize_any(FlexibleBool)
}
