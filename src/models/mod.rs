//! Domain records and their gateway row shapes
//!
//! Domain types serialize with camelCase keys for the UI; `*Row` types carry
//! the gateway's snake_case column names. Conversions between the two live
//! next to each record.

mod collection;
mod item;
mod profile;
mod squad;

pub use collection::*;
pub use item::*;
pub use profile::*;
pub use squad::*;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Sparse column patch sent to the gateway: only the keys it contains change.
pub type RowPatch = Map<String, Value>;

/// Lets `Option<Option<T>>` tell an absent key (`None`) from an explicit
/// `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn put<T: serde::Serialize>(patch: &mut RowPatch, column: &str, value: T) {
    // Plain data types in this crate always serialize.
    let value = serde_json::to_value(value).unwrap_or(Value::Null);
    patch.insert(column.to_string(), value);
}
