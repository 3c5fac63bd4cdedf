//! Reservation divergence
//!
//! A checkout is prepared from a cart projection that is also persisted as a reservation. Before
//! the checkout is finalised the freshly computed projection is compared with the stored one to
//! catch carts that changed in between.

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

use crate::data::{CartData, VOLATILE_FIELDS};

/// Whether `current` differs from the `stored` projection of the same checkout.
///
/// Volatile fields are skipped; array fields are compared by the `item_id` of their elements.
pub fn different_cart_with_same_identifier(current: &Value, stored: &Value) -> bool {
    match (current, stored) {
        (Value::Object(current), Value::Object(stored)) => objects_differ(current, stored),
        (current, stored) => values_differ(current, stored),
    }
}

/// Typed variant of [`different_cart_with_same_identifier`].
///
/// # Errors
///
/// Returns an error when the projection cannot be serialized.
pub fn cart_diverges(current: &CartData, stored: &Value) -> Result<bool, serde_json::Error> {
    Ok(different_cart_with_same_identifier(
        &serde_json::to_value(current)?,
        stored,
    ))
}

fn objects_differ(current: &Map<String, Value>, stored: &Map<String, Value>) -> bool {
    current
        .iter()
        .filter(|(key, _)| !VOLATILE_FIELDS.contains(&key.as_str()))
        .any(|(key, value)| match stored.get(key) {
            Some(previous) => values_differ(value, previous),
            None => !value.is_null(),
        })
}

fn values_differ(current: &Value, stored: &Value) -> bool {
    match (current, stored) {
        (Value::Array(current), Value::Array(stored)) => arrays_differ(current, stored),
        (Value::Object(current), Value::Object(stored)) => objects_differ(current, stored),
        (Value::Number(current), Value::Number(stored)) => {
            current.as_f64() != stored.as_f64()
        }
        (current, stored) => current != stored,
    }
}

fn arrays_differ(current: &[Value], stored: &[Value]) -> bool {
    let current_ids = item_ids(current);
    let stored_ids = item_ids(stored);

    match (current_ids, stored_ids) {
        (Some(current), Some(stored)) => current != stored,
        _ => current != stored,
    }
}

fn item_ids(values: &[Value]) -> Option<FxHashSet<String>> {
    values
        .iter()
        .map(|value| {
            let id = value.get("item_id")?;
            let component = value.get("component").and_then(Value::as_str).unwrap_or("");
            let area = value.get("area").and_then(Value::as_str).unwrap_or("");

            Some(format!("{component}-{area}-{id}"))
        })
        .collect()
}
