//! Bridge between [`Value`] and `serde_json::Value`.
//!
//! Used for human-facing input and output: RPC parameters typed on a command
//! line, decoded messages printed as JSON.

use serde_json::{Map, Number};

use crate::error::JsonError;
use crate::value::Value;

impl Value {
    /// Convert to JSON.
    ///
    /// Nil becomes `null` and maps become objects in wire order (a duplicate
    /// key keeps its last value). Fails on non-string map keys, binary and
    /// extension values, and non-finite floats.
    pub fn to_json(&self) -> Result<serde_json::Value, JsonError> {
        Ok(match self {
            Value::Nil => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::Number(Number::from(*n)),
            Value::Float(x) => {
                serde_json::Value::Number(Number::from_f64(*x).ok_or(JsonError::NonFiniteFloat(*x))?)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_, _>>()?,
            ),
            Value::Map(entries) => {
                let mut object = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    let Value::String(key) = key else {
                        return Err(JsonError::NonStringKey(key.kind()));
                    };
                    object.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(object)
            }
            Value::Binary(_) | Value::Extension { .. } => {
                return Err(JsonError::Unsupported(self.kind()))
            }
        })
    }

    /// Convert from JSON.
    ///
    /// Numbers that fit `i64` become integers; every other number becomes a
    /// float.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(object) => Value::Map(
                object
                    .iter()
                    .map(|(k, v)| (Value::String(k.clone()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

impl TryFrom<&Value> for serde_json::Value {
    type Error = JsonError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.to_json()
    }
}
