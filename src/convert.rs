//! JSON <-> [`Value`] conversion.
//!
//! Contexts usually arrive as JSON, and results are printed as JSON by the
//! CLI. `undefined` and functions have no JSON form and become `null`.
//!
//! ```
//! use serde_json::json;
//! use sift_lang::Value;
//!
//! let value = Value::from(json!({"a": [1, 2.5, "x"]}));
//! assert_eq!(value.to_json(), json!({"a": [1, 2.5, "x"]}));
//! ```

use crate::value::{Map, Value};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(obj) => {
                let map: Map = obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
                Value::from(map)
            }
        }
    }
}

impl Value {
    /// Convert to JSON. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}
