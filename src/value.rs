use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::transform::Callable;

/// Ordered key/value storage backing [`Value::Object`].
pub type Map = IndexMap<String, Value>;

/// A dynamic value flowing through an expression.
///
/// Contexts supplied by the host, literals written in an expression and the
/// results of operators and transforms are all `Value`s.
///
/// # Identity
///
/// Arrays and objects are reference counted. Cloning one shares the same
/// allocation, so a clone keeps the *identity* of the original. The
/// [`ParentMap`](crate::ParentMap) relies on this to link a context to its
/// logical parent without embedding back-references in the data itself.
///
/// # Undefined vs null
///
/// A missing property resolves to [`Value::Undefined`], which is distinct from
/// an explicit [`Value::Null`].
///
/// # Examples
///
/// ```
/// use sift_lang::Value;
///
/// let user = Value::object([
///     ("name", Value::from("Ada")),
///     ("roles", Value::array([Value::from("admin")])),
/// ]);
///
/// assert_eq!(user.get("name"), Some(&Value::from("Ada")));
/// assert!(user.get("email").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Missing value (absent key, out-of-range index, no context)
    #[default]
    Undefined,

    /// Explicit null
    Null,

    /// Boolean (true/false)
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Ordered sequence of values
    Array(Arc<Vec<Value>>),

    /// Object with insertion-ordered string keys
    Object(Arc<Map>),

    /// Inline lambda handed to a transform
    Function(Callable),
}

impl Value {
    /// Build an array value.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Arc::new(items.into_iter().collect()))
    }

    /// Build an object value, keeping the order of `pairs`.
    pub fn object<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Arc::new(
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for both `undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Check if the value is truthy (for conditions and filters).
    ///
    /// `undefined`, `null`, `false`, `0`, `NaN` and the empty string are
    /// falsy. Every array and object is truthy, even when empty.
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Undefined | Null => false,
            Boolean(b) => *b,
            Integer(n) => *n != 0,
            Float(n) => *n != 0.0 && !n.is_nan(),
            String(s) => !s.is_empty(),
            Array(_) | Object(_) | Function(_) => true,
        }
    }

    /// Get as float, only for numeric values.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer. Floats only convert when they hold a whole number.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key on an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Coerce to a number the way arithmetic operators see it.
    ///
    /// Booleans become `0`/`1`, `null` and blank strings become `0`, numeric
    /// strings are parsed, and everything else is `NaN`.
    pub fn to_number(&self) -> Value {
        match self {
            Value::Integer(_) | Value::Float(_) => self.clone(),
            Value::Boolean(b) => Value::Integer(*b as i64),
            Value::Null => Value::Integer(0),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Value::Integer(0)
                } else if let Ok(n) = trimmed.parse::<i64>() {
                    Value::Integer(n)
                } else {
                    Value::Float(trimmed.parse::<f64>().unwrap_or(f64::NAN))
                }
            }
            _ => Value::Float(f64::NAN),
        }
    }

    /// Render as text (string concatenation, `in` on strings).
    pub fn to_text(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) if n.is_infinite() => {
                let text = if *n > 0.0 { "Infinity" } else { "-Infinity" };
                text.to_string()
            }
            Value::Float(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => self.to_json().to_string(),
            Value::Function(_) => "[function]".to_string(),
        }
    }

    /// Human-readable type name, used in error messages and the `type` transform.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Address of the shared allocation behind an array or object.
    ///
    /// Scalars have no identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(Arc::as_ptr(items) as *const () as usize),
            Value::Object(map) => Some(Arc::as_ptr(map) as *const () as usize),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality. Integers and floats compare numerically,
    /// functions compare by identity.
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Object(a), Object(b)) => Arc::ptr_eq(a, b) || a == b,
            (Function(a), Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or(Value::Float(n as f64), Value::Integer)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(Arc::new(map))
    }
}
