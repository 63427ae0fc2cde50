//! Transforms and inline lambdas.
//!
//! A transform is a host function applied with the `|name(args...)` postfix
//! syntax. It receives the subject followed by the evaluated arguments. An
//! inline lambda argument (`fn(x) => ...`) arrives as a
//! [`Value::Function`] holding a [`Callable`].
//!
//! [`standard`] lists an optional library of common transforms, registered by
//! [`Sift::with_stdlib`](crate::Sift::with_stdlib).

use std::{fmt, sync::Arc};

use regex::Regex;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::{
    deferred::{Deferred, resolve_now, settled},
    evaluator::EvalError,
    grammar::operators::compare,
    value::Value,
};

type TransformFn = dyn Fn(Value, Vec<Value>) -> Deferred<'static> + Send + Sync;

/// A named transform's implementation.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    /// Wrap a synchronous function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value, Vec<Value>) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Transform(Arc::new(move |subject, args| settled(f(subject, args))))
    }

    /// Wrap a function whose result may not be available yet.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(Value, Vec<Value>) -> Deferred<'static> + Send + Sync + 'static,
    {
        Transform(Arc::new(f))
    }

    pub fn call(&self, subject: Value, args: Vec<Value>) -> Deferred<'static> {
        (self.0)(subject, args)
    }

    /// Call and settle immediately.
    pub fn call_sync(&self, subject: Value, args: Vec<Value>) -> Result<Value, EvalError> {
        resolve_now(self.call(subject, args))
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform")
    }
}

type CallableFn = dyn Fn(Vec<Value>) -> Deferred<'static> + Send + Sync;

/// An inline lambda, callable by the transform it was passed to.
///
/// Each call binds the positional arguments to the lambda's parameter names
/// and evaluates the body in that scope.
#[derive(Clone)]
pub struct Callable(Arc<CallableFn>);

impl Callable {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Deferred<'static> + Send + Sync + 'static,
    {
        Callable(Arc::new(f))
    }

    /// Evaluate the body, settling immediately.
    ///
    /// Fails with [`EvalError::Suspended`] if the body waits on a pending
    /// transform; use [`call_deferred`](Self::call_deferred) from async
    /// transforms.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        resolve_now(self.call_deferred(args))
    }

    pub fn call_deferred(&self, args: Vec<Value>) -> Deferred<'static> {
        (self.0)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable")
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The standard transform library.
pub fn standard() -> Vec<(&'static str, Transform)> {
    vec![
        // String transforms
        ("upper", Transform::new(upper)),
        ("lower", Transform::new(lower)),
        ("trim", Transform::new(trim)),
        ("split", Transform::new(split)),
        ("matches", Transform::new(matches)),
        // Array transforms
        ("join", Transform::new(join)),
        ("first", Transform::new(first)),
        ("last", Transform::new(last)),
        ("reverse", Transform::new(reverse)),
        ("sort", Transform::new(sort)),
        ("unique", Transform::new(unique)),
        ("flatten", Transform::new(flatten)),
        ("sum", Transform::new(sum)),
        ("min", Transform::new(min)),
        ("max", Transform::new(max)),
        ("avg", Transform::new(avg)),
        ("map", Transform::deferred(map)),
        ("filter", Transform::deferred(filter)),
        ("any", Transform::deferred(any)),
        ("all", Transform::deferred(all)),
        // Object transforms
        ("keys", Transform::new(keys)),
        ("values", Transform::new(values)),
        // Any value
        ("length", Transform::new(length)),
        ("type", Transform::new(type_of)),
    ]
}

fn expect_string<'a>(name: &str, value: &'a Value) -> Result<&'a str, EvalError> {
    value.as_str().ok_or_else(|| {
        EvalError::Type(format!("|{name} requires string, got {}", value.type_name()))
    })
}

fn expect_array<'a>(name: &str, value: &'a Value) -> Result<&'a [Value], EvalError> {
    value.as_array().ok_or_else(|| {
        EvalError::Type(format!("|{name} requires array, got {}", value.type_name()))
    })
}

fn expect_callable(name: &str, args: &[Value]) -> Result<Callable, EvalError> {
    match args.first() {
        Some(Value::Function(callable)) => Ok(callable.clone()),
        Some(other) => Err(EvalError::Type(format!(
            "|{name} requires a lambda argument, got {}",
            other.type_name()
        ))),
        None => Err(EvalError::Type(format!("|{name} requires a lambda argument"))),
    }
}

fn string_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a str, EvalError> {
    match args.first() {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(EvalError::Type(format!(
            "|{name} argument must be string, got {}",
            other.type_name()
        ))),
        None => Err(EvalError::Type(format!("|{name} requires a string argument"))),
    }
}

fn upper(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    Ok(Value::String(expect_string("upper", &subject)?.to_uppercase()))
}

fn lower(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    Ok(Value::String(expect_string("lower", &subject)?.to_lowercase()))
}

fn trim(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    Ok(Value::String(expect_string("trim", &subject)?.trim().to_string()))
}

/// |split(delimiter) - splits string into array
fn split(subject: Value, args: Vec<Value>) -> Result<Value, EvalError> {
    let s = expect_string("split", &subject)?;
    let delim = string_arg("split", &args)?;
    let parts: Vec<Value> = if delim.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(delim).map(Value::from).collect()
    };
    Ok(Value::from(parts))
}

/// |matches(pattern) - true if string matches regex pattern
fn matches(subject: Value, args: Vec<Value>) -> Result<Value, EvalError> {
    let pattern = string_arg("matches", &args)?;
    let re = Regex::new(pattern).map_err(|e| EvalError::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    match subject {
        Value::String(s) => Ok(Value::Boolean(re.is_match(&s))),
        _ => Ok(Value::Boolean(false)),
    }
}

/// |join(separator?) - joins elements as text, "," by default
fn join(subject: Value, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = expect_array("join", &subject)?;
    let separator = match args.first() {
        Some(_) => string_arg("join", &args)?,
        None => ",",
    };
    let parts: Vec<String> = items.iter().map(Value::to_text).collect();
    Ok(Value::String(parts.join(separator)))
}

fn first(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    Ok(expect_array("first", &subject)?.first().cloned().unwrap_or_default())
}

fn last(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    Ok(expect_array("last", &subject)?.last().cloned().unwrap_or_default())
}

fn reverse(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    match &subject {
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        _ => {
            let mut reversed = expect_array("reverse", &subject)?.to_vec();
            reversed.reverse();
            Ok(Value::from(reversed))
        }
    }
}

/// |sort - ascending; numbers numerically, strings lexicographically
fn sort(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    let mut sorted = expect_array("sort", &subject)?.to_vec();
    sorted.sort_by(|a, b| {
        if matches!(compare(a, b, std::cmp::Ordering::is_lt), Value::Boolean(true)) {
            std::cmp::Ordering::Less
        } else if matches!(compare(a, b, std::cmp::Ordering::is_gt), Value::Boolean(true)) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    });
    Ok(Value::from(sorted))
}

/// |unique - drops repeated elements, keeping the first occurrence
fn unique(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    let mut result: Vec<Value> = Vec::new();
    for item in expect_array("unique", &subject)? {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }
    Ok(Value::from(result))
}

/// |flatten - flattens nested arrays one level
fn flatten(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    let mut result = Vec::new();
    for item in expect_array("flatten", &subject)? {
        match item {
            Value::Array(inner) => result.extend(inner.iter().cloned()),
            other => result.push(other.clone()),
        }
    }
    Ok(Value::from(result))
}

/// |sum - integers stay integers until a float shows up
fn sum(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    let mut sum_int: i64 = 0;
    let mut sum_dec = Decimal::ZERO;
    let mut has_float = false;

    for item in expect_array("sum", &subject)? {
        match item {
            Value::Integer(n) if !has_float => match sum_int.checked_add(*n) {
                Some(total) => sum_int = total,
                None => {
                    return Err(EvalError::Type("|sum overflowed the integer range".to_string()));
                }
            },
            Value::Integer(n) => sum_dec += Decimal::from(*n),
            Value::Float(n) => {
                if !has_float {
                    sum_dec = Decimal::from(sum_int);
                    has_float = true;
                }
                sum_dec += Decimal::from_f64(*n).ok_or_else(|| {
                    EvalError::Type(format!("|sum cannot add non-finite value {n}"))
                })?;
            }
            other => {
                return Err(EvalError::Type(format!(
                    "|sum requires numeric values, got {}",
                    other.type_name()
                )));
            }
        }
    }

    if has_float {
        Ok(sum_dec.to_f64().map_or(Value::Float(f64::NAN), Value::Float))
    } else {
        Ok(Value::Integer(sum_int))
    }
}

fn extreme(name: &str, subject: &Value, wanted: fn(std::cmp::Ordering) -> bool) -> Result<Value, EvalError> {
    let mut best: Option<&Value> = None;
    for item in expect_array(name, subject)? {
        best = match best {
            None => Some(item),
            Some(current) if compare(item, current, wanted).is_truthy() => Some(item),
            keep => keep,
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn min(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    extreme("min", &subject, std::cmp::Ordering::is_lt)
}

fn max(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    extreme("max", &subject, std::cmp::Ordering::is_gt)
}

/// |avg - average of numeric elements, null when there are none
fn avg(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    let numbers: Vec<f64> = expect_array("avg", &subject)?
        .iter()
        .filter_map(Value::as_float)
        .collect();
    if numbers.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64))
}

/// |map(fn(item, index) => ...)
fn map(subject: Value, args: Vec<Value>) -> Deferred<'static> {
    Box::pin(async move {
        let items = expect_array("map", &subject)?;
        let callable = expect_callable("map", &args)?;
        let mut mapped = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            mapped.push(callable.call_deferred(vec![item.clone(), Value::from(index)]).await?);
        }
        Ok(Value::from(mapped))
    })
}

/// |filter(fn(item, index) => ...)
fn filter(subject: Value, args: Vec<Value>) -> Deferred<'static> {
    Box::pin(async move {
        let items = expect_array("filter", &subject)?;
        let callable = expect_callable("filter", &args)?;
        let mut kept = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let keep = callable.call_deferred(vec![item.clone(), Value::from(index)]).await?;
            if keep.is_truthy() {
                kept.push(item.clone());
            }
        }
        Ok(Value::from(kept))
    })
}

/// |any(fn(item, index) => ...)
fn any(subject: Value, args: Vec<Value>) -> Deferred<'static> {
    Box::pin(async move {
        let items = expect_array("any", &subject)?;
        let callable = expect_callable("any", &args)?;
        for (index, item) in items.iter().enumerate() {
            if callable.call_deferred(vec![item.clone(), Value::from(index)]).await?.is_truthy() {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    })
}

/// |all(fn(item, index) => ...)
fn all(subject: Value, args: Vec<Value>) -> Deferred<'static> {
    Box::pin(async move {
        let items = expect_array("all", &subject)?;
        let callable = expect_callable("all", &args)?;
        for (index, item) in items.iter().enumerate() {
            if !callable.call_deferred(vec![item.clone(), Value::from(index)]).await?.is_truthy() {
                return Ok(Value::Boolean(false));
            }
        }
        Ok(Value::Boolean(true))
    })
}

fn keys(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    match &subject {
        Value::Object(map) => Ok(Value::array(map.keys().map(|k| Value::from(k.as_str())))),
        other => Err(EvalError::Type(format!("|keys requires object, got {}", other.type_name()))),
    }
}

fn values(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    match &subject {
        Value::Object(map) => Ok(Value::array(map.values().cloned())),
        other => Err(EvalError::Type(format!("|values requires object, got {}", other.type_name()))),
    }
}

/// |length - characters of a string, elements of an array, keys of an object
fn length(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    match &subject {
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
        other => Err(EvalError::Type(format!("|length requires string, array or object, got {}", other.type_name()))),
    }
}

fn type_of(subject: Value, _args: Vec<Value>) -> Result<Value, EvalError> {
    let name = match subject {
        Value::Integer(_) | Value::Float(_) => "number",
        ref other => other.type_name(),
    };
    Ok(Value::from(name))
}
