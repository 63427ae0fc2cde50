// tests/engine_tests.rs

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::json;
use sift_lang::{Error, EvalError, ParentMap, Sift, Value};

fn upper_or_lower(value: Value, args: Vec<Value>) -> Result<Value, EvalError> {
    let text = value.to_text();
    let upper = args
        .first()
        .and_then(|opts| opts.get("case"))
        .is_some_and(|case| case.as_str() == Some("upper"));
    Ok(Value::from(if upper {
        text.to_uppercase()
    } else {
        text.to_lowercase()
    }))
}

fn doubled_sum(left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (l, r) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
    Ok(Value::Integer(l * 2 + r * 2))
}

// ============================================================================
// eval
// ============================================================================

#[tokio::test]
async fn test_eval_resolves() {
    let sift = Sift::new();
    assert_eq!(sift.eval("2+2", Value::Undefined, ParentMap::new()).await, Ok(Value::Integer(4)));
}

#[tokio::test]
async fn test_eval_rejects_syntax_errors() {
    let sift = Sift::new();
    let err = sift.eval("2++2", Value::Undefined, ParentMap::new()).await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(err.to_string().contains("unexpected"), "{err}");
}

#[tokio::test]
async fn test_eval_passes_context() {
    let sift = Sift::new();
    assert_eq!(
        sift.eval("foo", json!({"foo": "bar"}), ParentMap::new()).await,
        Ok(Value::from("bar"))
    );
}

#[tokio::test]
async fn test_eval_parent_context() {
    let sift = Sift::new();
    let context = Value::from(json!({
        "foo1": {"baz1": {"bar1": "ket"}},
        "list": [{"name": "oof", "id": 1}, {"name": "rab", "id": 2}]
    }));
    let parent = Value::object([
        ("startAt", context.clone()),
        ("sibling", Value::from(json!({"name": "oof"}))),
    ]);
    let parents = ParentMap::new().with(&context, parent).unwrap();

    assert_eq!(
        sift.eval("../sibling.name", context.clone(), parents.clone()).await,
        Ok(Value::from("oof"))
    );
    assert_eq!(
        sift.eval("list[.name == ../sibling.name]", context, parents).await,
        Ok(Value::from(json!([{"name": "oof", "id": 1}])))
    );
}

#[tokio::test]
async fn test_eval_relative_parent_chain() {
    let start_at = Value::from(json!({"foo2": {"baz2": {"bar2": "ket"}}}));
    let parent = Value::object([
        ("startAt", start_at.clone()),
        ("sibling", Value::from(json!({"name": "oof"}))),
    ]);
    let grand_parent1 = Value::object([("parent", parent.clone())]);
    let full_context = Value::object([
        ("grandParent1", grand_parent1.clone()),
        ("grandParent2", Value::from(json!({"name": "bar"}))),
    ]);

    let parents = ParentMap::new()
        .with(&start_at, parent.clone())
        .and_then(|p| p.with(&parent, grand_parent1.clone()))
        .and_then(|p| p.with(&grand_parent1, full_context))
        .unwrap();

    let sift = Sift::new();
    assert_eq!(
        sift.eval("../../../grandParent2.name", start_at.clone(), parents.clone())
            .await,
        Ok(Value::from("bar"))
    );
    assert_eq!(
        sift.eval("../../../../", start_at, parents).await,
        Err(Error::Eval(EvalError::ParentNotFound {
            requested: 4,
            found: 3
        }))
    );
}

// ============================================================================
// eval_sync
// ============================================================================

#[test]
fn test_eval_sync() {
    let sift = Sift::new();
    assert_eq!(sift.eval_sync("2+2", Value::Undefined), Ok(Value::Integer(4)));
    assert_eq!(sift.eval_sync("foo", json!({"foo": "bar"})), Ok(Value::from("bar")));

    let err = sift.eval_sync("2++2", Value::Undefined).unwrap_err();
    assert!(err.to_string().contains("unexpected"), "{err}");
}

// ============================================================================
// Transforms
// ============================================================================

#[tokio::test]
async fn test_add_transform() {
    let mut sift = Sift::new();
    sift.add_transform("toCase", upper_or_lower);
    assert_eq!(
        sift.eval(r#""hello"|toCase({case:"upper"})"#, Value::Undefined, ParentMap::new())
            .await,
        Ok(Value::from("HELLO"))
    );
}

#[test]
fn test_get_transform() {
    let mut sift = Sift::new();
    sift.add_transform("ret2", |_, _| Ok(Value::Integer(2)));

    let transform = sift.get_transform("ret2").expect("transform is registered");
    assert_eq!(transform.call_sync(Value::Undefined, vec![]), Ok(Value::Integer(2)));
    assert!(sift.get_transform("nope").is_none());
}

#[tokio::test]
async fn test_add_transforms_in_batch() {
    let mut sift = Sift::new();
    sift.add_transforms([
        (
            "add1",
            sift_lang::Transform::new(|v, _| sift_lang::grammar::operators::add(&v, &Value::Integer(1))),
        ),
        (
            "add2",
            sift_lang::Transform::new(|v, _| sift_lang::grammar::operators::add(&v, &Value::Integer(2))),
        ),
    ]);
    assert_eq!(
        sift.eval("2|add1|add2", Value::Undefined, ParentMap::new()).await,
        Ok(Value::Integer(5))
    );
}

#[tokio::test]
async fn test_deferred_transform() {
    let mut sift = Sift::new();
    sift.add_transform_deferred("later", |v, _| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(v)
        })
    });

    assert_eq!(
        sift.eval("{a: 1|later, b: [2|later]}", Value::Undefined, ParentMap::new())
            .await,
        Ok(Value::from(json!({"a": 1, "b": [2]})))
    );
    assert_eq!(
        sift.eval_sync("1|later", Value::Undefined),
        Err(Error::Eval(EvalError::Suspended))
    );
}

fn with_slow_transform() -> Sift {
    let mut sift = Sift::new();
    sift.add_transform_deferred("slow", |v, _| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(v)
        })
    });
    sift
}

#[tokio::test]
async fn test_sibling_members_wait_together() {
    let sift = with_slow_transform();
    let started = Instant::now();
    let result = sift
        .eval("[1|slow, 2|slow, 3|slow, 4|slow]", Value::Undefined, ParentMap::new())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result, Ok(Value::from(json!([1, 2, 3, 4]))));
    assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");
}

#[tokio::test]
async fn test_filter_elements_wait_together() {
    let sift = with_slow_transform();
    let started = Instant::now();
    let result = sift
        .eval(
            "xs[.n|slow > 1]",
            json!({"xs": [{"n": 1}, {"n": 2}, {"n": 3}, {"n": 4}]}),
            ParentMap::new(),
        )
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result, Ok(Value::from(json!([{"n": 2}, {"n": 3}, {"n": 4}]))));
    assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");
}

// ============================================================================
// Operators
// ============================================================================

#[tokio::test]
async fn test_add_binary_op() {
    let mut sift = Sift::new();
    sift.add_binary_op("_=", 20, |l, r| {
        Ok(Value::Boolean(l.to_text().to_lowercase() == r.to_text().to_lowercase()))
    });
    assert_eq!(
        sift.eval(r#""FoO" _= "fOo""#, Value::Undefined, ParentMap::new()).await,
        Ok(Value::Boolean(true))
    );
}

#[tokio::test]
async fn test_binary_op_weights() {
    let mut sift = Sift::new();
    sift.add_binary_op("**", 0, doubled_sum)
        .add_binary_op("***", 1000, doubled_sum);

    assert_eq!(
        sift.eval("1 + 2 ** 3 + 4", Value::Undefined, ParentMap::new()).await,
        Ok(Value::Integer(20))
    );
    assert_eq!(
        sift.eval("1 + 2 *** 3 + 4", Value::Undefined, ParentMap::new()).await,
        Ok(Value::Integer(15))
    );
}

#[tokio::test]
async fn test_add_unary_op() {
    let mut sift = Sift::new();
    sift.add_unary_op("~", |v| {
        Ok(Value::Integer(v.as_float().unwrap_or(f64::NAN).floor() as i64))
    });
    assert_eq!(
        sift.eval("~5.7 + 5", Value::Undefined, ParentMap::new()).await,
        Ok(Value::Integer(10))
    );
}

#[tokio::test]
async fn test_remove_ops() {
    let mut sift = Sift::new();
    sift.remove_op("+");
    let err = sift.eval("1+2", Value::Undefined, ParentMap::new()).await.unwrap_err();
    assert!(err.to_string().to_lowercase().contains("invalid"), "{err}");

    sift.remove_op("!");
    let err = sift.eval("!true", Value::Undefined, ParentMap::new()).await.unwrap_err();
    assert!(err.to_string().to_lowercase().contains("invalid"), "{err}");

    // Removing an unknown symbol is a no-op
    sift.remove_op("nope");
    assert_eq!(sift.eval_sync("2 * 3", Value::Undefined), Ok(Value::Integer(6)));
}

#[test]
fn test_short_circuit_op() {
    let mut sift = Sift::new();
    sift.add_short_circuit_op("??", 10, |left| (!left.is_nullish()).then(|| left.clone()));

    assert_eq!(sift.eval_sync("a ?? 'fallback'", json!({})), Ok(Value::from("fallback")));
    assert_eq!(sift.eval_sync("a ?? 1 / 0", json!({"a": 0})), Ok(Value::Integer(0)));
}

// ============================================================================
// Compiled expressions
// ============================================================================

#[test]
fn test_compiled_expression_is_reusable() {
    let sift = Sift::with_stdlib();
    let expr = sift.compile("items[.qty > 0]|map(fn(i) => i.price * i.qty)|sum").unwrap();
    assert_eq!(expr.source(), "items[.qty > 0]|map(fn(i) => i.price * i.qty)|sum");

    let order = json!({"items": [
        {"price": 2, "qty": 3},
        {"price": 5, "qty": 0},
        {"price": 1.5, "qty": 2}
    ]});
    assert_eq!(expr.eval_sync(order), Ok(Value::Integer(9)));
    assert_eq!(expr.eval_sync(json!({"items": []})), Ok(Value::Integer(0)));
}
