use std::{iter, sync::Arc};

use thiserror::Error;
use tracing::trace;

use crate::{
    ast::{Expr, Segment},
    deferred::{self, Deferred, resolved},
    grammar::{BinaryEval, Grammar},
    parents::ParentMap,
    transform::Callable,
    value::{Map, Value},
};

/// Errors that can occur while evaluating an expression.
///
/// Errors raised by host transforms and operators are passed through as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Operator symbol missing from the grammar at evaluation time
    #[error("Invalid {kind} operator '{symbol}'")]
    InvalidOperator { symbol: String, kind: &'static str },

    #[error("transform '{0}' is not defined")]
    UnknownTransform(String),

    /// A `../` run climbed past the last registered parent
    #[error("cannot resolve {requested} parent level(s): only {found} registered")]
    ParentNotFound { requested: usize, found: usize },

    /// Type mismatch or invalid operation for the given type
    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    /// The immediate driver met a value that is not ready yet
    #[error("evaluation suspended on a pending value; use the async entry point")]
    Suspended,

    /// Free-form failure reported by host code
    #[error("{0}")]
    Host(String),
}

/// Tree-walking evaluator.
///
/// Every node evaluates to a [`Deferred`], so host transforms and operators
/// returning pending futures compose with everything else. `context` is the
/// top-level context (identifiers and `../` start here); `rel_context` is the
/// narrowed context that relative identifiers read inside a filter.
#[derive(Debug, Clone)]
pub struct Evaluator {
    grammar: Arc<Grammar>,
    context: Value,
    rel_context: Value,
    parents: Arc<ParentMap>,
}

impl Evaluator {
    pub fn new(grammar: Arc<Grammar>, context: Value, parents: Arc<ParentMap>) -> Self {
        Evaluator {
            grammar,
            rel_context: context.clone(),
            context,
            parents,
        }
    }

    /// Same top-level context and parents, relative identifiers bound to
    /// `rel_context`.
    fn narrowed(&self, rel_context: Value) -> Self {
        Evaluator {
            grammar: self.grammar.clone(),
            context: self.context.clone(),
            rel_context,
            parents: self.parents.clone(),
        }
    }

    /// Evaluate `expr`. The first failure anywhere in the tree rejects the
    /// whole evaluation.
    pub fn eval<'a>(&'a self, expr: &'a Expr) -> Deferred<'a> {
        Box::pin(async move {
            match expr {
                Expr::Literal(value) => Ok(value.clone()),

                Expr::Identifier { name, relative } => {
                    let source = if *relative { &self.rel_context } else { &self.context };
                    Ok(property(source, name, false))
                }

                Expr::ParentReference(levels) => self.parents.ancestor(&self.context, *levels),

                Expr::Binary { op, left, right } => self.eval_binary(op, left, right).await,

                Expr::Unary { op, operand } => {
                    let eval = self
                        .grammar
                        .unary(op)
                        .ok_or_else(|| EvalError::InvalidOperator {
                            symbol: op.clone(),
                            kind: "unary",
                        })?;
                    let operand = self.eval(operand).await?;
                    eval(operand).await
                }

                Expr::Conditional {
                    test,
                    consequent,
                    alternate,
                } => {
                    let test = self.eval(test).await?;
                    match consequent {
                        _ if !test.is_truthy() => self.eval(alternate).await,
                        Some(consequent) => self.eval(consequent).await,
                        None => Ok(test),
                    }
                }

                Expr::Object(pairs) => {
                    let values = deferred::all(pairs.iter().map(|(_, value)| self.eval(value))).await?;
                    let map: Map = pairs
                        .iter()
                        .map(|(key, _)| key.clone())
                        .zip(values)
                        .collect();
                    Ok(Value::from(map))
                }

                Expr::Array(items) => {
                    let values = deferred::all(items.iter().map(|item| self.eval(item))).await?;
                    Ok(Value::from(values))
                }

                Expr::Lambda { .. } => Err(EvalError::Type(
                    "a lambda can only be passed to a transform".to_string(),
                )),

                Expr::Chain { root, segments } => self.eval_chain(root, segments).await,
            }
        })
    }

    async fn eval_binary(&self, op: &str, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        let eval = self
            .grammar
            .binary(op)
            .ok_or_else(|| EvalError::InvalidOperator {
                symbol: op.to_string(),
                kind: "binary",
            })?;

        match eval {
            BinaryEval::Eager(f) => {
                let left = self.eval(left).await?;
                let right = self.eval(right).await?;
                f(left, right).await
            }
            BinaryEval::ShortCircuit(guard) => {
                let left = self.eval(left).await?;
                match guard(&left) {
                    Some(decided) => Ok(decided),
                    None => self.eval(right).await,
                }
            }
        }
    }

    async fn eval_chain(&self, root: &Expr, segments: &[Segment]) -> Result<Value, EvalError> {
        let mut current = self.eval(root).await?;
        let mut after_filter = false;

        for segment in segments {
            current = match segment {
                Segment::Property(name) => property(&current, name, after_filter),
                Segment::Filter { expr, relative: true } => self.filter_relative(current, expr).await?,
                Segment::Filter { expr, relative: false } => self.filter_static(current, expr).await?,
                Segment::Transform { name, args } => self.apply_transform(current, name, args).await?,
            };
            after_filter = matches!(segment, Segment::Filter { .. });
        }

        Ok(current)
    }

    /// Keep the elements of `subject` for which `expr` holds, with each
    /// element as the relative context.
    async fn filter_relative<'e>(&self, subject: Value, expr: &'e Expr) -> Result<Value, EvalError> {
        match &subject {
            Value::Undefined | Value::Null => Ok(Value::array([])),
            Value::Array(items) => {
                let checks = items.iter().map(|item| {
                    let scope = self.narrowed(item.clone());
                    Box::pin(async move { scope.eval(expr).await }) as Deferred<'e>
                });
                let verdicts = deferred::all(checks).await?;
                let kept: Vec<Value> = items
                    .iter()
                    .zip(verdicts)
                    .filter(|(_, verdict)| verdict.is_truthy())
                    .map(|(item, _)| item.clone())
                    .collect();
                trace!(total = items.len(), kept = kept.len(), "filtered array");
                Ok(Value::from(kept))
            }
            _ => {
                let scope = self.narrowed(subject.clone());
                let keep = scope.eval(expr).await?.is_truthy();
                Ok(if keep { subject } else { Value::Undefined })
            }
        }
    }

    /// Evaluate `expr` once in the current scope and use the result as a
    /// predicate, an index or a key.
    async fn filter_static(&self, subject: Value, expr: &Expr) -> Result<Value, EvalError> {
        let key = self.eval(expr).await?;
        if let Value::Boolean(keep) = key {
            return Ok(if keep { subject } else { Value::Undefined });
        }
        Ok(index(&subject, &key))
    }

    async fn apply_transform(
        &self,
        subject: Value,
        name: &str,
        args: &[Expr],
    ) -> Result<Value, EvalError> {
        let transform = self
            .grammar
            .transform(name)
            .ok_or_else(|| EvalError::UnknownTransform(name.to_string()))?
            .clone();

        let args = deferred::all(args.iter().map(|arg| match arg {
            Expr::Lambda { params, body } => resolved(self.lambda(params, body)),
            other => self.eval(other),
        }))
        .await?;

        trace!(transform = name, args = args.len(), "applying transform");
        transform.call(subject, args).await
    }

    /// Turn an inline lambda into a callable value.
    ///
    /// Each call evaluates the body against a fresh object binding the
    /// parameters. That object's parent is this evaluation's top-level
    /// context, so `../` inside the body climbs out of the lambda.
    fn lambda(&self, params: &[String], body: &Arc<Expr>) -> Value {
        let grammar = self.grammar.clone();
        let outer = self.context.clone();
        let parents = self.parents.clone();
        let params = params.to_vec();
        let body = body.clone();

        Value::Function(Callable::new(move |args| {
            let scope: Map = params
                .iter()
                .cloned()
                .zip(args.into_iter().chain(iter::repeat(Value::Undefined)))
                .collect();
            let scope = Value::from(scope);

            let mut layer = ParentMap::layered(parents.clone());
            // Scalar contexts have no identity to hang a parent link on
            if outer.identity().is_some()
                && let Err(e) = layer.insert(&scope, outer.clone())
            {
                return deferred::rejected(EvalError::Host(e.to_string()));
            }

            let evaluator = Evaluator::new(grammar.clone(), scope, Arc::new(layer));
            let body = body.clone();
            Box::pin(async move { evaluator.eval(&body).await })
        }))
    }
}

/// `.name` on `subject`.
///
/// Arrays read from their first element. Directly after a filter, a missing
/// subject yields `null` instead of `undefined`.
fn property(subject: &Value, name: &str, after_filter: bool) -> Value {
    match subject {
        Value::Undefined | Value::Null if after_filter => Value::Null,
        Value::Array(items) => match items.first() {
            Some(first) => property(first, name, false),
            None => Value::Null,
        },
        Value::String(s) if name == "length" => Value::Integer(s.chars().count() as i64),
        Value::Object(map) => map.get(name).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

/// `subject[key]` for a non-boolean key.
fn index(subject: &Value, key: &Value) -> Value {
    match (subject, key) {
        (Value::Array(items), _) => key
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default(),
        (Value::String(s), _) => key
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default(),
        (Value::Object(map), Value::String(k)) => map.get(k).cloned().unwrap_or_default(),
        (Value::Object(map), Value::Integer(_) | Value::Float(_)) => {
            map.get(&key.to_text()).cloned().unwrap_or_default()
        }
        _ => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deferred::resolve_now, lexer::Lexer, parser::Parser};

    fn eval_in(input: &str, context: Value) -> Result<Value, EvalError> {
        let grammar = Arc::new(Grammar::default());
        let tokens = Lexer::new(input, &grammar).and_then(Lexer::tokenize).unwrap();
        let expr = Parser::new(tokens, &grammar).parse().unwrap();
        let evaluator = Evaluator::new(grammar, context, Arc::new(ParentMap::new()));
        resolve_now(evaluator.eval(&expr))
    }

    fn eval(input: &str) -> Result<Value, EvalError> {
        eval_in(input, Value::Undefined)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Ok(Value::Integer(7)));
        assert_eq!(eval("(1 + 2) * 3"), Ok(Value::Integer(9)));
        assert_eq!(eval("7 // 2"), Ok(Value::Integer(3)));
        assert_eq!(eval("1 / 0"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn logic_yields_deciding_operand() {
        assert_eq!(eval("0 || 'x'"), Ok(Value::from("x")));
        assert_eq!(eval("'' && 1 / 0"), Ok(Value::from("")));
        assert_eq!(eval("\"foo\" && 6 >= 6 && 0 + 1 && true"), Ok(Value::Boolean(true)));
    }

    #[test]
    fn conditional_skips_untaken_branch() {
        assert_eq!(eval("1 ? 'a' : 1 / 0"), Ok(Value::from("a")));
        assert_eq!(eval("'' ? 1 : 2"), Ok(Value::Integer(2)));
        assert_eq!(eval("'foo' ?: 'bar'"), Ok(Value::from("foo")));
    }

    #[test]
    fn property_access_rules() {
        let ctx = Value::object([(
            "list",
            Value::array([Value::object([("a", Value::Integer(1))])]),
        )]);
        assert_eq!(eval_in("list.a", ctx.clone()), Ok(Value::Integer(1)));
        assert_eq!(eval_in("missing.a", ctx.clone()), Ok(Value::Undefined));
        assert_eq!(eval_in("missing[.a == 1]", ctx.clone()), Ok(Value::array([])));
        assert_eq!(eval_in("list[.a == 2].a", ctx), Ok(Value::Null));
        assert_eq!(eval("\"\".length"), Ok(Value::Integer(0)));
    }

    #[test]
    fn static_filters_index_and_select() {
        let ctx = Value::object([
            ("xs", Value::array([Value::from("a"), Value::from("b")])),
            ("obj", Value::object([("1", Value::from("one"))])),
        ]);
        assert_eq!(eval_in("xs[1]", ctx.clone()), Ok(Value::from("b")));
        assert_eq!(eval_in("xs[5]", ctx.clone()), Ok(Value::Undefined));
        assert_eq!(eval_in("obj[1]", ctx.clone()), Ok(Value::from("one")));
        assert_eq!(eval_in("'abc'[2]", ctx.clone()), Ok(Value::from("c")));
        assert_eq!(eval_in("xs[false]", ctx), Ok(Value::Undefined));
    }

    #[test]
    fn non_array_relative_filter_tests_subject() {
        let ctx = Value::object([("o", Value::object([("n", Value::Integer(3))]))]);
        assert_eq!(
            eval_in("o[.n > 2].n", ctx.clone()),
            Ok(Value::Integer(3))
        );
        assert_eq!(eval_in("o[.n > 5].n", ctx), Ok(Value::Null));
    }

    #[test]
    fn removed_operator_fails_at_eval_time() {
        let mut grammar = Grammar::default();
        let tokens = Lexer::new("1 + 2", &grammar).and_then(Lexer::tokenize).unwrap();
        let expr = Parser::new(tokens, &grammar).parse().unwrap();

        grammar.remove_op("+");
        let evaluator = Evaluator::new(Arc::new(grammar), Value::Undefined, Arc::default());
        let err = resolve_now(evaluator.eval(&expr)).unwrap_err();
        assert!(err.to_string().contains("Invalid"));
    }

    #[test]
    fn test_unknown_transform() {
        assert_eq!(
            eval("1|nope"),
            Err(EvalError::UnknownTransform("nope".to_string()))
        );
    }
}
