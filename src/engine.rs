//! The embedding facade.
//!
//! [`Sift`] owns a grammar, lets the host extend it, and evaluates expression
//! text against a context either asynchronously or with the immediate driver.
//!
//! ```
//! use serde_json::json;
//! use sift_lang::{Sift, Value};
//!
//! let mut sift = Sift::new();
//! sift.add_transform("half", |value, _| Ok(Value::from(value.as_float().unwrap_or(0.0) / 2.0)));
//!
//! let result = sift.eval_sync("foo|half + 3", json!({"foo": 10})).unwrap();
//! assert_eq!(result, Value::Integer(8));
//! ```

use std::{future::Future, sync::Arc};

use thiserror::Error;
use tracing::debug;

use crate::{
    ast::Expr,
    deferred::{Deferred, resolve_now},
    evaluator::{EvalError, Evaluator},
    grammar::Grammar,
    lexer::{LexError, Lexer},
    parents::ParentMap,
    parser::{ParseError, Parser},
    transform::{self, Transform},
    value::Value,
};

/// Any failure of a compile or evaluation call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// An expression engine with its own grammar.
///
/// Cloning is cheap: clones share the grammar until one of them registers or
/// removes something, at which point that clone gets a private copy.
/// Evaluations already in flight keep the grammar they started with.
#[derive(Debug, Clone, Default)]
pub struct Sift {
    grammar: Arc<Grammar>,
}

impl Sift {
    /// An engine with the default grammar and no transforms.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with the default grammar and the standard transforms.
    pub fn with_stdlib() -> Self {
        let mut sift = Self::new();
        sift.add_transforms(transform::standard());
        sift
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    fn grammar_mut(&mut self) -> &mut Grammar {
        Arc::make_mut(&mut self.grammar)
    }

    /// Register a binary operator. Higher weights bind tighter; the defaults
    /// range from 10 (`&&`, `||`) to 50 (`^`).
    pub fn add_binary_op<F>(&mut self, symbol: &str, weight: u32, eval: F) -> &mut Self
    where
        F: Fn(&Value, &Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.grammar_mut().add_binary_op(symbol, weight, eval);
        self
    }

    pub fn add_binary_op_deferred<F>(&mut self, symbol: &str, weight: u32, eval: F) -> &mut Self
    where
        F: Fn(Value, Value) -> Deferred<'static> + Send + Sync + 'static,
    {
        self.grammar_mut().add_binary_op_deferred(symbol, weight, eval);
        self
    }

    /// Register a binary operator that only evaluates its right operand when
    /// `guard` returns `None` for the left one.
    pub fn add_short_circuit_op<F>(&mut self, symbol: &str, weight: u32, guard: F) -> &mut Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.grammar_mut().add_short_circuit_op(symbol, weight, guard);
        self
    }

    pub fn add_unary_op<F>(&mut self, symbol: &str, eval: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.grammar_mut().add_unary_op(symbol, eval);
        self
    }

    pub fn add_unary_op_deferred<F>(&mut self, symbol: &str, eval: F) -> &mut Self
    where
        F: Fn(Value) -> Deferred<'static> + Send + Sync + 'static,
    {
        self.grammar_mut().add_unary_op_deferred(symbol, eval);
        self
    }

    /// Register a transform receiving the subject and the evaluated arguments.
    pub fn add_transform<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Value, Vec<Value>) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.grammar_mut().add_transform(name, Transform::new(f));
        self
    }

    pub fn add_transform_deferred<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Value, Vec<Value>) -> Deferred<'static> + Send + Sync + 'static,
    {
        self.grammar_mut().add_transform(name, Transform::deferred(f));
        self
    }

    /// Register several transforms at once.
    pub fn add_transforms<I, S>(&mut self, transforms: I) -> &mut Self
    where
        I: IntoIterator<Item = (S, Transform)>,
        S: AsRef<str>,
    {
        let grammar = self.grammar_mut();
        for (name, transform) in transforms {
            grammar.add_transform(name.as_ref(), transform);
        }
        self
    }

    /// Remove a binary or unary operator. Its symbol stops lexing, so later
    /// expressions using it fail.
    pub fn remove_op(&mut self, symbol: &str) -> &mut Self {
        self.grammar_mut().remove_op(symbol);
        self
    }

    pub fn get_transform(&self, name: &str) -> Option<Transform> {
        self.grammar.transform(name).cloned()
    }

    /// Lex and parse `text` against the current grammar.
    pub fn compile(&self, text: &str) -> Result<Expression, Error> {
        let tokens = Lexer::new(text, &self.grammar)?.tokenize()?;
        let ast = Parser::new(tokens, &self.grammar).parse()?;
        debug!(expression = text, "compiled expression");
        Ok(Expression {
            source: text.to_string(),
            ast: Arc::new(ast),
            grammar: self.grammar.clone(),
        })
    }

    /// Evaluate `text` against `context`, with `parents` available to `../`.
    pub fn eval(
        &self,
        text: &str,
        context: impl Into<Value>,
        parents: ParentMap,
    ) -> impl Future<Output = Result<Value, Error>> + Send + 'static {
        let compiled = self.compile(text);
        let context = context.into();
        async move { compiled?.eval(context, parents).await }
    }

    /// Evaluate `text` immediately.
    ///
    /// Fails with [`EvalError::Suspended`] if a transform or operator returns
    /// a value that is not ready yet.
    pub fn eval_sync(&self, text: &str, context: impl Into<Value>) -> Result<Value, Error> {
        self.compile(text)?.eval_sync(context)
    }
}

/// A compiled expression, bound to the grammar it was compiled with.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: Arc<Expr>,
    grammar: Arc<Grammar>,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn eval(
        &self,
        context: impl Into<Value>,
        parents: ParentMap,
    ) -> impl Future<Output = Result<Value, Error>> + Send + 'static {
        let evaluator = Evaluator::new(self.grammar.clone(), context.into(), Arc::new(parents));
        let ast = self.ast.clone();
        async move { Ok(evaluator.eval(&ast).await?) }
    }

    pub fn eval_sync(&self, context: impl Into<Value>) -> Result<Value, Error> {
        resolve_now(self.eval(context, ParentMap::new()))
    }

    /// Evaluate immediately with a parent map.
    pub fn eval_sync_with_parents(
        &self,
        context: impl Into<Value>,
        parents: ParentMap,
    ) -> Result<Value, Error> {
        resolve_now(self.eval(context, parents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    #[test]
    fn registrations_do_not_leak_between_clones() {
        init_test_logging();
        let base = Sift::new();
        let mut custom = base.clone();
        custom.add_binary_op("_=", 20, |l, r| {
            Ok(Value::Boolean(l.to_text().to_lowercase() == r.to_text().to_lowercase()))
        });

        assert_eq!(
            custom.eval_sync(r#""FoO" _= "fOo""#, Value::Undefined),
            Ok(Value::Boolean(true))
        );
        assert!(matches!(
            base.eval_sync(r#""FoO" _= "fOo""#, Value::Undefined),
            Err(Error::Lex(_))
        ));
    }

    #[test]
    fn compiled_expressions_keep_their_grammar() {
        init_test_logging();
        let mut sift = Sift::new();
        let expr = sift.compile("1 + 2").unwrap();
        sift.remove_op("+");

        assert_eq!(expr.eval_sync(Value::Undefined), Ok(Value::Integer(3)));
        assert!(sift.compile("1 + 2").is_err());
    }

    #[test]
    fn pending_values_fail_the_sync_driver() {
        let mut sift = Sift::new();
        sift.add_transform_deferred("later", |_, _| {
            Box::pin(std::future::pending::<Result<Value, EvalError>>())
        });
        assert_eq!(
            sift.eval_sync("1|later", Value::Undefined),
            Err(Error::Eval(EvalError::Suspended))
        );
    }
}
