//! The grammar: every symbol the lexer recognizes, the binary and unary
//! operators with their evaluation functions, and the named transforms.
//!
//! A grammar is mutated while an engine is being configured and read by the
//! lexer, parser and evaluator afterwards. Removing an operator removes both
//! its evaluation function and its lexical recognizability.

pub mod operators;

use std::{collections::HashMap, fmt, sync::Arc, sync::OnceLock};

use regex::Regex;
use tracing::debug;

use crate::{
    ast::TokenKind,
    deferred::{Deferred, settled},
    evaluator::EvalError,
    transform::Transform,
    value::Value,
};

/// Evaluation function of an eager binary operator.
pub type BinaryFn = Arc<dyn Fn(Value, Value) -> Deferred<'static> + Send + Sync>;

/// Evaluation function of a unary operator.
pub type UnaryFn = Arc<dyn Fn(Value) -> Deferred<'static> + Send + Sync>;

/// Decides from the left operand alone whether the right one is needed.
///
/// Returning `Some(value)` short-circuits with that value; `None` evaluates
/// the right operand and yields it.
pub type GuardFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// How a binary operator combines its operands.
#[derive(Clone)]
pub enum BinaryEval {
    /// Both operands are evaluated, then the function is applied
    Eager(BinaryFn),
    /// The right operand is only evaluated when the guard asks for it
    ShortCircuit(GuardFn),
}

/// A symbol known to the grammar.
#[derive(Clone)]
pub enum Element {
    /// Structural punctuation (`.`, `[`, `../`, ...)
    Punctuation(TokenKind),
    /// Infix operator; higher weights bind tighter
    Binary { weight: u32, eval: BinaryEval },
    /// Prefix operator
    Unary { eval: UnaryFn },
}

impl Element {
    pub fn kind(&self) -> TokenKind {
        match self {
            Element::Punctuation(kind) => *kind,
            Element::Binary { .. } => TokenKind::BinaryOp,
            Element::Unary { .. } => TokenKind::UnaryOp,
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Punctuation(kind) => f.debug_tuple("Punctuation").field(kind).finish(),
            Element::Binary { weight, .. } => {
                f.debug_struct("Binary").field("weight", weight).finish_non_exhaustive()
            }
            Element::Unary { .. } => f.debug_struct("Unary").finish_non_exhaustive(),
        }
    }
}

const PUNCTUATION: &[(&str, TokenKind)] = &[
    (".", TokenKind::Dot),
    ("[", TokenKind::OpenBracket),
    ("]", TokenKind::CloseBracket),
    ("{", TokenKind::OpenCurl),
    ("}", TokenKind::CloseCurl),
    ("(", TokenKind::OpenParen),
    (")", TokenKind::CloseParen),
    ("|", TokenKind::Pipe),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    ("?", TokenKind::Question),
    ("../", TokenKind::ParentRef),
    ("=>", TokenKind::Arrow),
];

/// Symbol and transform tables of one engine configuration.
///
/// Each engine owns its grammar, so registrations never leak between engines.
///
/// # Examples
///
/// ```
/// use sift_lang::{Grammar, Value};
///
/// let mut grammar = Grammar::default();
/// grammar.add_binary_op("_=", 20, |l, r| {
///     Ok(Value::Boolean(l.to_text().to_lowercase() == r.to_text().to_lowercase()))
/// });
/// assert_eq!(grammar.binary_weight("_="), Some(20));
///
/// grammar.remove_op("_=");
/// assert!(grammar.element("_=").is_none());
/// ```
#[derive(Clone)]
pub struct Grammar {
    elements: HashMap<String, Element>,
    transforms: HashMap<String, Transform>,
    splitter: OnceLock<Regex>,
}

impl Default for Grammar {
    /// The default language: punctuation, arithmetic, comparison, logic,
    /// `in` and `!`. No transforms.
    fn default() -> Self {
        let mut grammar = Grammar::empty();
        for (symbol, kind) in PUNCTUATION {
            grammar.insert(symbol, Element::Punctuation(*kind));
        }
        operators::install(&mut grammar);
        grammar
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<_> = self.elements.keys().collect();
        symbols.sort();
        let mut transforms: Vec<_> = self.transforms.keys().collect();
        transforms.sort();
        f.debug_struct("Grammar")
            .field("symbols", &symbols)
            .field("transforms", &transforms)
            .finish()
    }
}

impl Grammar {
    /// A grammar with no symbols at all.
    pub fn empty() -> Self {
        Grammar {
            elements: HashMap::new(),
            transforms: HashMap::new(),
            splitter: OnceLock::new(),
        }
    }

    fn insert(&mut self, symbol: &str, element: Element) {
        self.elements.insert(symbol.to_string(), element);
        self.splitter = OnceLock::new();
    }

    /// Register an eager binary operator.
    pub fn add_binary_op<F>(&mut self, symbol: &str, weight: u32, eval: F)
    where
        F: Fn(&Value, &Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.add_binary_op_deferred(symbol, weight, move |left, right| {
            settled(eval(&left, &right))
        });
    }

    /// Register a binary operator whose result may not be available yet.
    pub fn add_binary_op_deferred<F>(&mut self, symbol: &str, weight: u32, eval: F)
    where
        F: Fn(Value, Value) -> Deferred<'static> + Send + Sync + 'static,
    {
        debug!(symbol, weight, "registering binary operator");
        let eval = BinaryEval::Eager(Arc::new(eval));
        self.insert(symbol, Element::Binary { weight, eval });
    }

    /// Register a binary operator that may skip its right operand.
    pub fn add_short_circuit_op<F>(&mut self, symbol: &str, weight: u32, guard: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        debug!(symbol, weight, "registering short-circuit operator");
        let eval = BinaryEval::ShortCircuit(Arc::new(guard));
        self.insert(symbol, Element::Binary { weight, eval });
    }

    /// Register a unary (prefix) operator.
    pub fn add_unary_op<F>(&mut self, symbol: &str, eval: F)
    where
        F: Fn(&Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.add_unary_op_deferred(symbol, move |operand| settled(eval(&operand)));
    }

    /// Register a unary operator whose result may not be available yet.
    pub fn add_unary_op_deferred<F>(&mut self, symbol: &str, eval: F)
    where
        F: Fn(Value) -> Deferred<'static> + Send + Sync + 'static,
    {
        debug!(symbol, "registering unary operator");
        self.insert(symbol, Element::Unary { eval: Arc::new(eval) });
    }

    /// Remove a binary or unary operator. Unknown symbols and punctuation are
    /// left alone.
    pub fn remove_op(&mut self, symbol: &str) {
        if matches!(
            self.elements.get(symbol),
            Some(Element::Binary { .. } | Element::Unary { .. })
        ) {
            debug!(symbol, "removing operator");
            self.elements.remove(symbol);
            self.splitter = OnceLock::new();
        }
    }

    /// Register (or replace) a named transform.
    pub fn add_transform(&mut self, name: &str, transform: Transform) {
        debug!(name, "registering transform");
        self.transforms.insert(name.to_string(), transform);
    }

    pub fn transform(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }

    pub fn element(&self, symbol: &str) -> Option<&Element> {
        self.elements.get(symbol)
    }

    pub fn binary(&self, symbol: &str) -> Option<&BinaryEval> {
        match self.elements.get(symbol)? {
            Element::Binary { eval, .. } => Some(eval),
            _ => None,
        }
    }

    pub fn binary_weight(&self, symbol: &str) -> Option<u32> {
        match self.elements.get(symbol)? {
            Element::Binary { weight, .. } => Some(*weight),
            _ => None,
        }
    }

    pub fn unary(&self, symbol: &str) -> Option<&UnaryFn> {
        match self.elements.get(symbol)? {
            Element::Unary { eval } => Some(eval),
            _ => None,
        }
    }

    /// The regex that splits an expression into lexical items, built from the
    /// current symbol table and cached until the next mutation.
    pub(crate) fn splitter(&self) -> Result<&Regex, regex::Error> {
        if let Some(regex) = self.splitter.get() {
            return Ok(regex);
        }
        let regex = self.build_splitter()?;
        Ok(self.splitter.get_or_init(|| regex))
    }

    fn build_splitter(&self) -> Result<Regex, regex::Error> {
        let mut symbols: Vec<&str> = self.elements.keys().map(String::as_str).collect();
        // Longest first so `//` wins over `/` and `../` over `.`
        symbols.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut alternatives = vec![
            r#""(?:\\.|[^"\\])*""#.to_string(),
            r"'(?:\\.|[^'\\])*'".to_string(),
            r"\s+".to_string(),
            r"\d+(?:\.\d+)?".to_string(),
        ];
        alternatives.extend(symbols.into_iter().map(|symbol| {
            let escaped = regex::escape(symbol);
            if symbol.chars().all(|c| c.is_alphanumeric() || c == '_') {
                format!(r"\b{escaped}\b")
            } else {
                escaped
            }
        }));
        alternatives.push(r"[a-zA-Z_$][a-zA-Z0-9_$]*".to_string());

        Regex::new(&alternatives.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grammar_weights() {
        let grammar = Grammar::default();
        assert_eq!(grammar.binary_weight("+"), Some(30));
        assert_eq!(grammar.binary_weight("*"), Some(40));
        assert_eq!(grammar.binary_weight("&&"), Some(10));
        assert!(grammar.unary("!").is_some());
        assert!(grammar.binary_weight("!").is_none());
    }

    #[test]
    fn remove_op_ignores_punctuation_and_unknown_symbols() {
        let mut grammar = Grammar::default();
        grammar.remove_op(".");
        grammar.remove_op("nope");
        assert!(matches!(grammar.element("."), Some(Element::Punctuation(TokenKind::Dot))));

        grammar.remove_op("!");
        assert!(grammar.element("!").is_none());
    }

    #[test]
    fn symbols_are_unique_across_tables() {
        let mut grammar = Grammar::default();
        grammar.add_unary_op("in", |v| Ok(v.clone()));
        assert!(grammar.binary("in").is_none());
        assert!(grammar.unary("in").is_some());
    }

    #[test]
    fn splitter_is_rebuilt_after_mutation() {
        let mut grammar = Grammar::default();
        let before = grammar.splitter().unwrap().as_str().to_string();
        grammar.add_binary_op("***", 50, |l, _| Ok(l.clone()));
        let after = grammar.splitter().unwrap().as_str().to_string();
        assert_ne!(before, after);
        assert!(after.contains(r"\*\*\*"));
    }
}
