use std::sync::Arc;

use crate::value::Value;

/// Abstract Syntax Tree node representing a parsed expression.
///
/// The tree is built bottom-up by the parser, owned by the expression it
/// belongs to and never mutated afterwards. Evaluation is a read-only walk.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    ///
    /// # Examples
    /// ```text
    /// 42
    /// "hello"
    /// true
    /// ```
    Literal(Value),

    /// Root identifier of a path
    ///
    /// `relative` identifiers (written with a leading dot) resolve against
    /// the narrowed context of a filter rather than the top-level context.
    ///
    /// # Examples
    /// ```text
    /// foo          // Identifier { name: "foo", relative: false }
    /// [.price]     // Identifier { name: "price", relative: true }
    /// ```
    Identifier { name: String, relative: bool },

    /// A run of leading `../` segments
    ///
    /// # Examples
    /// ```text
    /// ../          // ParentReference(1)
    /// ../../name   // Chain { root: ParentReference(2), .. }
    /// ```
    ParentReference(usize),

    /// Binary operation, dispatched through the grammar by symbol
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation, dispatched through the grammar by symbol
    Unary { op: String, operand: Box<Expr> },

    /// Conditional (`test ? consequent : alternate`)
    ///
    /// A missing consequent is the elvis form `test ?: alternate`, which
    /// yields the test value itself when it is truthy.
    Conditional {
        test: Box<Expr>,
        consequent: Option<Box<Expr>>,
        alternate: Box<Expr>,
    },

    /// Object literal, keys in source order
    ///
    /// # Example
    /// ```text
    /// {name: user.name, "total": price * qty}
    /// ```
    Object(Vec<(String, Expr)>),

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// ["foo", 1 + 2]
    /// ```
    Array(Vec<Expr>),

    /// Inline lambda, only valid as a transform argument
    ///
    /// # Example
    /// ```text
    /// list|map(fn(item, index) => item.name)
    /// ```
    Lambda { params: Vec<String>, body: Arc<Expr> },

    /// Access path rooted at an identifier, parent reference, literal or
    /// parenthesized subexpression
    ///
    /// # Examples
    /// ```text
    /// foo.bar[.tek == "baz"]|upper
    /// ../sibling.name
    /// ```
    Chain {
        root: Box<Expr>,
        segments: Vec<Segment>,
    },
}

/// One step of an access chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name`
    Property(String),

    /// `[expr]`
    ///
    /// Relative filters (the body mentions a relative identifier) test each
    /// element of the subject. Static filters are evaluated once and select an
    /// index, a key, or the whole subject when they produce a boolean.
    Filter { expr: Box<Expr>, relative: bool },

    /// `|name(args...)`
    Transform { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Does this expression reference a relative identifier?
    ///
    /// Nested filters and lambda bodies are their own scopes and are not
    /// searched.
    pub fn is_relative(&self) -> bool {
        match self {
            Expr::Identifier { relative, .. } => *relative,
            Expr::Literal(_) | Expr::ParentReference(_) | Expr::Lambda { .. } => false,
            Expr::Binary { left, right, .. } => left.is_relative() || right.is_relative(),
            Expr::Unary { operand, .. } => operand.is_relative(),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.is_relative()
                    || consequent.as_ref().is_some_and(|c| c.is_relative())
                    || alternate.is_relative()
            }
            Expr::Object(pairs) => pairs.iter().any(|(_, value)| value.is_relative()),
            Expr::Array(items) => items.iter().any(Expr::is_relative),
            Expr::Chain { root, segments } => {
                root.is_relative()
                    || segments.iter().any(|segment| match segment {
                        Segment::Transform { args, .. } => args.iter().any(Expr::is_relative),
                        Segment::Property(_) | Segment::Filter { .. } => false,
                    })
            }
        }
    }
}
