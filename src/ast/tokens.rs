use std::fmt;

use crate::value::Value;

/// Category of a lexical item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// String, number, boolean or null literal
    ///
    /// # Examples
    /// ```text
    /// "hello"  'single'  42  -3.5  true  null
    /// ```
    Literal,

    /// Context key, property name or transform name
    ///
    /// Must start with a letter, `_` or `$`, followed by letters, digits,
    /// `_` or `$`.
    Identifier,

    /// Left parenthesis for grouping or transform arguments
    OpenParen,

    /// Right parenthesis
    CloseParen,

    /// Left bracket for filters and array literals
    OpenBracket,

    /// Right bracket
    CloseBracket,

    /// Left brace for object literals
    OpenCurl,

    /// Right brace
    CloseCurl,

    /// Property access, or a relative identifier at the start of a filter
    ///
    /// # Examples
    /// ```text
    /// foo.bar
    /// items[.price > 10]
    /// ```
    Dot,

    /// Transform application
    ///
    /// # Examples
    /// ```text
    /// name|upper
    /// list|join(", ")
    /// ```
    Pipe,

    /// Separator for arguments, array elements and object pairs
    Comma,

    /// Object literal key/value separator, conditional alternate
    Colon,

    /// Conditional operator
    Question,

    /// Any symbol registered as a binary operator in the grammar
    BinaryOp,

    /// Any symbol registered as a unary operator in the grammar
    UnaryOp,

    /// One parent hop (`../`)
    ///
    /// # Examples
    /// ```text
    /// ../sibling.name
    /// ../../config
    /// ```
    ParentRef,

    /// Lambda arrow (`=>`)
    Arrow,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Literal => "literal",
            TokenKind::Identifier => "identifier",
            TokenKind::OpenParen => "open paren",
            TokenKind::CloseParen => "close paren",
            TokenKind::OpenBracket => "open bracket",
            TokenKind::CloseBracket => "close bracket",
            TokenKind::OpenCurl => "open curl",
            TokenKind::CloseCurl => "close curl",
            TokenKind::Dot => "dot",
            TokenKind::Pipe => "pipe",
            TokenKind::Comma => "comma",
            TokenKind::Colon => "colon",
            TokenKind::Question => "question mark",
            TokenKind::BinaryOp => "binary operator",
            TokenKind::UnaryOp => "unary operator",
            TokenKind::ParentRef => "parent reference",
            TokenKind::Arrow => "arrow",
        };
        f.write_str(name)
    }
}

/// A single lexical item.
///
/// `value` holds the decoded literal for [`TokenKind::Literal`] and the
/// symbol or name as a string for everything else. `raw` is the exact source
/// text and `position` its byte offset in the expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Value,
    pub raw: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: Value, raw: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            value,
            raw: raw.into(),
            position,
        }
    }

    /// Whether a `-` following this token starts a negative number.
    pub(crate) fn allows_negation(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::BinaryOp
                | TokenKind::UnaryOp
                | TokenKind::OpenParen
                | TokenKind::OpenBracket
                | TokenKind::OpenCurl
                | TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::Question
                | TokenKind::Arrow
        )
    }
}
