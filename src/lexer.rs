use regex::Regex;
use thiserror::Error;
use tracing::trace;

use crate::{
    ast::{Token, TokenKind},
    grammar::Grammar,
    value::Value,
};

/// Errors raised while splitting an expression into tokens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    /// Text that is neither a literal, an identifier nor a registered symbol
    #[error("Invalid expression token '{token}' at position {position}")]
    InvalidToken { token: String, position: usize },

    /// A quote with no closing partner
    #[error("Invalid expression: unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    /// A numeric literal that does not fit any number type
    #[error("Invalid number literal '{literal}' at position {position}")]
    InvalidNumber { literal: String, position: usize },

    /// The grammar's symbols could not be assembled into a scanner
    #[error("Invalid grammar: {0}")]
    Grammar(String),
}

/// Grammar-driven tokenizer.
///
/// At every position the longest registered symbol wins, so a custom `**`
/// lexes as one operator rather than two `*`. Because the symbol table is
/// read from the live grammar, removing an operator makes its symbol an
/// invalid token.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    grammar: &'a Grammar,
    splitter: &'a Regex,
    prefix_position: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, grammar: &'a Grammar) -> Result<Self, LexError> {
        let splitter = grammar
            .splitter()
            .map_err(|e| LexError::Grammar(e.to_string()))?;
        Ok(Lexer {
            input,
            position: 0,
            grammar,
            splitter,
            prefix_position: true,
        })
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        trace!(count = tokens.len(), "tokenized expression");
        Ok(tokens)
    }

    /// Produce the next token, or `None` at the end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        loop {
            let Some(piece) = self.read_piece()? else {
                return Ok(None);
            };
            let (start, text) = piece;

            if text.trim().is_empty() {
                continue;
            }

            let token = if text == "-" && self.prefix_position && self.number_follows() {
                self.skip_whitespace();
                let (_, digits) = self.read_piece()?.ok_or(LexError::InvalidToken {
                    token: text.to_string(),
                    position: start,
                })?;
                let raw = &self.input[start..self.position];
                Token::new(TokenKind::Literal, negate(parse_number(digits, start)?), raw, start)
            } else {
                self.classify(text, start)?
            };

            self.prefix_position = token.allows_negation();
            return Ok(Some(token));
        }
    }

    fn read_piece(&mut self) -> Result<Option<(usize, &'a str)>, LexError> {
        let start = self.position;
        if start >= self.input.len() {
            return Ok(None);
        }
        match self.splitter.find_at(self.input, start) {
            Some(m) if m.start() == start && !m.is_empty() => {
                self.position = m.end();
                Ok(Some((start, m.as_str())))
            }
            _ => Err(self.unrecognized(start)),
        }
    }

    fn number_follows(&self) -> bool {
        self.input[self.position..]
            .trim_start()
            .starts_with(|c: char| c.is_ascii_digit())
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.position..];
        self.position += rest.len() - rest.trim_start().len();
    }

    fn unrecognized(&self, start: usize) -> LexError {
        let rest = &self.input[start..];
        let ch = rest.chars().next().unwrap_or_default();
        if ch == '"' || ch == '\'' {
            LexError::UnterminatedString { position: start }
        } else {
            LexError::InvalidToken {
                token: ch.to_string(),
                position: start,
            }
        }
    }

    fn classify(&self, text: &str, start: usize) -> Result<Token, LexError> {
        let first = text.chars().next().unwrap_or_default();

        if first == '"' || first == '\'' {
            return Ok(Token::new(TokenKind::Literal, Value::String(unquote(text)), text, start));
        }
        if first.is_ascii_digit() {
            return Ok(Token::new(TokenKind::Literal, parse_number(text, start)?, text, start));
        }
        if let Some(element) = self.grammar.element(text) {
            return Ok(Token::new(element.kind(), Value::from(text), text, start));
        }

        let literal = match text {
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            "null" => Some(Value::Null),
            _ => None,
        };
        if let Some(value) = literal {
            return Ok(Token::new(TokenKind::Literal, value, text, start));
        }

        if first.is_ascii_alphabetic() || first == '_' || first == '$' {
            return Ok(Token::new(TokenKind::Identifier, Value::from(text), text, start));
        }

        Err(LexError::InvalidToken {
            token: text.to_string(),
            position: start,
        })
    }
}

fn parse_number(text: &str, position: usize) -> Result<Value, LexError> {
    let invalid = || LexError::InvalidNumber {
        literal: text.to_string(),
        position,
    };
    if text.contains('.') {
        text.parse::<f64>().map(Value::Float).map_err(|_| invalid())
    } else {
        match text.parse::<i64>() {
            Ok(n) => Ok(Value::Integer(n)),
            Err(_) => text.parse::<f64>().map(Value::Float).map_err(|_| invalid()),
        }
    }
}

fn negate(value: Value) -> Value {
    match value {
        Value::Integer(n) => Value::Integer(-n),
        Value::Float(n) => Value::Float(-n),
        other => other,
    }
}

/// Strip the quotes from a string literal and resolve its escapes.
fn unquote(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(c @ ('"' | '\'' | '\\')) => result.push(c),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let grammar = Grammar::default();
        Lexer::new(input, &grammar)
            .and_then(Lexer::tokenize)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords() {
        let grammar = Grammar::default();
        let tokens = Lexer::new("true false null in", &grammar)
            .and_then(Lexer::tokenize)
            .unwrap();
        assert_eq!(tokens[0].value, Value::Boolean(true));
        assert_eq!(tokens[1].value, Value::Boolean(false));
        assert_eq!(tokens[2].value, Value::Null);
        assert_eq!(tokens[3].kind, TokenKind::BinaryOp);
    }

    #[test]
    fn test_pipe() {
        use TokenKind::*;
        assert_eq!(
            kinds("name | upper"),
            vec![Identifier, Pipe, Identifier]
        );
    }

    #[test]
    fn word_operators_need_word_boundaries() {
        use TokenKind::*;
        assert_eq!(kinds("index in inside"), vec![Identifier, BinaryOp, Identifier]);
    }

    #[test]
    fn negative_numbers_only_in_prefix_position() {
        let grammar = Grammar::default();
        let tokens = Lexer::new("-1 - -2.5", &grammar)
            .and_then(Lexer::tokenize)
            .unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].value, Value::Integer(-1));
        assert_eq!(tokens[1].kind, TokenKind::BinaryOp);
        assert_eq!(tokens[2].value, Value::Float(-2.5));
        assert_eq!(tokens[2].raw, "-2.5");
    }

    #[test]
    fn unquote_handles_escapes() {
        assert_eq!(unquote(r#""Wo\"rld""#), "Wo\"rld");
        assert_eq!(unquote(r"'it\'s'"), "it's");
        assert_eq!(unquote(r#""a\\b""#), "a\\b");
    }
}
