use thiserror::Error;
use tracing::trace;

use crate::{
    ast::{Expr, Segment, Token, TokenKind},
    grammar::Grammar,
    value::Value,
};

/// Syntax errors. Every message carries the word "unexpected" so hosts can
/// tell malformed input apart from evaluation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("token '{token}' ({kind}) unexpected at position {position}")]
    UnexpectedToken {
        token: String,
        kind: TokenKind,
        position: usize,
    },

    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    /// `fn(...) => ...` written anywhere but directly in a transform's
    /// argument list
    #[error("unexpected lambda at position {position}: lambdas are only allowed as transform arguments")]
    LambdaOutsideTransform { position: usize },

    #[error("unexpected nesting at position {position}: expressions nest at most {} levels", MAX_DEPTH)]
    TooDeep { position: usize },
}

/// Deepest nesting of groups, literals, filters and unary operators.
pub const MAX_DEPTH: usize = 128;

/// Recursive descent parser with precedence climbing for binary operators.
///
/// Operator weights come from the grammar, so a custom operator binds exactly
/// as tightly as it was registered.
pub struct Parser<'g> {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    grammar: &'g Grammar,
}

impl<'g> Parser<'g> {
    pub fn new(tokens: Vec<Token>, grammar: &'g Grammar) -> Self {
        Parser {
            tokens,
            position: 0,
            depth: 0,
            grammar,
        }
    }

    /// Parse a complete expression; leftover tokens are an error.
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::UnexpectedEnd {
                expected: "an expression",
            });
        }
        let expr = self.parse_expression()?;
        if let Some(token) = self.peek() {
            return Err(unexpected(token));
        }
        trace!(tokens = self.tokens.len(), "parsed expression");
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn next(&mut self, expected: &'static str) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(ParseError::UnexpectedEnd { expected })?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, ParseError> {
        let token = self.next(expected)?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(unexpected(&token))
        }
    }

    /// Consume `kind` if it is next.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn identifier(&mut self, expected: &'static str) -> Result<String, ParseError> {
        let token = self.expect(TokenKind::Identifier, expected)?;
        Ok(token.raw)
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            let position = self.peek().map_or(0, |t| t.position);
            return Err(ParseError::TooDeep { position });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_conditional)
    }

    /// `binary ( '?' expr? ':' expr )?`
    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_binary(0)?;
        if !self.eat(TokenKind::Question) {
            return Ok(test);
        }

        let consequent = if self.eat(TokenKind::Colon) {
            None
        } else {
            let consequent = self.parse_expression()?;
            self.expect(TokenKind::Colon, "':' of a conditional")?;
            Some(Box::new(consequent))
        };
        let alternate = self.parse_expression()?;

        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent,
            alternate: Box::new(alternate),
        })
    }

    fn parse_binary(&mut self, min_weight: u32) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            if token.kind != TokenKind::BinaryOp {
                break;
            }
            let Some(weight) = self.grammar.binary_weight(&token.raw) else {
                break;
            };
            if weight < min_weight {
                break;
            }
            let op = token.raw.clone();
            self.position += 1;

            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEnd {
                    expected: "right operand",
                });
            }
            let right = self.parse_binary(weight.saturating_add(1))?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::UnaryOp) {
            let op = self.next("unary operator")?.raw;
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_chain()
    }

    fn parse_chain(&mut self) -> Result<Expr, ParseError> {
        let root = self.parse_primary()?;
        let mut segments = Vec::new();

        // `../name` continues straight into the ancestor's property
        if matches!(root, Expr::ParentReference(_)) && self.check(TokenKind::Identifier) {
            segments.push(Segment::Property(self.identifier("property name")?));
        }

        loop {
            match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    self.position += 1;
                    segments.push(Segment::Property(self.identifier("property name after '.'")?));
                }
                Some(TokenKind::OpenBracket) => {
                    self.position += 1;
                    let expr = self.parse_expression()?;
                    self.expect(TokenKind::CloseBracket, "']'")?;
                    let relative = expr.is_relative();
                    segments.push(Segment::Filter {
                        expr: Box::new(expr),
                        relative,
                    });
                }
                Some(TokenKind::Pipe) => {
                    self.position += 1;
                    let name = self.identifier("transform name after '|'")?;
                    let args = if self.eat(TokenKind::OpenParen) {
                        self.parse_arguments()?
                    } else {
                        Vec::new()
                    };
                    segments.push(Segment::Transform { name, args });
                }
                _ => break,
            }
        }

        if segments.is_empty() {
            Ok(root)
        } else {
            Ok(Expr::Chain {
                root: Box::new(root),
                segments,
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.next("an operand")?;
        match token.kind {
            TokenKind::Literal => Ok(Expr::Literal(token.value)),

            TokenKind::Identifier => {
                if token.raw == "fn" && self.check(TokenKind::OpenParen) {
                    return Err(ParseError::LambdaOutsideTransform {
                        position: token.position,
                    });
                }
                Ok(Expr::Identifier {
                    name: token.raw,
                    relative: false,
                })
            }

            // `.name` at operand position reads from the narrowed context
            TokenKind::Dot => Ok(Expr::Identifier {
                name: self.identifier("identifier after '.'")?,
                relative: true,
            }),

            TokenKind::ParentRef => {
                let mut levels = 1;
                while self.eat(TokenKind::ParentRef) {
                    levels += 1;
                }
                Ok(Expr::ParentReference(levels))
            }

            TokenKind::OpenParen => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::CloseParen, "')'")?;
                Ok(expr)
            }

            TokenKind::OpenBracket => self.parse_array(),
            TokenKind::OpenCurl => self.parse_object(),

            _ => Err(unexpected(&token)),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        while !self.eat(TokenKind::CloseBracket) {
            items.push(self.parse_expression()?);
            if !self.check(TokenKind::CloseBracket) {
                self.expect(TokenKind::Comma, "',' or ']'")?;
            }
        }
        Ok(Expr::Array(items))
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let mut pairs = Vec::new();
        while !self.eat(TokenKind::CloseCurl) {
            let key = self.next("object key")?;
            let key = match (key.kind, &key.value) {
                (TokenKind::Identifier, _) => key.raw,
                (TokenKind::Literal, Value::String(s)) => s.clone(),
                _ => return Err(unexpected(&key)),
            };
            self.expect(TokenKind::Colon, "':' after object key")?;
            pairs.push((key, self.parse_expression()?));
            if !self.check(TokenKind::CloseCurl) {
                self.expect(TokenKind::Comma, "',' or '}'")?;
            }
        }
        Ok(Expr::Object(pairs))
    }

    /// Transform arguments after the opening paren, up to and including `)`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        while !self.eat(TokenKind::CloseParen) {
            let arg = if self.lambda_ahead() {
                self.parse_lambda()?
            } else {
                self.parse_expression()?
            };
            args.push(arg);
            if !self.check(TokenKind::CloseParen) {
                self.expect(TokenKind::Comma, "',' or ')'")?;
            }
        }
        Ok(args)
    }

    fn lambda_ahead(&self) -> bool {
        let fn_keyword = self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Identifier && t.raw == "fn");
        let paren = self
            .tokens
            .get(self.position + 1)
            .is_some_and(|t| t.kind == TokenKind::OpenParen);
        fn_keyword && paren
    }

    /// `fn(a, b) => body`
    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        self.position += 2;
        let mut params = Vec::new();
        while !self.eat(TokenKind::CloseParen) {
            params.push(self.identifier("lambda parameter")?);
            if !self.check(TokenKind::CloseParen) {
                self.expect(TokenKind::Comma, "',' or ')'")?;
            }
        }
        self.expect(TokenKind::Arrow, "'=>' after lambda parameters")?;
        let body = self.parse_expression()?;
        Ok(Expr::Lambda {
            params,
            body: body.into(),
        })
    }
}

fn unexpected(token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        token: token.raw.clone(),
        kind: token.kind,
        position: token.position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_with(input: &str, grammar: &Grammar) -> Result<Expr, ParseError> {
        let tokens = Lexer::new(input, grammar).and_then(Lexer::tokenize).unwrap();
        Parser::new(tokens, grammar).parse()
    }

    fn parse(input: &str) -> Result<Expr, ParseError> {
        parse_with(input, &Grammar::default())
    }

    fn int(n: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Integer(n)))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: "+".into(),
                left: int(1),
                right: Box::new(Expr::Binary {
                    op: "*".into(),
                    left: int(2),
                    right: int(3),
                }),
            }
        );
    }

    #[test]
    fn equal_weights_group_left() {
        let expr = parse("1 - 2 - 3").unwrap();
        let Expr::Binary { left, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(right, int(3));
        assert!(matches!(*left, Expr::Binary { .. }));
    }

    #[test]
    fn custom_weight_decides_grouping() {
        let mut grammar = Grammar::default();
        grammar.add_binary_op("**", 0, |l, _| Ok(l.clone()));
        let Expr::Binary { op, .. } = parse_with("1 + 2 ** 3 + 4", &grammar).unwrap() else {
            panic!("expected binary");
        };
        assert_eq!(op, "**");
    }

    #[test]
    fn test_elvis() {
        let expr = parse("a ?: b").unwrap();
        assert!(matches!(expr, Expr::Conditional { consequent: None, .. }));
    }

    #[test]
    fn parent_run_folds_into_one_node() {
        let expr = parse("../../name").unwrap();
        assert_eq!(
            expr,
            Expr::Chain {
                root: Box::new(Expr::ParentReference(2)),
                segments: vec![Segment::Property("name".into())],
            }
        );
        assert_eq!(parse("../").unwrap(), Expr::ParentReference(1));
    }

    #[test]
    fn filters_know_if_they_are_relative() {
        let Expr::Chain { segments, .. } = parse("a[.b == 1][0]").unwrap() else {
            panic!("expected chain");
        };
        assert!(matches!(segments[0], Segment::Filter { relative: true, .. }));
        assert!(matches!(segments[1], Segment::Filter { relative: false, .. }));
    }

    #[test]
    fn lambdas_only_in_transform_arguments() {
        let Expr::Chain { segments, .. } = parse("xs|map(fn(x, i) => x + i)").unwrap() else {
            panic!("expected chain");
        };
        let Segment::Transform { name, args } = &segments[0] else {
            panic!("expected transform");
        };
        assert_eq!(name, "map");
        assert!(matches!(&args[0], Expr::Lambda { params, .. } if params == &["x", "i"]));

        assert_eq!(
            parse("fn(x) => x"),
            Err(ParseError::LambdaOutsideTransform { position: 0 })
        );
    }

    #[test]
    fn heaviest_weight_binds_tightest() {
        let mut grammar = Grammar::default();
        grammar.add_binary_op("@", u32::MAX, |l, _| Ok(l.clone()));
        let Expr::Binary { op, left, right } = parse_with("1 @ 2 + 3", &grammar).unwrap() else {
            panic!("expected binary");
        };
        assert_eq!(op, "+");
        assert_eq!(right, int(3));
        assert!(matches!(*left, Expr::Binary { ref op, .. } if op == "@"));
    }

    #[test]
    fn nesting_is_bounded() {
        let ok = format!("{}1{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        assert_eq!(parse(&ok), Ok(Expr::Literal(Value::Integer(1))));

        let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(parse(&deep), Err(ParseError::TooDeep { .. })));

        let negations = format!("{}true", "!".repeat(10_000));
        assert!(matches!(parse(&negations), Err(ParseError::TooDeep { .. })));
    }

    #[test]
    fn test_errors() {
        let err = parse("2++2").unwrap_err();
        assert!(err.to_string().contains("unexpected"));

        assert!(matches!(parse("(1 + 2"), Err(ParseError::UnexpectedEnd { .. })));
        assert!(matches!(parse("1 +"), Err(ParseError::UnexpectedEnd { .. })));
        assert!(matches!(parse("a ? b"), Err(ParseError::UnexpectedEnd { .. })));
        assert!(matches!(parse("a b"), Err(ParseError::UnexpectedToken { .. })));
    }
}
