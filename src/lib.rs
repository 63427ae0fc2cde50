//! An embeddable expression language for evaluating conditions, paths,
//! filters and transforms against nested data.
//!
//! ```
//! use serde_json::json;
//! use sift_lang::{Sift, Value};
//!
//! let sift = Sift::with_stdlib();
//! let context = json!({
//!     "users": [
//!         {"name": "ada", "age": 36},
//!         {"name": "alan", "age": 41}
//!     ]
//! });
//!
//! let names = sift.eval_sync("users[.age > 40]|map(fn(u) => u.name|upper)", context).unwrap();
//! assert_eq!(names, Value::array([Value::from("ALAN")]));
//! ```
//!
//! Expressions are lexed and parsed against a [`Grammar`] that the host can
//! extend with operators and transforms, then evaluated by an async tree
//! walker. [`Sift::eval_sync`] drives the same walker without an executor.

pub mod ast;
pub mod convert;
pub mod deferred;
pub mod engine;
pub mod evaluator;
pub mod grammar;
pub mod lexer;
pub mod parents;
pub mod parser;
pub mod transform;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Expr, Segment, Token, TokenKind};
pub use deferred::{Deferred, resolve_now};
pub use engine::{Error, Expression, Sift};
pub use evaluator::{EvalError, Evaluator};
pub use grammar::Grammar;
pub use lexer::{LexError, Lexer};
pub use parents::{LinkError, ParentMap};
pub use parser::{ParseError, Parser};
pub use transform::{Callable, Transform};
pub use value::{Map, Value};
