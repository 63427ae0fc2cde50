//! # Sift Expression Language - Abstract Syntax Tree
//!
//! This module defines the tokens and tree nodes of the Sift expression
//! language, a small embeddable language for arithmetic, logic, object paths,
//! filters and transforms evaluated against host-supplied data.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes and access-chain segments
//!
//! ## Quick Start
//!
//! ```text
//! orders[.total > 100 && .status == "open"].customer.name|upper
//! ```
//!
//! This expression keeps the open orders above 100, follows the first match
//! to its customer and upper-cases the name.
//!
//! ## Core Concepts
//!
//! ### Paths
//!
//! Identifiers resolve against the context. A dot walks into an object; when
//! the subject is an array, the walk continues from its first element.
//!
//! ### Filters
//!
//! - `items[.qty > 2]` - relative filter, keeps matching elements
//! - `items[1]` - index access
//! - `config["ba" + "z"]` - computed key
//!
//! ### Parent references
//!
//! `../` climbs to the logical parent of the evaluation context, as
//! registered in a [`ParentMap`](crate::ParentMap).
//!
//! ### Transforms
//!
//! ```text
//! name|lower
//! list|map(fn(item, i) => item.id + i)
//! ```
pub mod expressions;
pub mod tokens;

pub use expressions::{Expr, Segment};
pub use tokens::{Token, TokenKind};
