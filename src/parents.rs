//! Logical parent links between contexts.
//!
//! A [`ParentMap`] lets `../` climb out of the context an expression is
//! evaluated against, without the context data carrying any back-reference.
//! Links are keyed by the *identity* of an array or object value (see
//! [`Value::identity`]), so the map must be queried with a clone of the very
//! value that was registered, not an equal copy.

use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tracing::trace;

use crate::{evaluator::EvalError, value::Value};

/// Errors raised while registering a parent link.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    /// Only arrays and objects have an identity to key on
    #[error("only arrays and objects can be linked to a parent, got {0}")]
    NotAContainer(&'static str),

    /// The new link would make the chain loop back on itself
    #[error("linking this context would create a cycle in the parent chain")]
    Cycle,
}

#[derive(Debug, Clone)]
struct Link {
    // Held so the child's allocation, and therefore its key, stays alive.
    #[allow(dead_code)]
    child: Value,
    parent: Value,
}

/// Identity-keyed table from a context to its logical parent.
///
/// Each context has at most one parent and the chain formed by repeated
/// lookups is acyclic.
///
/// # Examples
///
/// ```
/// use sift_lang::{ParentMap, Value};
///
/// let child = Value::object([("name", Value::from("leaf"))]);
/// let parent = Value::object([("child", child.clone())]);
///
/// let mut parents = ParentMap::new();
/// parents.insert(&child, parent.clone()).unwrap();
///
/// assert_eq!(parents.parent_of(&child), Some(&parent));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParentMap {
    links: HashMap<usize, Link>,
    base: Option<Arc<ParentMap>>,
}

impl ParentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map that starts with every link of `base` and can add its own.
    pub(crate) fn layered(base: Arc<ParentMap>) -> Self {
        ParentMap {
            links: HashMap::new(),
            base: Some(base),
        }
    }

    /// Register `parent` as the parent of `child`, replacing any previous
    /// link for `child`.
    pub fn insert(&mut self, child: &Value, parent: Value) -> Result<(), LinkError> {
        let key = child
            .identity()
            .ok_or(LinkError::NotAContainer(child.type_name()))?;

        let mut cursor = Some(&parent);
        while let Some(ancestor) = cursor {
            if ancestor.identity() == Some(key) {
                return Err(LinkError::Cycle);
            }
            cursor = self.parent_of(ancestor);
        }

        self.links.insert(
            key,
            Link {
                child: child.clone(),
                parent,
            },
        );
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, child: &Value, parent: Value) -> Result<Self, LinkError> {
        self.insert(child, parent)?;
        Ok(self)
    }

    pub fn parent_of(&self, child: &Value) -> Option<&Value> {
        let key = child.identity()?;
        match self.links.get(&key) {
            Some(link) => Some(&link.parent),
            None => self.base.as_ref().and_then(|base| base.parent_of(child)),
        }
    }

    /// Walk `levels` parent hops up from `start`.
    pub fn ancestor(&self, start: &Value, levels: usize) -> Result<Value, EvalError> {
        let mut current = start;
        for found in 0..levels {
            current = self.parent_of(current).ok_or(EvalError::ParentNotFound {
                requested: levels,
                found,
            })?;
            trace!(hop = found + 1, "resolved parent context");
        }
        Ok(current.clone())
    }

    /// Number of links registered directly on this map.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.base.as_ref().is_none_or(|base| base.is_empty())
    }
}
