//! Deferred values.
//!
//! Every node of an expression evaluates to a [`Deferred`]: a boxed future
//! that settles to a value or an [`EvalError`]. Transforms and operators
//! supplied by the host may return genuinely pending futures; the evaluator
//! only ever chains (`.await`) and combines them, so the same traversal serves
//! both an async executor and the immediate driver used by
//! [`resolve_now`].

use std::{
    future::{Future, poll_fn},
    pin::Pin,
    task::{Context, Poll, Waker},
};

use crate::{evaluator::EvalError, value::Value};

/// A value that may not be available yet.
pub type Deferred<'a, T = Value> = Pin<Box<dyn Future<Output = Result<T, EvalError>> + Send + 'a>>;

/// A deferred value that is already available.
pub fn resolved<'a>(value: Value) -> Deferred<'a> {
    Box::pin(std::future::ready(Ok(value)))
}

/// A deferred value that has already failed.
pub fn rejected<'a>(error: EvalError) -> Deferred<'a> {
    Box::pin(std::future::ready(Err(error)))
}

/// Wrap a synchronous result.
pub fn settled<'a>(result: Result<Value, EvalError>) -> Deferred<'a> {
    Box::pin(std::future::ready(result))
}

enum Slot<'a> {
    Pending(Deferred<'a>),
    Done(Value),
}

/// Wait for every deferred value, keeping input order.
///
/// All values are polled together, so independent pending values make
/// progress at the same time. The first failure aborts the combination.
pub async fn all<'a, I>(items: I) -> Result<Vec<Value>, EvalError>
where
    I: IntoIterator<Item = Deferred<'a>>,
{
    let mut slots: Vec<Slot<'a>> = items.into_iter().map(Slot::Pending).collect();
    poll_fn(|cx| {
        let mut waiting = false;
        for slot in slots.iter_mut() {
            if let Slot::Pending(future) = slot {
                match future.as_mut().poll(cx) {
                    Poll::Ready(Ok(value)) => *slot = Slot::Done(value),
                    Poll::Ready(Err(error)) => return Poll::Ready(Err(error)),
                    Poll::Pending => waiting = true,
                }
            }
        }
        if waiting {
            return Poll::Pending;
        }
        let values = slots
            .drain(..)
            .filter_map(|slot| match slot {
                Slot::Done(value) => Some(value),
                Slot::Pending(_) => None,
            })
            .collect();
        Poll::Ready(Ok(values))
    })
    .await
}

/// Drive a future to completion without an executor.
///
/// The future is polled exactly once. Anything that suspends on a value that
/// is not ready yet fails with [`EvalError::Suspended`].
pub fn resolve_now<T, E>(future: impl Future<Output = Result<T, E>>) -> Result<T, E>
where
    E: From<EvalError>,
{
    let mut future = std::pin::pin!(future);
    let mut cx = Context::from_waker(Waker::noop());
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(result) => result,
        Poll::Pending => Err(EvalError::Suspended.into()),
    }
}
