use std::{future::Future, rc::Rc};

use extrpc_primitives::CallContext;
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;

/// Failure raised by a registered function (a throw or a rejection)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates an error with the given description
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The description delivered to the caller
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Outcome of running a registered function to completion
pub type HandlerResult = Result<Value, HandlerError>;

/// How a function delivered its result.
///
/// `Ready` covers both a plain return and a synchronous throw; `Pending`
/// covers a returned promise.
pub enum Continuation {
    /// Settled during the call
    Ready(HandlerResult),
    /// Settles later
    Pending(LocalBoxFuture<'static, HandlerResult>),
}

impl Continuation {
    /// A plain returned value
    pub fn value(value: Value) -> Self {
        Self::Ready(Ok(value))
    }

    /// A synchronous failure
    pub fn error(error: impl Into<HandlerError>) -> Self {
        Self::Ready(Err(error.into()))
    }

    /// A result that settles once `future` completes
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = HandlerResult> + 'static,
    {
        Self::Pending(future.boxed_local())
    }
}

impl From<HandlerResult> for Continuation {
    fn from(result: HandlerResult) -> Self {
        Self::Ready(result)
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A function stored in a [`Registry`](crate::Registry).
///
/// `params` are the caller's arguments in order; `context` is the implicit
/// trailing `{ request, sender }` argument.
pub trait Handler {
    /// Invokes the function
    fn call(&self, params: Vec<Value>, context: CallContext) -> Continuation;
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn call(&self, params: Vec<Value>, context: CallContext) -> Continuation {
        (**self).call(params, context)
    }
}

impl<H: Handler + ?Sized> Handler for Rc<H> {
    fn call(&self, params: Vec<Value>, context: CallContext) -> Continuation {
        (**self).call(params, context)
    }
}

/// A [`Handler`] backed by a closure
pub struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(Vec<Value>, CallContext) -> Continuation,
{
    fn call(&self, params: Vec<Value>, context: CallContext) -> Continuation {
        (self.0)(params, context)
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnHandler")
    }
}

/// Wraps a closure that picks its own [`Continuation`]
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(Vec<Value>, CallContext) -> Continuation,
{
    FnHandler(f)
}

/// Wraps a synchronous closure; `Err` plays the part of a throw
pub fn from_fn<F>(f: F) -> FnHandler<impl Fn(Vec<Value>, CallContext) -> Continuation>
where
    F: Fn(Vec<Value>, CallContext) -> HandlerResult,
{
    FnHandler(move |params: Vec<Value>, context: CallContext| {
        Continuation::Ready(f(params, context))
    })
}

/// Wraps a closure returning a future, the equivalent of returning a promise
pub fn from_async_fn<F, Fut>(f: F) -> FnHandler<impl Fn(Vec<Value>, CallContext) -> Continuation>
where
    F: Fn(Vec<Value>, CallContext) -> Fut,
    Fut: Future<Output = HandlerResult> + 'static,
{
    FnHandler(move |params: Vec<Value>, context: CallContext| {
        Continuation::pending(f(params, context))
    })
}
