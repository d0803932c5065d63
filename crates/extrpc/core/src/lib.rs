//! Promise-style RPC over a request/response messaging channel.
//!
//! The background side owns a [`Registry`] of named, possibly nested
//! functions and answers messages through a [`Dispatcher`]. The caller side
//! discovers the registry's [`Shape`](extrpc_primitives::Shape) over a
//! [`HostChannel`] and exposes it as a [`Proxy`] tree whose leaves are
//! [`RemoteFunction`]s.
//!
//! Nothing here depends on a browser; the extension crates bind these types
//! to `chrome.runtime`, and [`loopback::Loopback`] connects both halves in
//! process.

mod channel;
mod dispatcher;
mod handler;
pub mod loopback;
mod options;
mod proxy;
mod registry;

pub use channel::HostChannel;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use extrpc_primitives as primitives;
pub use extrpc_primitives::{CallContext, CallPath, Error, Reply, Request, Result, Shape};
pub use handler::{
    Continuation, FnHandler, Handler, HandlerError, HandlerResult, from_async_fn, from_fn, handler_fn,
};
pub use options::{CustomHandler, Options, RequestFormatter, Responder};
pub use proxy::{Proxy, ProxyGroup, ProxyNode, RemoteFunction};
pub use registry::{Node, Registry};
