use std::rc::Rc;

use async_trait::async_trait;
use extrpc_primitives::Result;
use serde_json::Value;

/// The host's request/response messaging primitive, seen from the caller.
///
/// Each `send_message` resolves with the single response to that message,
/// so no request ids are needed to pair replies with calls. Failures of the
/// channel itself (no listener, closed port) are [`Error::Transport`].
///
/// [`Error::Transport`]: extrpc_primitives::Error::Transport
#[async_trait(?Send)]
pub trait HostChannel {
    /// Sends `message` and waits for its response
    async fn send_message(&self, message: Value) -> Result<Value>;
}

#[async_trait(?Send)]
impl<C: HostChannel + ?Sized> HostChannel for Rc<C> {
    async fn send_message(&self, message: Value) -> Result<Value> {
        (**self).send_message(message).await
    }
}
