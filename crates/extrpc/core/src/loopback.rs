//! In-process [`HostChannel`] that hands messages straight to a
//! [`Dispatcher`].
//!
//! Messages and responses are passed through JSON text on the way, the way
//! the host channel serializes them, so anything that would not survive the
//! real boundary fails here too.

use std::rc::Rc;

use async_trait::async_trait;
use extrpc_primitives::{Error, Result};
use futures::channel::oneshot;
use serde_json::Value;
use tracing::trace;

use crate::{Dispatcher, Handler, HostChannel};

/// Connects a caller directly to a dispatcher
#[derive(Debug)]
pub struct Loopback<H> {
    dispatcher: Rc<Dispatcher<H>>,
    sender: Value,
}

impl<H> Clone for Loopback<H> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<H: Handler> Loopback<H> {
    /// A channel whose messages carry an empty sender
    pub fn new(dispatcher: Rc<Dispatcher<H>>) -> Self {
        Self {
            dispatcher,
            sender: Value::Object(Default::default()),
        }
    }

    /// Attaches `sender` as the transport metadata of every message
    pub fn with_sender(mut self, sender: Value) -> Self {
        self.sender = sender;
        self
    }
}

fn through_wire(value: &Value) -> Result<Value> {
    let text = serde_json::to_string(value)?;
    Ok(serde_json::from_str(&text)?)
}

#[async_trait(?Send)]
impl<H: Handler> HostChannel for Loopback<H> {
    async fn send_message(&self, message: Value) -> Result<Value> {
        let message = through_wire(&message)?;
        trace!(%message, "Loopback message");

        let (tx, rx) = oneshot::channel();
        let responded = self.dispatcher.handle_message(
            message,
            self.sender.clone(),
            Box::new(move |response| {
                let _ = tx.send(response);
            }),
        );

        if !responded {
            trace!("Listener did not keep the channel open");
        }

        match rx.await {
            Ok(response) => through_wire(&response),
            Err(_) => Err(Error::Transport(
                "The message port closed before a response was received.".to_string(),
            )),
        }
    }
}
