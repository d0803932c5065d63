#![cfg(target_arch = "wasm32")]
//! Background-script side of extrpc.
//!
//! `register(functions, options)` turns a (possibly nested) object of
//! functions into a `chrome.runtime.onMessage` listener; `listen` also
//! attaches it.

use std::rc::Rc;

use extrpc_chrome_sys::{Event, Runtime, error_message};
use extrpc_core::{
    Dispatcher, Handler, Responder,
    primitives::{from_js, to_js},
};
use js_sys::Function;
use serde_json::Value;
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;

mod handler;
mod options;
mod registry;
mod spawn;

use options::options_from_js;
use registry::registry_from_js;
use spawn::SpawnLocal;

// Initialize logging once per module instance
#[wasm_bindgen(start)]
pub fn run() {
    // readable panic messages in the console
    console_error_panic_hook::set_once();

    wasm_tracing::set_as_global_default();
}

/// Builds an `onMessage` listener answering calls to `functions`.
///
/// `options` may carry `verbose`, `logRequest` and `customHandler`.
#[wasm_bindgen]
pub fn register(functions: JsValue, options: JsValue) -> Result<Function, JsValue> {
    let registry = registry_from_js(&functions)?;
    let options = options_from_js(&options)?;
    let dispatcher = Dispatcher::builder(registry, SpawnLocal)
        .options(options)
        .build();
    info!(
        functions = dispatcher.registry().leaf_paths().len(),
        "Registered background functions"
    );

    Ok(listener(Rc::new(dispatcher)))
}

/// A listener attached to `chrome.runtime.onMessage` by [`listen`]
#[wasm_bindgen]
#[derive(Debug)]
pub struct Listener {
    event: Event,
    callback: Function,
}

#[wasm_bindgen]
impl Listener {
    /// Detaches the listener; calls stop being answered
    pub fn unlisten(&self) -> Result<(), JsValue> {
        debug!("Removing onMessage listener");
        self.event.remove_listener(&self.callback)
    }

    /// Whether the listener is still attached
    #[wasm_bindgen(js_name = isListening)]
    pub fn is_listening(&self) -> Result<bool, JsValue> {
        self.event.has_listener(&self.callback)
    }

    /// The listener function itself
    #[wasm_bindgen(getter)]
    pub fn callback(&self) -> Function {
        self.callback.clone()
    }
}

/// Registers `functions` and attaches the listener to the global
/// `chrome.runtime.onMessage`
#[wasm_bindgen]
pub fn listen(functions: JsValue, options: JsValue) -> Result<Listener, JsValue> {
    let callback = register(functions, options)?;
    let event = Runtime::global()?.on_message()?;
    event.add_listener(&callback)?;
    debug!("Attached onMessage listener");

    Ok(Listener { event, callback })
}

fn listener(dispatcher: Rc<Dispatcher<Box<dyn Handler>>>) -> Function {
    let closure = Closure::wrap(Box::new(
        move |request: JsValue, sender: JsValue, send_response: JsValue| -> JsValue {
            let request = match from_js(&request) {
                Ok(request) => request,
                Err(e) => {
                    debug!(error = %e, "Ignoring message that is not JSON");
                    return JsValue::FALSE;
                }
            };
            let sender = from_js(&sender).unwrap_or_else(|e| {
                debug!(error = %e, "Sender could not be read");
                Value::Null
            });

            let keep_open = dispatcher.handle_message(request, sender, responder(send_response));
            JsValue::from_bool(keep_open)
        },
    ) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>);

    closure.into_js_value().unchecked_into()
}

// Wraps the host's `sendResponse`
fn responder(send_response: JsValue) -> Responder {
    Box::new(move |response: Value| {
        let Some(send_response) = send_response.dyn_ref::<Function>() else {
            warn!("Listener was called without a sendResponse function");
            return;
        };
        let delivered = to_js(&response)
            .map_err(JsValue::from)
            .and_then(|response| send_response.call1(&JsValue::NULL, &response));
        if let Err(e) = delivered {
            warn!(error = %error_message(&e), "Failed to send response");
        }
    })
}
