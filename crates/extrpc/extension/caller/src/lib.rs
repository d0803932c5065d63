#![cfg(target_arch = "wasm32")]
//! Calling side of extrpc, for content scripts and extension pages.
//!
//! `init(runtime)` asks the background script which functions it serves and
//! resolves to an object of the same shape whose functions return promises.

use std::rc::Rc;

use extrpc_chrome_sys::Runtime;
use extrpc_core::Proxy;
use js_sys::Promise;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

mod channel;
mod proxy;

use channel::RuntimeChannel;
use proxy::proxy_object;

// Initialize logging once per module instance
#[wasm_bindgen(start)]
pub fn run() {
    // readable panic messages in the console
    console_error_panic_hook::set_once();

    wasm_tracing::set_as_global_default();
}

/// Resolves to the proxy of the functions registered in the background.
///
/// `runtime` is `chrome.runtime` or any object with a compatible
/// `sendMessage(message, callback)`; the global `chrome.runtime` is used when
/// it is omitted. The promise rejects when the background cannot be reached
/// or does not answer with a function list.
#[wasm_bindgen]
pub fn init(runtime: JsValue) -> Promise {
    future_to_promise(async move {
        let runtime = if runtime.is_undefined() || runtime.is_null() {
            Runtime::global()?
        } else {
            Runtime::from_js(runtime)
        };

        let proxy = Proxy::connect(RuntimeChannel::new(runtime)).await?;
        debug!(functions = proxy.paths().len(), "Proxy ready");

        Ok(proxy_object(Rc::new(proxy))?.into())
    })
}
