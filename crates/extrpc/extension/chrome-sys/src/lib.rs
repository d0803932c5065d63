//! Bindings for the parts of `chrome.runtime` that extrpc talks through.
//!
//! Everything goes through `js_sys::Reflect` on a runtime object rather than
//! fixed `js_namespace` imports, so a caller can hand in any object with the
//! same messaging surface in place of the global `chrome.runtime`.

pub mod runtime;

pub use runtime::{Event, Runtime};

use js_sys::Reflect;
use wasm_bindgen::{JsCast, JsValue};

/// Best-effort text of a thrown or rejected JS value.
///
/// `Error` objects (and anything else with a string `message`) yield their
/// message, strings are used as is, other values are JSON-encoded.
pub fn error_message(error: &JsValue) -> String {
    if let Some(error) = error.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    if let Some(text) = error.as_string() {
        return text;
    }
    if error.is_object()
        && let Some(message) = Reflect::get(error, &JsValue::from_str("message"))
            .ok()
            .and_then(|message| message.as_string())
    {
        return message;
    }

    js_sys::JSON::stringify(error)
        .ok()
        .and_then(|text| text.as_string())
        .unwrap_or_else(|| format!("{error:?}"))
}
