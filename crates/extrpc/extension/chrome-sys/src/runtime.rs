use futures::channel::oneshot;
use js_sys::{Function, Reflect};
use tracing::trace;
use wasm_bindgen::prelude::*;

/// A `chrome.runtime` object, or anything exposing the same messaging methods
#[derive(Debug, Clone)]
pub struct Runtime(JsValue);

/// A `chrome.events.Event`, such as `runtime.onMessage`
#[derive(Debug, Clone)]
pub struct Event(JsValue);

// Looks up `object[name]` and checks that it is callable
fn method(object: &JsValue, name: &str) -> Result<Function, JsValue> {
    Reflect::get(object, &JsValue::from_str(name))?
        .dyn_into::<Function>()
        .map_err(|_| JsValue::from_str(&format!("`{name}` is not a function")))
}

fn is_missing(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

impl Runtime {
    /// The global `chrome.runtime`
    pub fn global() -> Result<Self, JsValue> {
        let chrome = Reflect::get(&js_sys::global(), &JsValue::from_str("chrome"))?;
        if is_missing(&chrome) {
            return Err(JsValue::from_str("`chrome` is not available in this context"));
        }

        let runtime = Reflect::get(&chrome, &JsValue::from_str("runtime"))?;
        if is_missing(&runtime) {
            return Err(JsValue::from_str(
                "`chrome.runtime` is not available in this context",
            ));
        }

        Ok(Self(runtime))
    }

    /// Wraps a caller-provided runtime object
    pub fn from_js(runtime: JsValue) -> Self {
        Self(runtime)
    }

    /// `runtime.lastError.message`, if an error is pending
    pub fn last_error(&self) -> Option<String> {
        let last_error = Reflect::get(&self.0, &JsValue::from_str("lastError")).ok()?;
        if is_missing(&last_error) {
            return None;
        }

        let message = Reflect::get(&last_error, &JsValue::from_str("message"))
            .ok()
            .and_then(|message| message.as_string());
        Some(message.unwrap_or_else(|| "Unknown runtime error".to_string()))
    }

    /// `runtime.sendMessage(message, callback)`
    pub fn send_message_with_callback(
        &self,
        message: &JsValue,
        callback: &Function,
    ) -> Result<(), JsValue> {
        method(&self.0, "sendMessage")?.call2(&self.0, message, callback)?;
        Ok(())
    }

    /// Sends `message` and waits for the response.
    ///
    /// `lastError` is read inside the response callback, which is the only
    /// place the host sets it; a pending error fails the send with its
    /// message.
    pub async fn send_message(&self, message: &JsValue) -> Result<JsValue, JsValue> {
        let (sender, receiver) = oneshot::channel();
        let runtime = self.clone();
        let callback = Closure::once_into_js(move |response: JsValue| {
            let outcome = match runtime.last_error() {
                Some(error) => Err(JsValue::from_str(&error)),
                None => Ok(response),
            };
            let _ = sender.send(outcome);
        });

        trace!("runtime.sendMessage");
        self.send_message_with_callback(message, callback.unchecked_ref())?;

        receiver
            .await
            .map_err(|_| JsValue::from_str("Failed to receive response"))?
    }

    /// `runtime.onMessage`
    pub fn on_message(&self) -> Result<Event, JsValue> {
        let event = Reflect::get(&self.0, &JsValue::from_str("onMessage"))?;
        if is_missing(&event) {
            return Err(JsValue::from_str("`runtime.onMessage` is not available"));
        }
        Ok(Event(event))
    }
}

impl Event {
    /// `event.addListener(callback)`
    pub fn add_listener(&self, callback: &Function) -> Result<(), JsValue> {
        method(&self.0, "addListener")?.call1(&self.0, callback)?;
        Ok(())
    }

    /// `event.removeListener(callback)`
    pub fn remove_listener(&self, callback: &Function) -> Result<(), JsValue> {
        method(&self.0, "removeListener")?.call1(&self.0, callback)?;
        Ok(())
    }

    /// `event.hasListener(callback)`
    pub fn has_listener(&self, callback: &Function) -> Result<bool, JsValue> {
        let registered = method(&self.0, "hasListener")?.call1(&self.0, callback)?;
        Ok(registered.is_truthy())
    }
}
