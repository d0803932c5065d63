use extrpc_chrome_sys::error_message;
use extrpc_core::{
    CustomHandler, Options, RequestFormatter, Responder,
    primitives::{from_js, to_js},
};
use js_sys::{Function, Reflect};
use serde_json::Value;
use tracing::warn;
use wasm_bindgen::prelude::*;

/// Reads `{ verbose, logRequest, customHandler }` from a JS options object.
///
/// `undefined` and `null` give the defaults. A key holding something other
/// than a function where one is expected is an error.
pub(crate) fn options_from_js(options: &JsValue) -> Result<Options, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(Options::default());
    }

    let verbose = Reflect::get(options, &JsValue::from_str("verbose"))?.is_truthy();
    let log_request = optional_function(options, "logRequest")?
        .map(|format| Box::new(move |request: &Value| format_with(&format, request)) as RequestFormatter);
    let custom_handler = optional_function(options, "customHandler")?
        .map(|handler| Box::new(JsCustomHandler(handler)) as Box<dyn CustomHandler>);

    Ok(Options {
        verbose,
        log_request,
        custom_handler,
    })
}

fn optional_function(options: &JsValue, key: &str) -> Result<Option<Function>, JsValue> {
    let value = Reflect::get(options, &JsValue::from_str(key))?;
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    value
        .dyn_into::<Function>()
        .map(Some)
        .map_err(|_| JsValue::from_str(&format!("Option `{key}` must be a function")))
}

fn format_with(format: &Function, request: &Value) -> String {
    let line = to_js(request)
        .map_err(JsValue::from)
        .and_then(|request| format.call1(&JsValue::NULL, &request));

    match line {
        Ok(line) => line
            .as_string()
            .unwrap_or_else(|| error_message(&line)),
        Err(e) => {
            warn!(error = %error_message(&e), "logRequest failed");
            format!("Received request: {request}")
        }
    }
}

/// `customHandler(request, sender, sendResponse)` supplied from JS
#[derive(Debug)]
struct JsCustomHandler(Function);

impl CustomHandler for JsCustomHandler {
    fn handle(&self, request: Value, sender: Value, send_response: Responder) -> bool {
        let (request, sender) = match (to_js(&request), to_js(&sender)) {
            (Ok(request), Ok(sender)) => (request, sender),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Message could not be passed to customHandler");
                return false;
            }
        };

        let respond = Closure::once_into_js(move |response: JsValue| match from_js(&response) {
            Ok(response) => send_response(response),
            Err(e) => warn!(error = %e, "customHandler responded with a value that cannot be sent"),
        });

        match self.0.call3(&JsValue::NULL, &request, &sender, &respond) {
            Ok(keep_open) => keep_open.is_truthy(),
            Err(thrown) => {
                warn!(error = %error_message(&thrown), "customHandler threw");
                false
            }
        }
    }
}
