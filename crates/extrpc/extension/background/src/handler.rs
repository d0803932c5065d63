use extrpc_chrome_sys::error_message;
use extrpc_core::{
    CallContext, Continuation, Handler, HandlerError, HandlerResult,
    primitives::{Result, from_js, to_js},
};
use js_sys::{Array, Function, Promise, Reflect};
use serde_json::Value;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

/// A function taken from the registered JS object tree.
///
/// Called with its enclosing object as `this`, the way `tree.group.fn()`
/// would be.
#[derive(Debug)]
pub(crate) struct JsHandler {
    function: Function,
    this: JsValue,
}

impl JsHandler {
    pub(crate) fn new(function: Function, this: JsValue) -> Self {
        Self { function, this }
    }
}

impl Handler for JsHandler {
    fn call(&self, params: Vec<Value>, context: CallContext) -> Continuation {
        let args = match arguments(&params, &context) {
            Ok(args) => args,
            Err(e) => return Continuation::error(e.to_string()),
        };

        match self.function.apply(&self.this, &args) {
            Err(thrown) => Continuation::error(error_message(&thrown)),
            Ok(returned) if is_thenable(&returned) => {
                let settled = JsFuture::from(Promise::resolve(&returned));
                Continuation::pending(async move {
                    match settled.await {
                        Ok(value) => settle(&value),
                        Err(rejected) => Err(HandlerError::new(error_message(&rejected))),
                    }
                })
            }
            Ok(returned) => Continuation::Ready(settle(&returned)),
        }
    }
}

// the caller's arguments followed by `{ request, sender }`
fn arguments(params: &[Value], context: &CallContext) -> Result<Array> {
    let args = Array::new();
    for param in params {
        args.push(&to_js(param)?);
    }
    args.push(&to_js(&context.to_value())?);
    Ok(args)
}

fn settle(value: &JsValue) -> HandlerResult {
    from_js(value).map_err(|e| HandlerError::new(e.to_string()))
}

fn is_thenable(value: &JsValue) -> bool {
    value.is_object()
        && Reflect::get(value, &JsValue::from_str("then"))
            .map(|then| then.is_function())
            .unwrap_or(false)
}
