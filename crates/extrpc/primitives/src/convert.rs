use serde::Serialize;
use serde_json::Value;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::JsValue;

use crate::{Error, Result};

/// Converts a JSON value into a plain JS value.
///
/// Objects become plain JS objects rather than `Map`s, so the result can be
/// handed straight to page code or `sendMessage`.
pub fn to_js(value: &Value) -> Result<JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Converts a JS value into JSON; `undefined` becomes `null`.
pub fn from_js(value: &JsValue) -> Result<Value> {
    serde_wasm_bindgen::from_value(value.clone()).map_err(|e| Error::Serialization(e.to_string()))
}
