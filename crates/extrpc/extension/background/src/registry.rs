use extrpc_core::{CallPath, Handler, Node, Registry};
use js_sys::{Array, Function, Object, Reflect};
use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::handler::JsHandler;

/// Functions registered from JS
pub(crate) type JsRegistry = Registry<Box<dyn Handler>>;

/// Mirrors a JS object tree into a [`Registry`].
///
/// Functions become leaves and plain objects become groups. Any other value
/// is not callable and is left out of the registry. An object that contains
/// itself is rejected.
pub(crate) fn registry_from_js(tree: &JsValue) -> Result<JsRegistry, JsValue> {
    if !tree.is_object() {
        return Err(JsValue::from_str("Registered functions must be an object"));
    }
    group(tree.unchecked_ref(), None, &mut Vec::new())
}

// `ancestors` holds the objects on the path from the root to `object`
fn group(
    object: &Object,
    prefix: Option<&CallPath>,
    ancestors: &mut Vec<Object>,
) -> Result<JsRegistry, JsValue> {
    let mut registry = JsRegistry::new();
    ancestors.push(object.clone());

    for key in Object::keys(object).iter() {
        let Some(name) = key.as_string() else {
            continue;
        };
        let path = match prefix {
            Some(prefix) => prefix.child(name.as_str()),
            None => CallPath::root(name.as_str()),
        };
        let value = Reflect::get(object, &key)?;

        if let Some(function) = value.dyn_ref::<Function>() {
            let handler: Box<dyn Handler> =
                Box::new(JsHandler::new(function.clone(), JsValue::from(object.clone())));
            registry.insert(name, Node::Function(handler));
        } else if value.is_object() && !Array::is_array(&value) {
            let inner: &Object = value.unchecked_ref();
            if ancestors.iter().any(|ancestor| Object::is(ancestor, inner)) {
                return Err(JsValue::from_str(&format!(
                    "Registered functions contain a cycle at `{path}`"
                )));
            }
            let inner = group(inner, Some(&path), ancestors)?;
            registry.insert(name, Node::Group(inner));
        } else {
            debug!(%path, "Skipping entry that is neither a function nor an object");
        }
    }

    ancestors.pop();
    Ok(registry)
}
