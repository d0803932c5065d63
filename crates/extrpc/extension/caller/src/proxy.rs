use std::rc::Rc;

use extrpc_core::{
    HostChannel, Proxy, ProxyGroup, ProxyNode, RemoteFunction, Result,
    primitives::{from_js, to_js},
};
use js_sys::{Array, Function, Object, Promise, Reflect};
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

// Closures cannot take a variable number of arguments, so leaves are
// wrapped in a rest-parameter function that passes them on as one array.
#[wasm_bindgen(inline_js = "export function variadic(f) { return (...args) => f(args); }")]
extern "C" {
    fn variadic(f: &Function) -> Function;
}

/// Builds the JS object handed to calling code.
///
/// Groups become plain objects and functions become promise-returning
/// functions. The root also gets `send(message)`, which replaces a remote
/// function registered under the same name.
pub(crate) fn proxy_object<C: HostChannel + 'static>(proxy: Rc<Proxy<C>>) -> Result<Object, JsValue> {
    let root = group_object(proxy.root())?;

    let send_key = JsValue::from_str("send");
    if Reflect::has(&root, &send_key)? {
        warn!("Remote function `send` is shadowed by the root `send` method");
    }

    let send = Closure::wrap(Box::new(move |message: JsValue| -> Promise {
        let proxy = proxy.clone();
        future_to_promise(async move {
            let message = from_js(&message)?;
            let response = proxy.send(message).await?;
            Ok(to_js(&response)?)
        })
    }) as Box<dyn FnMut(JsValue) -> Promise>);
    Reflect::set(&root, &send_key, &send.into_js_value())?;

    Ok(root)
}

fn group_object<C: HostChannel + 'static>(group: &ProxyGroup<C>) -> Result<Object, JsValue> {
    let object = Object::new();
    for (name, node) in group.iter() {
        let value: JsValue = match node {
            ProxyNode::Function(function) => leaf(function.clone()).into(),
            ProxyNode::Group(group) => group_object(group)?.into(),
        };
        Reflect::set(&object, &JsValue::from_str(name), &value)?;
    }
    Ok(object)
}

fn leaf<C: HostChannel + 'static>(function: RemoteFunction<C>) -> Function {
    let call = Closure::wrap(Box::new(move |args: Array| -> Promise {
        let function = function.clone();
        future_to_promise(async move {
            let params = args
                .iter()
                .map(|arg| from_js(&arg))
                .collect::<Result<Vec<_>>>()?;
            let result = function.call(params).await?;
            Ok(to_js(&result)?)
        })
    }) as Box<dyn FnMut(Array) -> Promise>);

    variadic(call.into_js_value().unchecked_ref())
}
