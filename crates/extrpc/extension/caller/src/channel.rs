use async_trait::async_trait;
use extrpc_chrome_sys::{Runtime, error_message};
use extrpc_core::{
    Error, HostChannel, Result,
    primitives::{from_js, to_js},
};
use serde_json::Value;
use tracing::trace;

/// [`HostChannel`] over `runtime.sendMessage`
#[derive(Debug, Clone)]
pub(crate) struct RuntimeChannel {
    runtime: Runtime,
}

impl RuntimeChannel {
    pub(crate) fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }
}

#[async_trait(?Send)]
impl HostChannel for RuntimeChannel {
    async fn send_message(&self, message: Value) -> Result<Value> {
        trace!(%message, "Sending message");
        let message = to_js(&message)?;

        let response = self
            .runtime
            .send_message(&message)
            .await
            .map_err(|e| Error::Transport(error_message(&e)))?;

        from_js(&response)
    }
}

#[cfg(test)]
mod tests {
    use js_sys::{Function, Object, Reflect};
    use serde_json::json;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    use super::*;

    // A stand-in runtime whose `sendMessage` is `body`
    fn runtime(body: &str) -> Runtime {
        let runtime = Object::new();
        Reflect::set(
            &runtime,
            &"sendMessage".into(),
            &Function::new_with_args("message, callback", body),
        )
        .unwrap();
        Runtime::from_js(runtime.into())
    }

    #[wasm_bindgen_test]
    async fn test_response_is_delivered() {
        let channel = RuntimeChannel::new(runtime(
            "setTimeout(() => callback({ type: 'function-result', result: message.func }), 0);",
        ));

        let response = channel
            .send_message(json!({ "type": "function-call", "func": "syncCall", "params": [] }))
            .await;

        assert_eq!(response, Ok(json!({ "type": "function-result", "result": "syncCall" })));
    }

    #[wasm_bindgen_test]
    async fn test_last_error_is_a_transport_error() {
        let channel = RuntimeChannel::new(runtime(
            "this.lastError = { message: 'Could not establish connection. Receiving end does not exist.' }; \
             callback(undefined); \
             delete this.lastError;",
        ));

        let response = channel.send_message(json!({ "type": "function-list" })).await;

        assert_eq!(
            response,
            Err(Error::Transport(
                "Could not establish connection. Receiving end does not exist.".to_string()
            ))
        );
    }

    #[wasm_bindgen_test]
    async fn test_synchronous_throw_is_a_transport_error() {
        let channel = RuntimeChannel::new(runtime("throw new Error('Extension context invalidated.');"));

        let response = channel.send_message(json!({ "type": "function-list" })).await;

        assert_eq!(
            response,
            Err(Error::Transport("Extension context invalidated.".to_string()))
        );
    }

    #[wasm_bindgen_test]
    async fn test_runtime_without_send_message_fails() {
        let channel = RuntimeChannel::new(Runtime::from_js(JsValue::from(Object::new())));

        assert!(matches!(
            channel.send_message(json!({})).await,
            Err(Error::Transport(_))
        ));
    }
}
