use std::{cell::RefCell, fmt, rc::Rc};

use extrpc_primitives::{CallContext, CallPath, Incoming, Reply, Request, Result, Shape};
use futures::task::{LocalFutureObj, LocalSpawn};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::{
    Continuation, CustomHandler, Handler, HandlerResult, Options, Registry, RequestFormatter,
    Responder,
};

/// Answers incoming messages from a [`Registry`].
///
/// [`Dispatcher::handle_message`] has the shape of a host `onMessage`
/// listener. Functions that settle later are driven on the spawner supplied
/// at construction.
pub struct Dispatcher<H> {
    registry: Registry<H>,
    options: Options,
    spawner: Box<dyn LocalSpawn>,
}

impl<H: Handler> Dispatcher<H> {
    /// Starts configuring a dispatcher over `registry`
    pub fn builder(registry: Registry<H>, spawner: impl LocalSpawn + 'static) -> DispatcherBuilder<H> {
        DispatcherBuilder {
            registry,
            options: Options::default(),
            spawner: Box::new(spawner),
        }
    }

    /// The registered functions
    pub fn registry(&self) -> &Registry<H> {
        &self.registry
    }

    /// The configuration in use
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The skeleton answered to `function-list` requests
    pub fn shape(&self) -> Shape {
        self.registry.shape()
    }

    /// Handles one message from the host channel.
    ///
    /// Returns `true` when `send_response` has been or will be called, which
    /// is what the host expects a listener to return to keep the channel open.
    /// Messages that are not call requests go to the custom handler, whose
    /// answer is returned as is; without one they are ignored and `false` is
    /// returned so other listeners may respond. A value the custom handler
    /// responds with is wrapped in a success envelope unless it already is a
    /// reply envelope.
    pub fn handle_message(&self, request: Value, sender: Value, send_response: Responder) -> bool {
        let call = match Request::classify(&request) {
            Incoming::Other => {
                return match &self.options.custom_handler {
                    Some(custom) => {
                        debug!("Passing message to custom handler");
                        let send_response: Responder =
                            Box::new(move |response| send_response(envelope(response)));
                        custom.handle(request, sender, send_response)
                    }
                    None => {
                        trace!("Ignoring message that is not a function call");
                        false
                    }
                };
            }
            Incoming::List => {
                self.log_request(&request);
                send_response(Reply::shape(&self.registry.shape()).to_value());
                return true;
            }
            Incoming::Call(call) => call,
        };

        self.log_request(&request);

        let continuation = call.and_then(|call| {
            let context = CallContext { request, sender };
            self.invoke(&call.func, call.params, context)
        });

        match continuation {
            Err(e) => {
                warn!(error = %e, "Function call could not be dispatched");
                send_response(Reply::failure(e).to_value());
            }
            Ok(Continuation::Ready(result)) => send_response(reply_for(result).to_value()),
            Ok(Continuation::Pending(future)) => {
                // shared so a failed spawn can still answer
                let responder = Rc::new(RefCell::new(Some(send_response)));
                let pending = responder.clone();
                let task = async move {
                    let reply = reply_for(future.await);
                    let send_response = pending.borrow_mut().take();
                    if let Some(send_response) = send_response {
                        send_response(reply.to_value());
                    }
                };
                if let Err(e) = self
                    .spawner
                    .spawn_local_obj(LocalFutureObj::new(Box::pin(task)))
                {
                    error!(?e, "Failed to spawn pending function call");
                    let send_response = responder.borrow_mut().take();
                    if let Some(send_response) = send_response {
                        let reply = Reply::failure(format!("Failed to schedule function call: {e}"));
                        send_response(reply.to_value());
                    }
                }
            }
        }

        true
    }

    /// Resolves `func` and invokes it with `params` and `context`
    pub fn invoke(&self, func: &str, params: Vec<Value>, context: CallContext) -> Result<Continuation> {
        let path = CallPath::parse(func)?;
        let handler = self.registry.resolve(&path)?;
        trace!(%path, args = params.len(), "Invoking function");
        Ok(handler.call(params, context))
    }

    fn log_request(&self, request: &Value) {
        if self.options.logs_requests() {
            let line = self.options.format_request(request);
            info!("{line}");
        }
    }
}

// custom handlers may answer with a bare value or a full reply envelope
fn envelope(response: Value) -> Value {
    match Reply::from_value(response.clone()) {
        Ok(_) => response,
        Err(_) => Reply::success(response).to_value(),
    }
}

fn reply_for(result: HandlerResult) -> Reply {
    match result {
        Ok(value) => Reply::success(value),
        Err(e) => {
            debug!(error = %e, "Function failed");
            Reply::failure(e)
        }
    }
}

impl<H> fmt::Debug for Dispatcher<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("functions", &self.registry.leaf_paths().len())
            .field("options", &self.options)
            .finish()
    }
}

/// Configures a [`Dispatcher`]
pub struct DispatcherBuilder<H> {
    registry: Registry<H>,
    options: Options,
    spawner: Box<dyn LocalSpawn>,
}

impl<H: Handler> DispatcherBuilder<H> {
    /// Replaces the whole configuration
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Logs one line per handled request
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    /// Renders the per-request log line
    pub fn log_request(mut self, format: impl Fn(&Value) -> String + 'static) -> Self {
        let format: RequestFormatter = Box::new(format);
        self.options.log_request = Some(format);
        self
    }

    /// Receives messages that are not call requests
    pub fn custom_handler(mut self, handler: impl CustomHandler + 'static) -> Self {
        self.options.custom_handler = Some(Box::new(handler));
        self
    }

    /// Finishes the dispatcher
    pub fn build(self) -> Dispatcher<H> {
        debug!(options = ?self.options, "Building dispatcher");
        Dispatcher {
            registry: self.registry,
            options: self.options,
            spawner: self.spawner,
        }
    }
}

impl<H> fmt::Debug for DispatcherBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use futures::{
        executor::LocalPool,
        future,
        task::SpawnError,
    };
    use serde_json::json;

    use super::*;
    use crate::{HandlerError, from_async_fn, from_fn, handler_fn};

    type Replies = Rc<RefCell<Vec<Value>>>;

    fn responder(replies: &Replies) -> Responder {
        let replies = replies.clone();
        Box::new(move |reply| replies.borrow_mut().push(reply))
    }

    fn registry() -> Registry<Box<dyn Handler>> {
        Registry::<Box<dyn Handler>>::new()
            .handler(
                "syncCall",
                from_fn(|params, _| {
                    let name = params.first().and_then(Value::as_str).unwrap_or_default();
                    Ok(json!(format!("Hey {name}, whats up?")))
                }),
            )
            .handler(
                "asyncCall",
                from_async_fn(|params, _| async move { Ok(json!(params.len())) }),
            )
            .handler("throws", from_fn(|_, _| Err(HandlerError::new("boom"))))
            .handler(
                "rejects",
                handler_fn(|_, _| Continuation::pending(future::err(HandlerError::new("nope")))),
            )
            .handler(
                "whoami",
                from_fn(|_, context| Ok(context.sender["tab"]["id"].clone())),
            )
            .group(
                "nestedObject",
                Registry::<Box<dyn Handler>>::new().handler("nested", from_fn(|_, _| Ok(json!("nested")))),
            )
    }

    fn call(func: &str, params: Value) -> Value {
        json!({ "type": "function-call", "func": func, "params": params })
    }

    #[test]
    fn test_sync_reply_is_immediate() {
        let pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner()).build();
        let replies = Replies::default();

        let keep_open = dispatcher.handle_message(call("syncCall", json!(["X"])), json!({}), responder(&replies));

        assert!(keep_open);
        assert_eq!(
            *replies.borrow(),
            [json!({ "type": "function-result", "result": "Hey X, whats up?" })]
        );
    }

    #[test]
    fn test_async_reply_arrives_after_spawn() {
        let mut pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner()).build();
        let replies = Replies::default();

        assert!(dispatcher.handle_message(call("asyncCall", json!([1, 2, 3])), json!({}), responder(&replies)));
        assert!(replies.borrow().is_empty());

        pool.run_until_stalled();
        assert_eq!(*replies.borrow(), [json!({ "type": "function-result", "result": 3 })]);
    }

    #[test]
    fn test_throw_and_reject_become_failures() {
        let mut pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner()).build();
        let replies = Replies::default();

        dispatcher.handle_message(call("throws", json!([])), json!({}), responder(&replies));
        dispatcher.handle_message(call("rejects", json!([])), json!({}), responder(&replies));
        pool.run_until_stalled();

        assert_eq!(
            *replies.borrow(),
            [
                json!({ "type": "function-error", "error": "boom" }),
                json!({ "type": "function-error", "error": "nope" }),
            ]
        );
    }

    #[test]
    fn test_resolution_failures() {
        let pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner()).build();
        let replies = Replies::default();

        dispatcher.handle_message(call("missing.fn", json!([])), json!({}), responder(&replies));
        dispatcher.handle_message(call("nestedObject", json!([])), json!({}), responder(&replies));
        dispatcher.handle_message(call("a..b", json!([])), json!({}), responder(&replies));
        dispatcher.handle_message(
            json!({ "type": "function-call", "params": [] }),
            json!({}),
            responder(&replies),
        );

        let replies = replies.borrow();
        assert_eq!(replies.len(), 4);
        assert_eq!(
            replies[0],
            json!({ "type": "function-error", "error": "No function registered at `missing.fn`" })
        );
        assert_eq!(
            replies[1],
            json!({ "type": "function-error", "error": "`nestedObject` is a group of functions and cannot be called" })
        );
        assert!(replies[2]["error"].as_str().unwrap().starts_with("Invalid call path `a..b`"));
        assert!(replies[3]["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[test]
    fn test_context_carries_request_and_sender() {
        let pool = LocalPool::new();
        let seen = Rc::new(RefCell::new(None));
        let seen_clone = seen.clone();
        let registry = Registry::new().function(
            "echo",
            handler_fn(move |params, context| {
                *seen_clone.borrow_mut() = Some((params, context));
                Continuation::value(Value::Null)
            }),
        );
        let dispatcher = Dispatcher::builder(registry, pool.spawner()).build();
        let request = call("echo", json!(["a", 1]));
        let sender = json!({ "tab": { "id": 7 }, "origin": "https://example.com" });

        dispatcher.handle_message(request.clone(), sender.clone(), Box::new(|_| {}));

        let (params, context) = seen.borrow_mut().take().unwrap();
        assert_eq!(params, [json!("a"), json!(1)]);
        assert_eq!(context, CallContext { request, sender });
    }

    #[test]
    fn test_sender_reaches_handler() {
        let pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner()).build();
        let replies = Replies::default();

        dispatcher.handle_message(call("whoami", json!([])), json!({ "tab": { "id": 42 } }), responder(&replies));

        assert_eq!(replies.borrow()[0]["result"], json!(42));
    }

    #[test]
    fn test_function_list() {
        let pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner()).build();
        let replies = Replies::default();

        assert!(dispatcher.handle_message(json!({ "type": "function-list" }), json!({}), responder(&replies)));

        let reply = Reply::from_value(replies.borrow()[0].clone()).unwrap();
        let shape = Shape::try_from(reply.into_result().unwrap()).unwrap();
        assert_eq!(shape, dispatcher.shape());
    }

    #[test]
    fn test_other_messages_without_custom_handler_are_ignored() {
        let pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner()).build();
        let replies = Replies::default();

        let keep_open = dispatcher.handle_message(json!({ "command": "Other" }), json!({}), responder(&replies));

        assert!(!keep_open);
        assert!(replies.borrow().is_empty());
    }

    #[test]
    fn test_custom_handler_receives_other_messages() {
        let pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner())
            .custom_handler(|request: Value, _sender: Value, send_response: Responder| {
                if request["command"] == "Other" {
                    send_response(json!({ "type": "function-result", "result": "From Custom Handler" }));
                    return true;
                }
                false
            })
            .build();
        let replies = Replies::default();

        assert!(dispatcher.handle_message(
            json!({ "command": "Other", "data": { "foo": "bar" } }),
            json!({}),
            responder(&replies)
        ));
        assert!(!dispatcher.handle_message(json!({ "command": "Nope" }), json!({}), responder(&replies)));
        assert_eq!(
            *replies.borrow(),
            [json!({ "type": "function-result", "result": "From Custom Handler" })]
        );
    }

    #[test]
    fn test_custom_handler_bare_value_is_wrapped() {
        let pool = LocalPool::new();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner())
            .custom_handler(|request: Value, _sender: Value, send_response: Responder| {
                match request["command"].as_str() {
                    Some("Other") => send_response(json!("From Custom Handler")),
                    Some("Fail") => send_response(json!({ "type": "function-error", "error": "Refused" })),
                    _ => return false,
                }
                true
            })
            .build();
        let replies = Replies::default();

        dispatcher.handle_message(json!({ "command": "Other" }), json!({}), responder(&replies));
        dispatcher.handle_message(json!({ "command": "Fail" }), json!({}), responder(&replies));

        assert_eq!(
            *replies.borrow(),
            [
                json!({ "type": "function-result", "result": "From Custom Handler" }),
                json!({ "type": "function-error", "error": "Refused" }),
            ]
        );
    }

    struct ShutDown;

    impl LocalSpawn for ShutDown {
        fn spawn_local_obj(&self, _future: LocalFutureObj<'static, ()>) -> std::result::Result<(), SpawnError> {
            Err(SpawnError::shutdown())
        }
    }

    #[test]
    fn test_failed_spawn_still_replies() {
        let dispatcher = Dispatcher::builder(registry(), ShutDown).build();
        let replies = Replies::default();

        assert!(dispatcher.handle_message(call("asyncCall", json!([1])), json!({}), responder(&replies)));

        let replies = replies.borrow();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["type"], "function-error");
        assert!(
            replies[0]["error"]
                .as_str()
                .unwrap()
                .starts_with("Failed to schedule function call")
        );
    }

    #[test]
    fn test_log_formatter_sees_each_request() {
        let pool = LocalPool::new();
        let lines = Rc::new(RefCell::new(Vec::new()));
        let lines_clone = lines.clone();
        let dispatcher = Dispatcher::builder(registry(), pool.spawner())
            .verbose(true)
            .log_request(move |request| {
                let line = format!("call {}", request["func"]);
                lines_clone.borrow_mut().push(line.clone());
                line
            })
            .build();

        dispatcher.handle_message(call("syncCall", json!(["X"])), json!({}), Box::new(|_| {}));
        dispatcher.handle_message(json!({ "command": "Other" }), json!({}), Box::new(|_| {}));

        assert_eq!(*lines.borrow(), ["call \"syncCall\""]);
    }
}
