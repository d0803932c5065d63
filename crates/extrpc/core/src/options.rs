use std::fmt;

use serde_json::Value;

/// Delivers a reply to the caller; the host's `sendResponse`
pub type Responder = Box<dyn FnOnce(Value)>;

/// Renders the log line for a request
pub type RequestFormatter = Box<dyn Fn(&Value) -> String>;

/// Fallback for messages that are not call requests.
///
/// Mirrors the host listener signature: the return value says whether
/// `send_response` will be called asynchronously. A bare value given to
/// `send_response` reaches the caller as a result; a reply envelope is passed
/// on unchanged. Returning `true` without ever responding leaves the caller
/// waiting until the host closes the channel.
pub trait CustomHandler {
    /// Handles a message the dispatcher did not recognise
    fn handle(&self, request: Value, sender: Value, send_response: Responder) -> bool;
}

impl<F> CustomHandler for F
where
    F: Fn(Value, Value, Responder) -> bool,
{
    fn handle(&self, request: Value, sender: Value, send_response: Responder) -> bool {
        self(request, sender, send_response)
    }
}

/// Dispatcher configuration
#[derive(Default)]
pub struct Options {
    /// Emit one log line per handled request
    pub verbose: bool,
    /// Replaces the default log line; setting it also turns logging on
    pub log_request: Option<RequestFormatter>,
    /// Receives every message that is not a call request
    pub custom_handler: Option<Box<dyn CustomHandler>>,
}

impl Options {
    /// Whether a line should be logged per request
    pub fn logs_requests(&self) -> bool {
        self.verbose || self.log_request.is_some()
    }

    /// The log line for `request`
    pub fn format_request(&self, request: &Value) -> String {
        match &self.log_request {
            Some(format) => format(request),
            None => default_log_line(request),
        }
    }
}

fn default_log_line(request: &Value) -> String {
    match (request.get("func"), request.get("params")) {
        (Some(Value::String(func)), Some(params)) => {
            format!("Received request: {func}({params})")
        }
        (Some(Value::String(func)), None) => format!("Received request: {func}()"),
        _ => format!("Received request: {request}"),
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("verbose", &self.verbose)
            .field("log_request", &self.log_request.is_some())
            .field("custom_handler", &self.custom_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_log_line() {
        let options = Options {
            verbose: true,
            ..Default::default()
        };
        assert!(options.logs_requests());
        assert_eq!(
            options.format_request(&json!({ "type": "function-call", "func": "syncCall", "params": ["X"] })),
            "Received request: syncCall([\"X\"])"
        );
        assert_eq!(
            options.format_request(&json!({ "type": "function-list" })),
            "Received request: {\"type\":\"function-list\"}"
        );
    }

    #[test]
    fn test_formatter_overrides_line() {
        let options = Options {
            log_request: Some(Box::new(|request| format!("-> {}", request["func"]))),
            ..Default::default()
        };
        assert!(options.logs_requests());
        assert_eq!(options.format_request(&json!({ "func": "a.b" })), "-> \"a.b\"");
    }

    #[test]
    fn test_quiet_by_default() {
        assert!(!Options::default().logs_requests());
    }
}
