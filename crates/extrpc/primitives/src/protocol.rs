use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Error, Result, Shape};

/// `type` marker of a call request
pub const FUNCTION_CALL: &str = "function-call";
/// `type` marker of the shape-discovery request
pub const FUNCTION_LIST: &str = "function-list";
/// `type` marker of a success reply
pub const FUNCTION_RESULT: &str = "function-result";
/// `type` marker of a failure reply
pub const FUNCTION_ERROR: &str = "function-error";

/// Body of a `function-call` request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Display)]
#[display("FunctionCall {{ func: {}, params: {:?} }}", func, params)]
pub struct FunctionCall {
    /// Dot/bracket path of the function to invoke
    pub func: String,
    /// Positional arguments
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Requests understood by the dispatcher
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    /// `{ "type": "function-call", "func": .., "params": [..] }`
    FunctionCall(FunctionCall),
    /// `{ "type": "function-list" }`
    FunctionList,
}

impl Request {
    /// A call request for `func` with the given arguments
    pub fn call(func: impl Into<String>, params: Vec<Value>) -> Self {
        Self::FunctionCall(FunctionCall {
            func: func.into(),
            params,
        })
    }

    /// The JSON form sent over the wire
    pub fn to_value(&self) -> Value {
        match self {
            Self::FunctionCall(call) => json!({
                "type": FUNCTION_CALL,
                "func": call.func,
                "params": call.params,
            }),
            Self::FunctionList => json!({ "type": FUNCTION_LIST }),
        }
    }

    /// Sorts an arbitrary incoming message
    pub fn classify(message: &Value) -> Incoming {
        match message.get("type").and_then(Value::as_str) {
            Some(FUNCTION_CALL) => Incoming::Call(
                FunctionCall::deserialize(message)
                    .map_err(|e| Error::InvalidRequest(e.to_string())),
            ),
            Some(FUNCTION_LIST) => Incoming::List,
            _ => Incoming::Other,
        }
    }
}

/// What an incoming message turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A call request, or the reason it could not be read as one
    Call(Result<FunctionCall>),
    /// A shape-discovery request
    List,
    /// Anything else; left to the custom handler
    Other,
}

/// The implicit final argument handed to every registered function
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallContext {
    /// The request exactly as it arrived
    pub request: Value,
    /// Transport metadata attached by the host channel (tab, origin, ...)
    pub sender: Value,
}

impl CallContext {
    /// The JSON form handed to functions
    pub fn to_value(&self) -> Value {
        json!({ "request": self.request, "sender": self.sender })
    }
}

/// Reply envelope; success and failure differ by shape alone.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Reply {
    /// `{ "type": "function-result", "result": .. }`
    FunctionResult {
        /// The function's return value
        #[serde(default)]
        result: Value,
    },
    /// `{ "type": "function-error", "error": ".." }`
    FunctionError {
        /// Description of what went wrong
        error: String,
    },
}

impl Reply {
    /// Wraps a returned value
    pub fn success(result: Value) -> Self {
        Self::FunctionResult { result }
    }

    /// Wraps a failure description
    pub fn failure(error: impl ToString) -> Self {
        Self::FunctionError {
            error: error.to_string(),
        }
    }

    /// The JSON form sent over the wire
    pub fn to_value(&self) -> Value {
        match self {
            Self::FunctionResult { result } => json!({ "type": FUNCTION_RESULT, "result": result }),
            Self::FunctionError { error } => json!({ "type": FUNCTION_ERROR, "error": error }),
        }
    }

    /// Reads a reply, rejecting anything that is neither envelope
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value.get("type").and_then(Value::as_str);
        if !matches!(kind, Some(FUNCTION_RESULT | FUNCTION_ERROR)) {
            return Err(Error::MalformedResponse(format!(
                "expected a {FUNCTION_RESULT} or {FUNCTION_ERROR} envelope, got {value}"
            )));
        }
        Self::deserialize(&value).map_err(|e| Error::MalformedResponse(e.to_string()))
    }

    /// Success value, or the remote failure as [`Error::Remote`]
    pub fn into_result(self) -> Result<Value> {
        match self {
            Self::FunctionResult { result } => Ok(result),
            Self::FunctionError { error } => Err(Error::Remote(error)),
        }
    }

    /// Success envelope carrying a function tree skeleton
    pub fn shape(shape: &Shape) -> Self {
        Self::success(shape.to_value())
    }
}

impl From<Result<Value>> for Reply {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => Self::failure(e),
        }
    }
}
