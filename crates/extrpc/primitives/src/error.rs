//! Error type shared by the dispatcher and the proxy.
//!
//! Dispatcher-side failures ([`Error::UnknownFunction`], [`Error::NotCallable`],
//! [`Error::Remote`], [`Error::InvalidRequest`]) travel to the caller inside a
//! failure [`Reply`](crate::Reply) and surface there as [`Error::Remote`]
//! carrying the original message.

/// Result alias used throughout extrpc
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Everything that can go wrong while making or serving a remote call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Nothing is registered at the requested path
    #[error("No function registered at `{path}`")]
    UnknownFunction {
        /// The path that was requested
        path: String,
    },

    /// The path names a group of functions rather than a function
    #[error("`{path}` is a group of functions and cannot be called")]
    NotCallable {
        /// The path that was requested
        path: String,
    },

    /// The remote function threw or rejected
    #[error("{0}")]
    Remote(String),

    /// The host messaging channel failed (no listener, closed port, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A reply arrived but matched neither reply envelope
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A call path could not be parsed
    #[error("Invalid call path `{path}`: {reason}")]
    InvalidPath {
        /// The offending input
        path: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// A message carried the call marker but not a usable call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A value could not cross the messaging boundary
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<Error> for wasm_bindgen::JsValue {
    fn from(e: Error) -> Self {
        wasm_bindgen::JsError::new(&e.to_string()).into()
    }
}
