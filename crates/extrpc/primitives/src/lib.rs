//! Types shared by both ends of an extrpc connection.
//!
//! The background context answers [`Request`]s with [`Reply`] envelopes, and
//! the caller context discovers the registered functions through a [`Shape`].
//! Functions are addressed by [`CallPath`].

mod convert;
mod error;
mod path;
mod protocol;
mod shape;

pub use convert::{from_js, to_js};
pub use error::{Error, Result};
pub use path::CallPath;
pub use protocol::{
    CallContext, FUNCTION_CALL, FUNCTION_ERROR, FUNCTION_LIST, FUNCTION_RESULT, FunctionCall,
    Incoming, Reply, Request,
};
pub use shape::{Shape, ShapeNode};
