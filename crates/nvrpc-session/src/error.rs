use nvrpc_codec::{ParseError, Value};
use nvrpc_transport::TransportError;

/// A well-formed MessagePack value that is not a msgpack-RPC message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("message must be an array, got {0}")]
    NotAnArray(&'static str),

    #[error("message must be an array of 3 or 4 elements, got {0}")]
    Length(usize),

    /// First element is not one of the message type integers 0, 1 or 2.
    #[error("unknown message type {0}")]
    UnknownType(Value),

    #[error("{kind} must have {expected} elements, got {actual}")]
    Arity {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Ids are unsigned 32-bit integers.
    #[error("message id must be an integer in 0..=4294967295, got {0}")]
    InvalidId(Value),

    #[error("method name must be a string, got {0}")]
    InvalidMethod(&'static str),

    #[error("params must be an array, got {0}")]
    InvalidParams(&'static str),

    #[error("response carries both an error ({error}) and a result ({result})")]
    AmbiguousResponse { error: Value, result: Value },
}

/// The error value of a failed response, passed through verbatim.
///
/// Neovim sends `[type, message]` arrays; [`RemoteError::message`] extracts
/// the text for that shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RemoteError(pub Value);

impl RemoteError {
    /// Human-readable message, if the error has a recognisable shape.
    pub fn message(&self) -> Option<&str> {
        match &self.0 {
            Value::String(text) => Some(text),
            Value::Array(items) => items.get(1).and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The inbound byte stream is not valid MessagePack. Fatal.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The peer sent a value that is not a msgpack-RPC message. Fatal.
    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),

    /// The peer answered this call with an error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session was torn down before the call completed.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// True for errors that end the session rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Parse(_) | SessionError::Frame(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
