//! msgpack-RPC message shapes.
//!
//! ```text
//! [0, id, method, params]   request
//! [1, id, error, result]    response
//! [2, method, params]       notification
//! ```

use std::fmt;

use nvrpc_codec::Value;

use crate::error::FrameError;

/// Message type marker for requests.
pub const REQUEST: i64 = 0;
/// Message type marker for responses.
pub const RESPONSE: i64 = 1;
/// Message type marker for notifications.
pub const NOTIFICATION: i64 = 2;

/// msgpack-RPC message id (an unsigned 32-bit integer on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<RequestId> for Value {
    fn from(id: RequestId) -> Self {
        Value::from(id.0)
    }
}

impl TryFrom<&Value> for RequestId {
    type Error = FrameError;

    fn try_from(value: &Value) -> Result<Self, FrameError> {
        value
            .as_i64()
            .and_then(|n| u32::try_from(n).ok())
            .map(RequestId)
            .ok_or_else(|| FrameError::InvalidId(value.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(id: RequestId, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

/// How a request ended on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Value),
    /// The error value exactly as the peer sent it.
    Failure(Value),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_result(self) -> Result<Value, Value> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: RequestId,
    pub outcome: Outcome,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Success(result),
        }
    }

    pub fn failure(id: RequestId, error: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Failure(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub method: String,
    pub params: Vec<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// Classify a decoded value.
    ///
    /// A response with a nil error is a success, even when the result is nil
    /// too (Neovim answers void calls with `[1, id, nil, nil]`). A response
    /// with both fields non-nil is rejected.
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let items = match value {
            Value::Array(items) => items,
            other => return Err(FrameError::NotAnArray(other.kind())),
        };
        if !(3..=4).contains(&items.len()) {
            return Err(FrameError::Length(items.len()));
        }

        let kind = match &items[0] {
            Value::Integer(kind @ REQUEST..=NOTIFICATION) => *kind,
            other => return Err(FrameError::UnknownType(other.clone())),
        };

        match kind {
            REQUEST => {
                let [_, id, method, params] = fields(items, "request")?;
                Ok(Message::Request(Request {
                    id: RequestId::try_from(&id)?,
                    method: method_name(method)?,
                    params: param_list(params)?,
                }))
            }
            RESPONSE => {
                let [_, id, error, result] = fields(items, "response")?;
                let id = RequestId::try_from(&id)?;
                let outcome = match (error, result) {
                    (Value::Nil, result) => Outcome::Success(result),
                    (error, Value::Nil) => Outcome::Failure(error),
                    (error, result) => return Err(FrameError::AmbiguousResponse { error, result }),
                };
                Ok(Message::Response(Response { id, outcome }))
            }
            _ => {
                let [_, method, params] = fields(items, "notification")?;
                Ok(Message::Notification(Notification {
                    method: method_name(method)?,
                    params: param_list(params)?,
                }))
            }
        }
    }

    /// Wire shape of the message.
    ///
    /// `Outcome::Failure(Value::Nil)` has no distinct encoding and reads back
    /// as `Outcome::Success(Value::Nil)`.
    pub fn into_value(self) -> Value {
        match self {
            Message::Request(Request { id, method, params }) => Value::Array(vec![
                Value::Integer(REQUEST),
                id.into(),
                Value::String(method),
                Value::Array(params),
            ]),
            Message::Response(Response { id, outcome }) => {
                let (error, result) = match outcome {
                    Outcome::Success(result) => (Value::Nil, result),
                    Outcome::Failure(error) => (error, Value::Nil),
                };
                Value::Array(vec![Value::Integer(RESPONSE), id.into(), error, result])
            }
            Message::Notification(Notification { method, params }) => Value::Array(vec![
                Value::Integer(NOTIFICATION),
                Value::String(method),
                Value::Array(params),
            ]),
        }
    }

    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    /// Short name of the message type, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Request(_) => "request",
            Message::Response(_) => "response",
            Message::Notification(_) => "notification",
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

impl From<Notification> for Message {
    fn from(notification: Notification) -> Self {
        Message::Notification(notification)
    }
}

impl TryFrom<Value> for Message {
    type Error = FrameError;

    fn try_from(value: Value) -> Result<Self, FrameError> {
        Message::from_value(value)
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        message.into_value()
    }
}

fn fields<const N: usize>(items: Vec<Value>, kind: &'static str) -> Result<[Value; N], FrameError> {
    let actual = items.len();
    <[Value; N]>::try_from(items).map_err(|_| FrameError::Arity {
        kind,
        expected: N,
        actual,
    })
}

fn method_name(value: Value) -> Result<String, FrameError> {
    match value {
        Value::String(method) => Ok(method),
        other => Err(FrameError::InvalidMethod(other.kind())),
    }
}

fn param_list(value: Value) -> Result<Vec<Value>, FrameError> {
    match value {
        Value::Array(params) => Ok(params),
        other => Err(FrameError::InvalidParams(other.kind())),
    }
}
