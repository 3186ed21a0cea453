//! JSON-RPC 2.0 message types
//!
//! One message per line on stdin, one response per line on stdout. Requests
//! carry an `id`; notifications do not and never get a response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision answered when the client does not ask for one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// An incoming request or notification.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<crate::error::Error> for RpcError {
    fn from(e: crate::error::Error) -> Self {
        RpcError::new(e.code(), e.to_string())
    }
}

/// An outgoing response: exactly one of `result` and `error` is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Parse one line into a request.
///
/// Malformed JSON is a parse error with a null id. Well-formed JSON that is
/// not a request object is an invalid request, echoing its id when present.
pub fn parse_line(line: &str) -> std::result::Result<Request, Response> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        Response::failure(
            Value::Null,
            RpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
        )
    })?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: Request = serde_json::from_value(value).map_err(|e| {
        Response::failure(
            id.clone(),
            RpcError::new(INVALID_REQUEST, format!("Invalid request: {e}")),
        )
    })?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(Response::failure(
            id,
            RpcError::new(INVALID_REQUEST, "Invalid request: jsonrpc must be \"2.0\""),
        ));
    }
    Ok(request)
}
