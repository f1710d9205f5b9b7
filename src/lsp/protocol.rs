//! JSON-RPC 2.0 message shapes and classification of incoming frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing request.
#[derive(Debug, Serialize)]
pub struct RequestMessage<'a> {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Client-allocated request id.
    pub id: u64,
    /// Method name.
    pub method: &'a str,
    /// Omitted when `null`.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl<'a> RequestMessage<'a> {
    /// A request with id `id`.
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Outgoing notification.
#[derive(Debug, Serialize)]
pub struct NotificationMessage<'a> {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: &'a str,
    /// Omitted when `null`.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl<'a> NotificationMessage<'a> {
    /// A notification for `method`.
    pub fn new(method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Extra error payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outgoing response to a server-initiated request.
#[derive(Debug, Serialize)]
pub struct ResponseMessage {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Echo of the server's request id.
    pub id: Value,
    /// Set on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl ResponseMessage {
    /// A successful reply. `null` results are still serialized.
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failed reply with `code`.
    pub fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// What a decoded frame turned out to be.
#[derive(Debug, PartialEq)]
pub enum Incoming {
    /// Answer to one of our requests.
    Response {
        /// Id of the request being answered.
        id: u64,
        /// `result` or `error`.
        outcome: Result<Value, ResponseError>,
    },
    /// A request initiated by the server; it expects a reply.
    Request {
        /// Server-chosen id, echoed in our reply.
        id: Value,
        /// Request method.
        method: String,
        /// Params, `null` when absent.
        params: Value,
    },
    /// Fire-and-forget message from the server.
    Notification {
        /// Notification method.
        method: String,
        /// Params, `null` when absent.
        params: Value,
    },
    /// Anything else. Logged and dropped by the read loop.
    Invalid(String),
}

/// Sorts a raw frame into one of the [`Incoming`] shapes.
pub fn classify(mut frame: Value) -> Incoming {
    let Some(object) = frame.as_object_mut() else {
        return Incoming::Invalid(format!("frame is not an object: {frame}"));
    };

    let id = object.remove("id").filter(|id| !id.is_null());
    let method = object
        .remove("method")
        .and_then(|m| m.as_str().map(str::to_owned));
    let params = object.remove("params").unwrap_or(Value::Null);

    match (id, method) {
        (Some(id), Some(method)) => Incoming::Request { id, method, params },
        (None, Some(method)) => Incoming::Notification { method, params },
        (Some(id), None) => {
            let Some(numeric_id) = response_id(&id) else {
                return Incoming::Invalid(format!("response id {id} was not issued by us"));
            };
            let outcome = match object.remove("error") {
                Some(error) if !error.is_null() => match serde_json::from_value(error) {
                    Ok(error) => Err(error),
                    Err(e) => return Incoming::Invalid(format!("malformed error object: {e}")),
                },
                _ => Ok(object.remove("result").unwrap_or(Value::Null)),
            };
            Incoming::Response {
                id: numeric_id,
                outcome,
            }
        }
        (None, None) => Incoming::Invalid("frame has neither id nor method".to_string()),
    }
}

/// We only issue numeric ids, but some servers echo them back as strings.
fn response_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_skips_null_params() {
        let value = serde_json::to_value(RequestMessage::new(3, "shutdown", Value::Null)).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 3, "method": "shutdown"}));
    }

    #[test]
    fn test_null_result_is_kept_in_response() {
        let value = serde_json::to_value(ResponseMessage::ok(json!(4), Value::Null)).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 4, "result": null}));
    }

    #[test]
    fn test_classify_success_response() {
        let incoming = classify(json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}}));
        assert_eq!(
            incoming,
            Incoming::Response {
                id: 1,
                outcome: Ok(json!({"ok": true}))
            }
        );
    }

    #[test]
    fn test_classify_null_result_response() {
        let incoming = classify(json!({"jsonrpc": "2.0", "id": 9, "result": null}));
        assert_eq!(
            incoming,
            Incoming::Response {
                id: 9,
                outcome: Ok(Value::Null)
            }
        );
    }

    #[test]
    fn test_classify_error_response() {
        let incoming = classify(json!({
            "jsonrpc": "2.0",
            "id": "12",
            "error": {"code": -32601, "message": "no such method"}
        }));
        let Incoming::Response { id, outcome } = incoming else {
            panic!("expected response");
        };
        assert_eq!(id, 12);
        assert_eq!(outcome.unwrap_err().code, -32601);
    }

    #[test]
    fn test_classify_server_request_and_notification() {
        assert!(matches!(
            classify(json!({"id": "abc", "method": "workspace/configuration", "params": {}})),
            Incoming::Request { ref method, .. } if method == "workspace/configuration"
        ));
        assert!(matches!(
            classify(json!({"method": "textDocument/publishDiagnostics"})),
            Incoming::Notification { ref params, .. } if params.is_null()
        ));
    }

    #[test]
    fn test_classify_invalid_shapes() {
        assert!(matches!(classify(json!([1, 2])), Incoming::Invalid(_)));
        assert!(matches!(classify(json!({"jsonrpc": "2.0"})), Incoming::Invalid(_)));
        assert!(matches!(
            classify(json!({"id": "not-ours", "result": 1})),
            Incoming::Invalid(_)
        ));
    }
}
