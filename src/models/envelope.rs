//! JSON-RPC style call envelopes exchanged with backends
//!
//! A [`CallEnvelope`] goes out, a [`ReplyEnvelope`] comes back. The `id`
//! links the two, which matters for event-stream backends where the reply
//! arrives on a different connection than the call.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Backend reported the method/tool as unknown
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// Backend rejected the arguments
pub const CODE_INVALID_PARAMS: i64 = -32602;
/// Catch-all for error payloads that are not `{code, message}` objects
pub const CODE_INTERNAL_ERROR: i64 = -32603;
/// Synthesized by the router when an event stream produced no terminal event
pub const CODE_NO_RESPONSE: i64 = -32001;
/// Backend declared itself unavailable
pub const CODE_SERVICE_UNAVAILABLE: i64 = -32003;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl CallEnvelope {
    pub fn tools_call(id: u64, tool_name: &str, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        Self {
            id,
            method: METHOD_TOOLS_CALL.to_string(),
            params: json!({
                "name": tool_name,
                "arguments": arguments,
            }),
        }
    }

    pub fn tools_list(id: u64) -> Self {
        Self {
            id,
            method: METHOD_TOOLS_LIST.to_string(),
            params: Value::Object(Map::new()),
        }
    }

    /// Tool name carried by a `tools/call` envelope
    pub fn tool_name(&self) -> Option<&str> {
        self.params.get("name").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl ReplyEnvelope {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn no_response(id: u64, message: impl Into<String>) -> Self {
        Self::failure(id, CODE_NO_RESPONSE, message)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
