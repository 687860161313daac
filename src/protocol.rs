//! JSON-RPC 2.0 message types for the line-delimited stdio protocol.
//!
//! Requests are decoded in two steps: the line is first parsed as a plain
//! JSON value so that parse failures, non-object payloads and notifications
//! can be told apart, then the envelope fields are extracted by
//! [`RequestEnvelope::from_value`].

use crate::constants::{JSONRPC_VERSION, PROTOCOL_VERSION};
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Request correlation id. Integers and strings only; `null` marks a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Supported protocol methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Ping,
    ToolsList,
    ToolsCall,
}

impl Method {
    /// Every routable method.
    pub const ALL: [Method; 4] = [
        Method::Initialize,
        Method::Ping,
        Method::ToolsList,
        Method::ToolsCall,
    ];

    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Ping => "ping",
            Method::ToolsList => "tools/list",
            Method::ToolsCall => "tools/call",
        }
    }

    /// Look up a method by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A request that expects exactly one response.
    Request(RequestEnvelope),
    /// A message without an id. Never answered.
    Notification { method: Option<String> },
}

/// Envelope of a request that carries an id.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub id: RequestId,
    pub method: String,
    pub params: Option<Value>,
}

impl RequestEnvelope {
    /// Classify a parsed JSON value.
    ///
    /// Errors carry the id to answer with: `None` when the id itself is
    /// unusable (the response then uses `"id": null`).
    pub fn from_value(value: Value) -> Result<Incoming, (Option<RequestId>, ProtocolError)> {
        let Value::Object(mut object) = value else {
            return Err((
                None,
                ProtocolError::InvalidRequest("request must be a JSON object".into()),
            ));
        };

        let id = match object.remove("id") {
            None | Some(Value::Null) => {
                let method = object
                    .get("method")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Ok(Incoming::Notification { method });
            }
            Some(raw) => match serde_json::from_value::<RequestId>(raw) {
                Ok(id) => id,
                Err(_) => {
                    return Err((
                        None,
                        ProtocolError::InvalidRequest("id must be an integer or a string".into()),
                    ))
                }
            },
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Err((
                    Some(id),
                    ProtocolError::InvalidRequest("method must be a string".into()),
                ))
            }
            None => {
                return Err((
                    Some(id),
                    ProtocolError::InvalidRequest("missing method".into()),
                ))
            }
        };

        Ok(Incoming::Request(RequestEnvelope {
            id,
            method,
            params: object.remove("params"),
        }))
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&ProtocolError> for JsonRpcError {
    fn from(e: &ProtocolError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            data: None,
        }
    }
}

/// JSON-RPC response. Exactly one of `result` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: &ProtocolError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Error code, when this is an error response.
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// Server identity reported by `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Tools capability marker. Serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsCapability {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

/// Result of `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: ServerInfo,
    pub capabilities: ServerCapabilities,
}

impl Default for InitializeResult {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo::default(),
            capabilities: ServerCapabilities::default(),
        }
    }
}

/// Catalog entry returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result of `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

/// A content block of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// Result of `tools/call`.
///
/// Tool-level failures are reported here with `is_error` set rather than
/// as JSON-RPC errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// Successful result with a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: None,
            structured_content: None,
        }
    }

    /// Failed result with a single text block.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(text)
        }
    }

    /// Attach a structured copy of the payload.
    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text of the first content block.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|c| match c {
            Content::Text { text } => text.as_str(),
        })
    }
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl CallToolParams {
    /// Extract the tool name and argument object from raw params.
    pub fn from_params(params: Option<Value>) -> Result<Self, ProtocolError> {
        let Some(Value::Object(mut params)) = params else {
            return Err(ProtocolError::InvalidParams(
                "tools/call requires a params object".into(),
            ));
        };
        let name = match params.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(ProtocolError::InvalidParams("missing tool name".into())),
        };
        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => {
                return Err(ProtocolError::InvalidParams(
                    "arguments must be an object".into(),
                ))
            }
        };
        Ok(Self { name, arguments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_with_integer_id() {
        let incoming = RequestEnvelope::from_value(json!({
            "jsonrpc": "2.0", "id": 7, "method": "ping"
        }))
        .unwrap();
        assert_eq!(
            incoming,
            Incoming::Request(RequestEnvelope {
                id: RequestId::Number(7),
                method: "ping".into(),
                params: None,
            })
        );
    }

    #[test]
    fn test_missing_or_null_id_is_notification() {
        let incoming =
            RequestEnvelope::from_value(json!({"method": "notifications/initialized"})).unwrap();
        assert!(matches!(incoming, Incoming::Notification { .. }));

        let incoming = RequestEnvelope::from_value(json!({"id": null, "method": "ping"})).unwrap();
        assert!(matches!(incoming, Incoming::Notification { .. }));
    }

    #[test]
    fn test_bad_id_type_is_invalid_request() {
        let (id, err) =
            RequestEnvelope::from_value(json!({"id": [1], "method": "ping"})).unwrap_err();
        assert_eq!(id, None);
        assert_eq!(err.code(), -32600);

        let (id, err) = RequestEnvelope::from_value(json!({"id": 1.5, "method": "ping"})).unwrap_err();
        assert_eq!(id, None);
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn test_missing_method_keeps_id() {
        let (id, err) = RequestEnvelope::from_value(json!({"id": "a"})).unwrap_err();
        assert_eq!(id, Some(RequestId::String("a".into())));
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn test_non_object_is_invalid_request() {
        let (id, err) = RequestEnvelope::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(id, None);
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn test_method_lookup() {
        assert_eq!(Method::from_name("tools/call"), Some(Method::ToolsCall));
        assert_eq!(Method::from_name("resources/list"), None);
    }

    #[test]
    fn test_error_response_shape() {
        let response = JsonRpcResponse::error(None, &ProtocolError::ParseError("eof".into()));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], -32700);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_response_roundtrip() {
        let response = JsonRpcResponse::success(
            RequestId::String("abc".into()),
            json!({"content": [{"type": "text", "text": "hi"}]}),
        );
        let line = serde_json::to_string(&response).unwrap();
        let back: JsonRpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_initialize_result_shape() {
        let value = serde_json::to_value(InitializeResult::default()).unwrap();
        assert_eq!(value["protocolVersion"], "2024-11-05");
        assert_eq!(value["capabilities"], json!({"tools": {}}));
        assert_eq!(value["serverInfo"]["name"], "sql-mcp-server");
    }

    #[test]
    fn test_call_tool_result_shape() {
        let value = serde_json::to_value(CallToolResult::error("nope")).unwrap();
        assert_eq!(
            value,
            json!({"content": [{"type": "text", "text": "nope"}], "isError": true})
        );
        let value = serde_json::to_value(CallToolResult::text("ok")).unwrap();
        assert!(value.get("isError").is_none());
    }

    #[test]
    fn test_call_tool_params() {
        let params = CallToolParams::from_params(Some(json!({"name": "list_databases"}))).unwrap();
        assert_eq!(params.name, "list_databases");
        assert!(params.arguments.is_empty());

        let err = CallToolParams::from_params(Some(json!({"arguments": {}}))).unwrap_err();
        assert_eq!(err.code(), -32602);

        let err = CallToolParams::from_params(None).unwrap_err();
        assert_eq!(err.code(), -32602);
    }
}
