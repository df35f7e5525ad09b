use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// Decodes one request body. Undecodable bytes are a parse error with a null id; a JSON
/// value that is not a request object is an invalid request echoing whatever id it had.
pub fn parse_request(bytes: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(JsonRpcResponse::error(
            Value::Null,
            PARSE_ERROR,
            "Parse error",
        ));
    }
    let value: Value = serde_json::from_slice(bytes).map_err(|err| {
        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {err}"))
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    if !value.is_object() {
        return Err(JsonRpcResponse::error(
            id,
            INVALID_REQUEST,
            "Invalid request: expected a JSON object",
        ));
    }
    serde_json::from_value(value).map_err(|err| {
        JsonRpcResponse::error(id, INVALID_REQUEST, format!("Invalid request: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_garbled_bodies_are_parse_errors() {
        for body in [&b""[..], b"  \n", b"{not json"] {
            let err = parse_request(body).expect_err("should reject");
            assert_eq!(err.error_code(), Some(PARSE_ERROR));
            assert_eq!(err.id, Value::Null);
        }
    }

    #[test]
    fn wrongly_typed_members_are_invalid_requests() {
        let err = parse_request(br#"{"id": 7, "method": 12}"#).expect_err("should reject");
        assert_eq!(err.error_code(), Some(INVALID_REQUEST));
        assert_eq!(err.id, Value::from(7));
    }

    #[test]
    fn missing_params_default_to_null() {
        let req = parse_request(br#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#).expect("parse");
        assert_eq!(req.method, "ping");
        assert!(req.params.is_null());
    }
}
