use serde::{Deserialize, Serialize};

// JSON-RPC 2.0 error codes
pub const INTERNAL_ERROR: i32 = -32603;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const NEWSREC_ERROR: i32 = -32000;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
	pub id: u64,
	pub method: String,
	#[serde(default)]
	pub params: serde_json::Value,
}

/// A reply frame: exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
	pub jsonrpc: &'static str,
	pub id: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<JsonRpcErrorBody>,
}

impl JsonRpcResponse {
	pub fn success(id: u64, result: serde_json::Value) -> Self {
		Self {
			jsonrpc: JSONRPC_VERSION,
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn failure(id: u64, error: JsonRpcErrorBody) -> Self {
		Self {
			jsonrpc: JSONRPC_VERSION,
			id,
			result: None,
			error: Some(error),
		}
	}
}

#[derive(Debug, Serialize)]
pub struct JsonRpcErrorBody {
	pub code: i32,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<serde_json::Value>,
}

/// Server-initiated message without an id.
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
	pub jsonrpc: &'static str,
	pub method: &'a str,
	pub params: serde_json::Value,
}

impl<'a> JsonRpcNotification<'a> {
	pub fn new(method: &'a str, params: serde_json::Value) -> Self {
		Self {
			jsonrpc: JSONRPC_VERSION,
			method,
			params,
		}
	}
}
