//! JSON-RPC 2.0 transport.

use crate::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sends one JSON-RPC request and returns its `result`.
#[async_trait]
pub trait RpcTransport: Send + Sync {
	async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

	/// Endpoint description for logs.
	fn endpoint(&self) -> &str;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
	jsonrpc: &'static str,
	id: u64,
	method: &'a str,
	params: &'a Value,
}

#[derive(Deserialize)]
struct JsonRpcError {
	code: i64,
	message: String,
	#[serde(default)]
	data: Option<Value>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<JsonRpcError>,
}

/// JSON-RPC over HTTP(S) with incrementing request ids.
pub struct HttpTransport {
	client: reqwest::Client,
	url: String,
	next_id: AtomicU64,
}

impl HttpTransport {
	/// `connect_timeout` bounds connection setup only; request deadlines
	/// are enforced by the enhanced provider.
	pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Result<Self, ProviderError> {
		let client = reqwest::Client::builder()
			.connect_timeout(connect_timeout)
			.build()
			.map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url: url.into(),
			next_id: AtomicU64::new(1),
		})
	}
}

#[async_trait]
impl RpcTransport for HttpTransport {
	async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let body = JsonRpcRequest {
			jsonrpc: "2.0",
			id,
			method,
			params: &params,
		};

		tracing::trace!(url = %self.url, id, method, "Sending RPC request");
		let response = self
			.client
			.post(&self.url)
			.json(&body)
			.send()
			.await
			.map_err(|e| ProviderError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(ProviderError::Network(format!(
				"HTTP {} from {}",
				status, self.url
			)));
		}

		let reply: JsonRpcResponse = response
			.json()
			.await
			.map_err(|e| ProviderError::Network(format!("Invalid JSON-RPC response: {}", e)))?;
		decode_reply(reply)
	}

	fn endpoint(&self) -> &str {
		&self.url
	}
}

fn decode_reply(reply: JsonRpcResponse) -> Result<Value, ProviderError> {
	if let Some(error) = reply.error {
		return Err(ProviderError::Rpc {
			code: error.code,
			message: error.message,
			data: error.data,
		});
	}
	Ok(reply.result.unwrap_or(Value::Null))
}
