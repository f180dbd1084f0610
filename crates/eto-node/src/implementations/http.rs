//! JSON-RPC 2.0 over HTTP.
//!
//! Single calls are posted as one request object, batches as an array. Batch
//! responses may arrive in any order and are matched back by `id`.

use crate::{NodeError, RpcRequest, RpcTransport};
use alloy::rpc::json_rpc::{Id, Request, Response, ResponsePayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default timeout of one HTTP round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn envelope(request: &RpcRequest, id: u64) -> Request<Vec<Value>> {
	Request::new(request.method.clone(), Id::Number(id), request.params.clone())
}

fn into_result(response: Response) -> Result<Value, NodeError> {
	match response.payload {
		// An absent result arrives as a JSON null, e.g. an unknown transaction hash.
		ResponsePayload::Success(raw) => {
			serde_json::from_str(raw.get()).map_err(|e| NodeError::Decode(e.to_string()))
		},
		ResponsePayload::Failure(error) => Err(NodeError::Rpc {
			code: error.code,
			message: error.message.to_string(),
		}),
	}
}

/// HTTP transport to a single node endpoint.
pub struct HttpTransport {
	client: reqwest::Client,
	url: String,
	next_id: AtomicU64,
}

impl HttpTransport {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NodeError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NodeError::Transport(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			url: url.into(),
			next_id: AtomicU64::new(1),
		})
	}

	fn next_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
		&self,
		body: &B,
	) -> Result<R, NodeError> {
		let response = self
			.client
			.post(&self.url)
			.json(body)
			.send()
			.await
			.map_err(|e| NodeError::Transport(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let text = response.text().await.unwrap_or_default();
			return Err(NodeError::Transport(format!("HTTP {}: {}", status, text)));
		}

		response
			.json::<R>()
			.await
			.map_err(|e| NodeError::Decode(e.to_string()))
	}
}

#[async_trait]
impl RpcTransport for HttpTransport {
	async fn request(&self, request: &RpcRequest) -> Result<Value, NodeError> {
		let id = self.next_id();
		tracing::debug!(method = %request.method, id, "Sending node request");

		let response: Response = self.post(&envelope(request, id)).await?;
		into_result(response)
	}

	async fn batch(
		&self,
		requests: &[RpcRequest],
	) -> Result<Vec<Result<Value, NodeError>>, NodeError> {
		if requests.is_empty() {
			return Ok(Vec::new());
		}

		let ids: Vec<u64> = requests.iter().map(|_| self.next_id()).collect();
		let bodies: Vec<Request<Vec<Value>>> = requests
			.iter()
			.zip(&ids)
			.map(|(request, &id)| envelope(request, id))
			.collect();
		tracing::debug!(size = bodies.len(), "Sending node batch");

		let responses: Vec<Response> = self.post(&bodies).await?;
		let mut by_id: HashMap<u64, Response> = responses
			.into_iter()
			.filter_map(|response| match response.id {
				Id::Number(id) => Some((id, response)),
				_ => None,
			})
			.collect();

		Ok(ids
			.iter()
			.map(|id| {
				by_id
					.remove(id)
					.ok_or_else(|| NodeError::Decode(format!("Missing response for request {}", id)))
					.and_then(into_result)
			})
			.collect())
	}
}
