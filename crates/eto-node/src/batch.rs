//! Coalescing of read-only node calls.
//!
//! Calls to batched methods are queued instead of sent. The call that opens
//! an empty queue yields once to the scheduler before draining it, so every
//! call issued meanwhile by the same task (for example the branches of a
//! `join!`) joins the same JSON-RPC array. Calls from other tasks join only
//! if they enqueue before that yield returns, which on a multi-thread runtime
//! depends on scheduling. The array is sent once; retries belong to the
//! caller of each request. Each caller receives its own result, or a copy of
//! the error if the batch failed.

use crate::{NodeError, RpcRequest, RpcTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{error, info};

/// Methods coalesced when no explicit list is configured.
pub const DEFAULT_BATCHED_METHODS: &[&str] = &[
	"eth_getBalance",
	"eth_getCode",
	"eth_estimateGas",
	"eth_call",
	"net_version",
	"eth_accounts",
];

type Responder = oneshot::Sender<Result<Value, NodeError>>;
type Pending = Arc<Mutex<Option<PendingBatch>>>;

#[derive(Default)]
struct PendingBatch {
	requests: Vec<RpcRequest>,
	responders: Vec<Responder>,
}

/// Transport that batches a fixed set of methods and passes others through.
pub struct BatchingTransport {
	inner: Arc<dyn RpcTransport>,
	methods: HashSet<String>,
	pending: Pending,
}

impl BatchingTransport {
	pub fn new(inner: Arc<dyn RpcTransport>) -> Self {
		Self::with_methods(inner, DEFAULT_BATCHED_METHODS.iter().map(|m| m.to_string()))
	}

	pub fn with_methods(
		inner: Arc<dyn RpcTransport>,
		methods: impl IntoIterator<Item = String>,
	) -> Self {
		Self {
			inner,
			methods: methods.into_iter().collect(),
			pending: Arc::new(Mutex::new(None)),
		}
	}

	/// Whether calls to `method` are coalesced.
	pub fn is_batched(&self, method: &str) -> bool {
		self.methods.contains(method)
	}

	/// Queues `request`. Returns whether it opened a new batch.
	fn enqueue(&self, request: RpcRequest) -> (oneshot::Receiver<Result<Value, NodeError>>, bool) {
		let (tx, rx) = oneshot::channel();
		let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());

		match pending.as_mut() {
			Some(batch) => {
				batch.requests.push(request);
				batch.responders.push(tx);
				(rx, false)
			},
			None => {
				*pending = Some(PendingBatch {
					requests: vec![request],
					responders: vec![tx],
				});
				(rx, true)
			},
		}
	}
}

/// Drains the pending batch when dropped, so a caller that opened a batch
/// and then went away still gets it sent.
struct FlushGuard {
	inner: Arc<dyn RpcTransport>,
	pending: Pending,
}

impl Drop for FlushGuard {
	fn drop(&mut self) {
		let Some(batch) = self.pending.lock().unwrap_or_else(|e| e.into_inner()).take() else {
			return;
		};
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(send(Arc::clone(&self.inner), batch));
			},
			// Dropping the responders fails every waiting caller.
			Err(_) => error!(batch_size = batch.requests.len(), "Node batch dropped outside a runtime"),
		}
	}
}

async fn send(inner: Arc<dyn RpcTransport>, batch: PendingBatch) {
	let size = batch.requests.len();
	info!(batch_size = size, "Number of node rpc requests batched");

	match inner.batch(&batch.requests).await {
		Ok(results) => {
			let mut results = results.into_iter();
			for responder in batch.responders {
				let result = results.next().unwrap_or_else(|| {
					Err(NodeError::Decode(format!(
						"Batch of {} returned too few results",
						size
					)))
				});
				// The caller may have gone away.
				let _ = responder.send(result);
			}
		},
		Err(e) => {
			error!(batch_size = size, error = %e, "Node batch failed");
			for responder in batch.responders {
				let _ = responder.send(Err(e.clone()));
			}
		},
	}
}

#[async_trait]
impl RpcTransport for BatchingTransport {
	async fn request(&self, request: &RpcRequest) -> Result<Value, NodeError> {
		if !self.is_batched(&request.method) {
			return self.inner.request(request).await;
		}

		let (rx, opened) = self.enqueue(request.clone());
		if opened {
			let guard = FlushGuard {
				inner: Arc::clone(&self.inner),
				pending: Arc::clone(&self.pending),
			};
			tokio::task::yield_now().await;
			drop(guard);
		}

		rx.await
			.map_err(|_| NodeError::Transport("Batch dropped before completion".into()))?
	}

	async fn batch(
		&self,
		requests: &[RpcRequest],
	) -> Result<Vec<Result<Value, NodeError>>, NodeError> {
		self.inner.batch(requests).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::mock::MockTransport;
	use serde_json::json;

	fn balance_request(n: u8) -> RpcRequest {
		RpcRequest::new(
			"eth_getBalance",
			vec![json!(format!("0x{:040x}", n)), json!("latest")],
		)
	}

	fn three_balances() -> Arc<MockTransport> {
		let mock = Arc::new(MockTransport::new());
		mock.push("eth_getBalance", Ok(json!("0x1")))
			.push("eth_getBalance", Ok(json!("0x2")))
			.push("eth_getBalance", Ok(json!("0x3")));
		mock
	}

	#[tokio::test]
	async fn test_calls_in_same_tick_share_one_batch() {
		let mock = three_balances();
		let batching = BatchingTransport::new(mock.clone());
		let (first, second, third) = (balance_request(1), balance_request(2), balance_request(3));

		let (a, b, c) = tokio::join!(
			batching.request(&first),
			batching.request(&second),
			batching.request(&third),
		);

		assert_eq!(
			(a.unwrap(), b.unwrap(), c.unwrap()),
			(json!("0x1"), json!("0x2"), json!("0x3"))
		);
		assert_eq!(mock.batches().len(), 1);
		assert_eq!(mock.batches()[0].len(), 3);
		// Call order is preserved inside the batch.
		let sent: Vec<_> = mock.calls().into_iter().map(|c| c.params[0].clone()).collect();
		assert_eq!(
			sent,
			vec![
				first.params[0].clone(),
				second.params[0].clone(),
				third.params[0].clone(),
			]
		);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_joined_calls_share_one_batch_on_worker_pool() {
		let mock = three_balances();
		let batching = BatchingTransport::new(mock.clone());
		let (first, second, third) = (balance_request(1), balance_request(2), balance_request(3));

		let (a, b, c) = tokio::join!(
			batching.request(&first),
			batching.request(&second),
			batching.request(&third),
		);

		assert!(a.is_ok() && b.is_ok() && c.is_ok());
		assert_eq!(mock.batches(), vec![vec!["eth_getBalance".to_string(); 3]]);
	}

	#[tokio::test]
	async fn test_per_call_errors_stay_with_their_caller() {
		let mock = Arc::new(MockTransport::new());
		mock.push("eth_call", Ok(json!("0x")))
			.push(
				"eth_call",
				Err(NodeError::Rpc {
					code: 3,
					message: "execution reverted".into(),
				}),
			);
		let batching = BatchingTransport::new(mock.clone());
		let call = RpcRequest::new("eth_call", vec![json!({}), json!("latest")]);

		let (ok, failed) = tokio::join!(batching.request(&call), batching.request(&call));

		assert_eq!(ok, Ok(json!("0x")));
		assert!(matches!(failed, Err(NodeError::Rpc { code: 3, .. })));
	}

	#[tokio::test]
	async fn test_failed_batch_reaches_every_caller_once() {
		let mock = Arc::new(MockTransport::new());
		mock.fail_next_batch(NodeError::Transport("connection reset".into()));
		mock.respond("net_version", Ok(json!("17")));
		let batching = BatchingTransport::new(mock.clone());
		let request = RpcRequest::new("net_version", vec![]);

		let (a, b) = tokio::join!(batching.request(&request), batching.request(&request));

		let expected = Err(NodeError::Transport("connection reset".into()));
		assert_eq!(a, expected);
		assert_eq!(b, expected);
		assert!(mock.batches().is_empty());

		// The failure is not replayed: the next call goes out normally.
		assert_eq!(batching.request(&request).await, Ok(json!("17")));
	}

	#[tokio::test]
	async fn test_unbatched_methods_pass_through() {
		let mock = Arc::new(MockTransport::new());
		mock.respond("eth_blockNumber", Ok(json!("0x10")));
		let batching = BatchingTransport::new(mock.clone());

		let block = batching
			.request(&RpcRequest::new("eth_blockNumber", vec![]))
			.await;

		assert_eq!(block, Ok(json!("0x10")));
		assert!(mock.batches().is_empty());
		assert_eq!(mock.calls_to("eth_blockNumber"), 1);
	}

	#[tokio::test]
	async fn test_next_tick_starts_new_batch() {
		let mock = Arc::new(MockTransport::new());
		mock.respond("eth_getCode", Ok(json!("0x")));
		let batching = BatchingTransport::new(mock.clone());
		let request = RpcRequest::new("eth_getCode", vec![json!("0x00"), json!("latest")]);

		batching.request(&request).await.unwrap();
		batching.request(&request).await.unwrap();

		assert_eq!(mock.batches().len(), 2);
	}
}
