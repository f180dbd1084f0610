//! Scripted in-memory transport.
//!
//! Answers are queued per method and consumed in order; once a method's queue
//! is empty its default answer is returned. Every call and batch is recorded
//! so tests can assert on what reached the node.

use crate::{NodeError, RpcRequest, RpcTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// JSON-RPC error code for an unknown method.
const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Default)]
struct Script {
	queued: HashMap<String, VecDeque<Result<Value, NodeError>>>,
	defaults: HashMap<String, Result<Value, NodeError>>,
	batch_failures: VecDeque<NodeError>,
	calls: Vec<RpcRequest>,
	batches: Vec<Vec<String>>,
}

impl Script {
	fn answer(&mut self, request: &RpcRequest) -> Result<Value, NodeError> {
		self.calls.push(request.clone());
		if let Some(answer) = self
			.queued
			.get_mut(&request.method)
			.and_then(VecDeque::pop_front)
		{
			return answer;
		}
		self.defaults
			.get(&request.method)
			.cloned()
			.unwrap_or_else(|| {
				Err(NodeError::Rpc {
					code: METHOD_NOT_FOUND,
					message: format!("the method {} does not exist", request.method),
				})
			})
	}
}

/// Transport returning scripted answers.
#[derive(Default)]
pub struct MockTransport {
	script: Mutex<Script>,
}

impl MockTransport {
	pub fn new() -> Self {
		Self::default()
	}

	fn script(&self) -> std::sync::MutexGuard<'_, Script> {
		self.script.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Queues one answer for `method`.
	pub fn push(&self, method: &str, answer: Result<Value, NodeError>) -> &Self {
		self.script()
			.queued
			.entry(method.to_string())
			.or_default()
			.push_back(answer);
		self
	}

	/// Sets the answer returned once the queue of `method` is drained.
	pub fn respond(&self, method: &str, answer: Result<Value, NodeError>) -> &Self {
		self.script().defaults.insert(method.to_string(), answer);
		self
	}

	/// Makes the next batch fail as a whole.
	pub fn fail_next_batch(&self, error: NodeError) -> &Self {
		self.script().batch_failures.push_back(error);
		self
	}

	/// All calls that reached the transport, batched ones included.
	pub fn calls(&self) -> Vec<RpcRequest> {
		self.script().calls.clone()
	}

	/// Number of calls to `method`.
	pub fn calls_to(&self, method: &str) -> usize {
		self.script()
			.calls
			.iter()
			.filter(|call| call.method == method)
			.count()
	}

	/// Method names of every batch that was answered, in arrival order.
	pub fn batches(&self) -> Vec<Vec<String>> {
		self.script().batches.clone()
	}
}

#[async_trait]
impl RpcTransport for MockTransport {
	async fn request(&self, request: &RpcRequest) -> Result<Value, NodeError> {
		self.script().answer(request)
	}

	async fn batch(
		&self,
		requests: &[RpcRequest],
	) -> Result<Vec<Result<Value, NodeError>>, NodeError> {
		let mut script = self.script();
		if let Some(error) = script.batch_failures.pop_front() {
			return Err(error);
		}
		script
			.batches
			.push(requests.iter().map(|r| r.method.clone()).collect());
		Ok(requests.iter().map(|r| script.answer(r)).collect())
	}
}
