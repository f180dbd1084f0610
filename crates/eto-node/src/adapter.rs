//! Typed operations on top of a JSON-RPC transport.
//!
//! Every read goes through the retry wrapper, batched or not: a batched call
//! that fails is queued again into a later batch. Signing typed data and
//! `eth_sendTransaction` are sent once: repeating them would prompt the user
//! again or submit twice.

use crate::batch::BatchingTransport;
use crate::retry::{with_retry, RetryPolicy};
use crate::{EthNodeError, NodeError, RpcRequest, RpcTransport};
use alloy::primitives::{Address, Bytes, B256, U256, U64};
use eto_types::{Transaction, TransactionReceipt, TxData, TxOutcome};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pause between two `eth_blockNumber` polls.
pub const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Typed access to an Ethereum node.
pub struct NodeAdapter {
	transport: Arc<dyn RpcTransport>,
	batching: Option<BatchingTransport>,
	policy: RetryPolicy,
	block_poll_interval: Duration,
}

impl NodeAdapter {
	/// Creates an adapter without batching and with the default retry policy.
	pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
		Self {
			transport,
			batching: None,
			policy: RetryPolicy::default(),
			block_poll_interval: BLOCK_POLL_INTERVAL,
		}
	}

	/// Replaces the retry policy.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// Coalesces calls to `methods` made in the same scheduler tick.
	pub fn with_batching(mut self, methods: impl IntoIterator<Item = String>) -> Self {
		self.batching = Some(BatchingTransport::with_methods(
			Arc::clone(&self.transport),
			methods,
		));
		self
	}

	pub fn with_block_poll_interval(mut self, interval: Duration) -> Self {
		self.block_poll_interval = interval;
		self
	}

	async fn call<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<T, NodeError> {
		let request = RpcRequest::new(method, params);
		let value = match &self.batching {
			Some(batching) if batching.is_batched(method) => {
				with_retry(&self.policy, method, || batching.request(&request)).await?
			},
			_ => with_retry(&self.policy, method, || self.transport.request(&request)).await?,
		};
		decode(method, value)
	}

	async fn call_once<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<T, NodeError> {
		let value = self
			.transport
			.request(&RpcRequest::new(method, params))
			.await?;
		decode(method, value)
	}

	/// Network id reported by `net_version`.
	pub async fn get_network_id(&self) -> Result<u64, NodeError> {
		let value: Value = self.call("net_version", vec![]).await?;
		match &value {
			Value::String(s) => s
				.parse()
				.map_err(|_| NodeError::Decode(format!("Invalid network id '{}'", s))),
			Value::Number(n) => n
				.as_u64()
				.ok_or_else(|| NodeError::Decode(format!("Invalid network id {}", n))),
			other => Err(NodeError::Decode(format!("Invalid network id {}", other))),
		}
	}

	pub async fn get_balance(&self, address: Address) -> Result<U256, NodeError> {
		self.call("eth_getBalance", vec![param(&address)?, json!("latest")])
			.await
	}

	/// Gas the node expects `tx` to use. The draft's gas limit and nonce
	/// are not sent.
	pub async fn estimate_gas(&self, tx: &TxData) -> Result<u64, NodeError> {
		let mut params = param(tx)?;
		if let Value::Object(map) = &mut params {
			map.remove("gas");
			map.remove("nonce");
		}
		let gas: U64 = self.call("eth_estimateGas", vec![params]).await?;
		Ok(gas.to::<u64>())
	}

	pub async fn get_gas_price(&self) -> Result<U256, NodeError> {
		self.call("eth_gasPrice", vec![]).await
	}

	/// First account managed by the node.
	pub async fn get_account_address(&self) -> Result<Address, NodeError> {
		let accounts: Vec<Address> = self.call("eth_accounts", vec![]).await?;
		accounts.into_iter().next().ok_or(NodeError::NoAccounts)
	}

	/// First account managed by the node, in EIP-55 mixed case.
	pub async fn get_account_address_with_checksum(&self) -> Result<String, NodeError> {
		Ok(self.get_account_address().await?.to_checksum(None))
	}

	/// Signs `data` with a node-managed account.
	pub async fn eth_sign(&self, address: Address, data: &Bytes) -> Result<Bytes, NodeError> {
		self.call("eth_sign", vec![param(&address)?, param(data)?])
			.await
	}

	/// Signs legacy typed data with a node-managed account. Never retried.
	pub async fn sign_typed_data(&self, address: Address, data: Value) -> Result<Bytes, NodeError> {
		self.call_once("eth_signTypedData", vec![data, param(&address)?])
			.await
	}

	pub async fn get_transaction_by_hash(
		&self,
		hash: B256,
	) -> Result<Option<Transaction>, NodeError> {
		self.call("eth_getTransactionByHash", vec![param(&hash)?])
			.await
	}

	pub async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, NodeError> {
		self.call("eth_getTransactionReceipt", vec![param(&hash)?])
			.await
	}

	/// Next nonce of `address`, pending transactions included.
	pub async fn get_transaction_count(&self, address: Address) -> Result<u64, NodeError> {
		let count: U64 = self
			.call(
				"eth_getTransactionCount",
				vec![param(&address)?, json!("pending")],
			)
			.await?;
		Ok(count.to::<u64>())
	}

	/// Submits a signed transaction.
	pub async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, NodeError> {
		self.call("eth_sendRawTransaction", vec![param(raw)?])
			.await
			.map_err(classify_submission_error)
	}

	/// Submits a draft for a node-managed account to sign.
	///
	/// A draft without nonce gets one from exactly one
	/// `eth_getTransactionCount` call. Never retried.
	pub async fn send_transaction(&self, mut tx: TxData) -> Result<B256, NodeError> {
		if tx.nonce.is_none() {
			tx.nonce = Some(U64::from(self.get_transaction_count(tx.from).await?));
		}
		self.call_once("eth_sendTransaction", vec![param(&tx)?])
			.await
			.map_err(classify_submission_error)
	}

	pub async fn get_block_number(&self) -> Result<u64, NodeError> {
		let block: U64 = self.call("eth_blockNumber", vec![]).await?;
		Ok(block.to::<u64>())
	}

	/// Returns the mined transaction, `None` while it is pending, or an
	/// error if it was mined and reverted.
	pub async fn get_transaction_or_throw(
		&self,
		hash: B256,
	) -> Result<Option<Transaction>, NodeError> {
		// Both lookups may be answered by different nodes behind a balancer.
		let tx = self.get_transaction_by_hash(hash).await?;
		let receipt = self.get_transaction_receipt(hash).await?;

		match TxOutcome::classify(tx.as_ref(), receipt.as_ref()) {
			TxOutcome::Pending => Ok(None),
			TxOutcome::MinedSuccess => Ok(tx),
			TxOutcome::MinedRevertedOutOfGas => Err(NodeError::OutOfGas),
			TxOutcome::MinedRevertedOther => Err(NodeError::RevertedTransaction),
		}
	}

	/// Calls `on_new_block` once for every newly observed block number until
	/// it returns `true`, it fails, or `cancel` fires.
	pub async fn watch_new_block<F, Fut>(
		&self,
		cancel: &CancellationToken,
		mut on_new_block: F,
	) -> Result<(), NodeError>
	where
		F: FnMut(u64) -> Fut,
		Fut: Future<Output = Result<bool, NodeError>>,
	{
		let mut watcher = BlockWatcher::new(self);
		loop {
			let block = watcher.next(cancel).await?;
			if on_new_block(block).await? {
				return Ok(());
			}
		}
	}

	/// Waits until `hash` is mined, calling `on_new_block` on every new block
	/// before looking the transaction up.
	pub async fn wait_for_tx<F, Fut>(
		&self,
		hash: B256,
		cancel: &CancellationToken,
		mut on_new_block: F,
	) -> Result<Transaction, NodeError>
	where
		F: FnMut(u64) -> Fut,
		Fut: Future<Output = ()>,
	{
		let mut watcher = BlockWatcher::new(self);
		loop {
			let block = watcher.next(cancel).await?;
			on_new_block(block).await;
			if let Some(tx) = self.get_transaction_or_throw(hash).await? {
				tracing::info!(tx_hash = %hash, block, "Transaction mined");
				return Ok(tx);
			}
		}
	}
}

/// Polls the block number and yields each change once.
struct BlockWatcher<'a> {
	adapter: &'a NodeAdapter,
	last: Option<u64>,
	polled: bool,
}

impl<'a> BlockWatcher<'a> {
	fn new(adapter: &'a NodeAdapter) -> Self {
		Self {
			adapter,
			last: None,
			polled: false,
		}
	}

	async fn next(&mut self, cancel: &CancellationToken) -> Result<u64, NodeError> {
		loop {
			if self.polled {
				tokio::select! {
					_ = cancel.cancelled() => return Err(NodeError::Cancelled),
					_ = tokio::time::sleep(self.adapter.block_poll_interval) => {},
				}
			}
			self.polled = true;

			let current = tokio::select! {
				_ = cancel.cancelled() => return Err(NodeError::Cancelled),
				block = self.adapter.get_block_number() => block?,
			};
			if self.last != Some(current) {
				self.last = Some(current);
				return Ok(current);
			}
		}
	}
}

fn param<T: Serialize + ?Sized>(value: &T) -> Result<Value, NodeError> {
	serde_json::to_value(value).map_err(|e| NodeError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, NodeError> {
	serde_json::from_value(value)
		.map_err(|e| NodeError::Decode(format!("Invalid {} response: {}", method, e)))
}

fn classify_submission_error(error: NodeError) -> NodeError {
	match error {
		NodeError::Rpc { message, .. } => NodeError::EthNode(EthNodeError::from_message(&message)),
		other => other,
	}
}
