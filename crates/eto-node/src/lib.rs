//! Ethereum node access for the ETO platform.
//!
//! This module wraps a JSON-RPC node behind three layers: a transport that
//! speaks JSON-RPC 2.0, a batching layer that coalesces read-only calls made
//! in the same scheduler tick into one request, and the [`NodeAdapter`] that
//! exposes typed operations with bounded retries, transaction outcome
//! classification and block watching.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod adapter;
pub mod batch;
pub mod retry;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod mock;
}

pub use adapter::NodeAdapter;
pub use batch::BatchingTransport;
pub use retry::{is_retriable, with_retry, RetryPolicy};

/// JSON-RPC error code for an internal node error.
pub const RPC_INTERNAL_ERROR: i64 = -32603;
/// JSON-RPC error code used by nodes for rate limiting.
pub const RPC_LIMIT_EXCEEDED: i64 = -32005;

/// Node-side rejection reasons of a submitted transaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EthNodeError {
	#[error("Gas limit too low")]
	LowGas,
	#[error("Nonce too low")]
	LowNonce,
	#[error("Too many transactions in the queue")]
	LongTransactionQueue,
	#[error("Invalid RLP data")]
	InvalidRlpData,
	#[error("Invalid chain id")]
	InvalidChainId,
	#[error("Unknown node error: {0}")]
	Unknown(String),
}

impl EthNodeError {
	/// Classifies the message of a rejected submission.
	pub fn from_message(message: &str) -> Self {
		let lower = message.to_lowercase();
		if lower.contains("intrinsic gas too low") || lower.contains("gas too low") {
			EthNodeError::LowGas
		} else if lower.contains("nonce too low")
			|| lower.contains("replacement transaction underpriced")
		{
			EthNodeError::LowNonce
		} else if lower.contains("too many transactions in the queue")
			|| lower.contains("txpool is full")
		{
			EthNodeError::LongTransactionQueue
		} else if lower.contains("rlp") {
			EthNodeError::InvalidRlpData
		} else if lower.contains("invalid chain id") {
			EthNodeError::InvalidChainId
		} else {
			EthNodeError::Unknown(message.to_string())
		}
	}
}

/// Errors that can occur while talking to the node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeError {
	/// The request did not reach the node or the response was lost.
	#[error("Transport error: {0}")]
	Transport(String),
	/// The node answered with a JSON-RPC error object.
	#[error("RPC error {code}: {message}")]
	Rpc { code: i64, message: String },
	/// The node answered with something we could not decode.
	#[error("Decode error: {0}")]
	Decode(String),
	/// Every retry attempt failed.
	#[error("Node not responding after {attempts} attempts")]
	NotResponding { attempts: u32 },
	/// The node manages no accounts.
	#[error("No accounts available")]
	NoAccounts,
	/// The transaction was mined but consumed all supplied gas.
	#[error("Transaction ran out of gas")]
	OutOfGas,
	/// The transaction was mined but reverted.
	#[error("Transaction reverted")]
	RevertedTransaction,
	/// The node rejected a submitted transaction.
	#[error("Node rejected transaction: {0}")]
	EthNode(EthNodeError),
	/// The caller cancelled the operation.
	#[error("Cancelled")]
	Cancelled,
}

/// A single JSON-RPC call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
	pub method: String,
	pub params: Vec<Value>,
}

impl RpcRequest {
	pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
		Self {
			method: method.into(),
			params,
		}
	}
}

/// Trait defining the interface for JSON-RPC transports.
#[async_trait]
pub trait RpcTransport: Send + Sync {
	/// Sends one request and returns its `result`.
	async fn request(&self, request: &RpcRequest) -> Result<Value, NodeError>;

	/// Sends all requests as one JSON-RPC array.
	///
	/// The outer error means the batch as a whole failed. Otherwise one
	/// result is returned per request, in request order.
	async fn batch(&self, requests: &[RpcRequest]) -> Result<Vec<Result<Value, NodeError>>, NodeError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_node_error_classification() {
		let cases = [
			("intrinsic gas too low", EthNodeError::LowGas),
			("Nonce too low", EthNodeError::LowNonce),
			(
				"replacement transaction underpriced",
				EthNodeError::LowNonce,
			),
			(
				"There are too many transactions in the queue",
				EthNodeError::LongTransactionQueue,
			),
			("rlp: expected input list", EthNodeError::InvalidRlpData),
			("invalid chain id for signer", EthNodeError::InvalidChainId),
		];
		for (message, expected) in cases {
			assert_eq!(EthNodeError::from_message(message), expected, "{}", message);
		}
		assert_eq!(
			EthNodeError::from_message("insufficient funds"),
			EthNodeError::Unknown("insufficient funds".into())
		);
	}
}
