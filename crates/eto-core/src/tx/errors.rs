//! Errors a transaction flow can end with.

use crate::state::StateError;
use alloy::primitives::B256;
use eto_account::WalletError;
use eto_node::{EthNodeError, NodeError};
use eto_types::ErrorMessage;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
	#[error(transparent)]
	Node(NodeError),
	#[error(transparent)]
	Wallet(WalletError),
	#[error("Not enough ether to pay for gas")]
	NotEnoughEtherForGas,
	#[error("Not enough funds")]
	NotEnoughFunds,
	#[error("Flow cancelled")]
	Cancelled,
	#[error("Transaction {tx_hash} was not mined in time")]
	TimedOut { tx_hash: B256 },
	#[error("Invalid draft: {0}")]
	InvalidDraft(String),
	#[error(transparent)]
	State(#[from] StateError),
}

impl From<NodeError> for FlowError {
	fn from(error: NodeError) -> Self {
		match error {
			NodeError::Cancelled => FlowError::Cancelled,
			other => FlowError::Node(other),
		}
	}
}

impl From<WalletError> for FlowError {
	fn from(error: WalletError) -> Self {
		FlowError::Wallet(error)
	}
}

impl FlowError {
	/// The message category shown to the user.
	pub fn category(&self) -> ErrorMessage {
		match self {
			FlowError::Node(NodeError::OutOfGas) => ErrorMessage::OutOfGas,
			FlowError::Node(NodeError::RevertedTransaction) => ErrorMessage::RevertedTransaction,
			FlowError::Node(NodeError::NotResponding { .. }) => ErrorMessage::NodeNotResponding,
			FlowError::Node(NodeError::EthNode(error)) => match error {
				EthNodeError::LowGas => ErrorMessage::GasTooLow,
				EthNodeError::LowNonce => ErrorMessage::NonceTooLow,
				EthNodeError::LongTransactionQueue => ErrorMessage::TooManyTxInQueue,
				EthNodeError::InvalidRlpData => ErrorMessage::InvalidRlpData,
				EthNodeError::InvalidChainId => ErrorMessage::InvalidChainId,
				EthNodeError::Unknown(_) => ErrorMessage::Generic,
			},
			FlowError::Wallet(WalletError::SignerRejectConfirmation) => ErrorMessage::SignerRejected,
			FlowError::Wallet(WalletError::SignerTimeout) => ErrorMessage::SignerTimeout,
			FlowError::Wallet(WalletError::MessageSignCancelled) => {
				ErrorMessage::MessageSignCancelled
			},
			FlowError::NotEnoughEtherForGas => ErrorMessage::NotEnoughEtherForGas,
			FlowError::NotEnoughFunds => ErrorMessage::NotEnoughFunds,
			FlowError::TimedOut { .. } => ErrorMessage::TimedOut,
			_ => ErrorMessage::Generic,
		}
	}

	/// Errors caused by the user walking away rather than by a failure.
	pub fn is_cancellation(&self) -> bool {
		matches!(
			self,
			FlowError::Cancelled | FlowError::Wallet(WalletError::MessageSignCancelled)
		)
	}
}
