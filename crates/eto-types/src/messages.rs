//! User-facing error categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The message category shown to the user when a flow fails.
///
/// Every error raised inside a flow maps to exactly one category. Anything
/// without a dedicated category is reported as [`ErrorMessage::Generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorMessage {
	Generic,
	OutOfGas,
	RevertedTransaction,
	NotEnoughEtherForGas,
	NotEnoughFunds,
	GasTooLow,
	NonceTooLow,
	TooManyTxInQueue,
	InvalidRlpData,
	InvalidChainId,
	NodeNotResponding,
	SignerRejected,
	SignerTimeout,
	MessageSignCancelled,
	TimedOut,
}

impl ErrorMessage {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorMessage::Generic => "Something went wrong, please try again",
			ErrorMessage::OutOfGas => "Transaction ran out of gas",
			ErrorMessage::RevertedTransaction => "Transaction was reverted",
			ErrorMessage::NotEnoughEtherForGas => "Not enough ether to pay for gas",
			ErrorMessage::NotEnoughFunds => "Not enough funds for this transaction",
			ErrorMessage::GasTooLow => "Gas limit is too low",
			ErrorMessage::NonceTooLow => "Nonce is too low",
			ErrorMessage::TooManyTxInQueue => "Too many transactions are waiting in the queue",
			ErrorMessage::InvalidRlpData => "Transaction data is malformed",
			ErrorMessage::InvalidChainId => "Transaction was signed for another network",
			ErrorMessage::NodeNotResponding => "Ethereum node is not responding",
			ErrorMessage::SignerRejected => "Transaction was rejected by the signer",
			ErrorMessage::SignerTimeout => "Signer did not respond in time",
			ErrorMessage::MessageSignCancelled => "Message signing was cancelled",
			ErrorMessage::TimedOut => "Transaction was not mined in time",
		}
	}
}

impl fmt::Display for ErrorMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
