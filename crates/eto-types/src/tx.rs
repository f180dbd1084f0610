//! Transaction drafts and the node's view of transactions.
//!
//! Field names follow the JSON-RPC wire format (camelCase, hex quantities) so
//! these structs can be passed to and read from the node without conversion.

use alloy::primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Receipt status reported for a successful transaction.
pub const RECEIPT_STATUS_SUCCESS: u64 = 1;
/// Receipt status reported for a reverted transaction.
pub const RECEIPT_STATUS_REVERTED: u64 = 0;

/// A transaction draft as produced by a flow and submitted to the node.
///
/// The nonce is left empty by flows and filled immediately before
/// submission. Once submitted a draft is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxData {
	pub from: Address,
	pub to: Address,
	pub value: U256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Bytes>,
	pub gas: U64,
	pub gas_price: U256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<U64>,
}

impl TxData {
	/// Upper bound of wei this transaction can spend on gas.
	pub fn max_gas_cost(&self) -> U256 {
		self.gas_price.saturating_mul(U256::from(self.gas.to::<u64>()))
	}

	/// Total wei required to send this transaction, value included.
	pub fn total_cost(&self) -> U256 {
		self.max_gas_cost().saturating_add(self.value)
	}
}

/// A transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	pub hash: B256,
	pub from: Address,
	#[serde(default)]
	pub to: Option<Address>,
	pub value: U256,
	pub gas: U64,
	#[serde(default)]
	pub gas_price: Option<U256>,
	pub nonce: U64,
	#[serde(default)]
	pub block_number: Option<U64>,
	#[serde(default)]
	pub input: Bytes,
}

impl Transaction {
	pub fn is_pending(&self) -> bool {
		self.block_number.is_none()
	}
}

/// A receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub transaction_hash: B256,
	#[serde(default)]
	pub block_number: Option<U64>,
	pub gas_used: U64,
	#[serde(default)]
	pub status: Option<U64>,
}

impl TransactionReceipt {
	pub fn is_reverted(&self) -> bool {
		self.status == Some(U64::from(RECEIPT_STATUS_REVERTED))
	}
}

/// Outcome of joining a transaction with its receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
	/// Not yet mined, or the receipt is not yet available.
	Pending,
	/// Mined with status `0x1`.
	MinedSuccess,
	/// Mined with status `0x0` and all supplied gas consumed.
	MinedRevertedOutOfGas,
	/// Mined with status `0x0` for any other reason.
	MinedRevertedOther,
}

impl TxOutcome {
	/// Classifies a transaction by block number presence and receipt status.
	pub fn classify(tx: Option<&Transaction>, receipt: Option<&TransactionReceipt>) -> Self {
		let (Some(tx), Some(receipt)) = (tx, receipt) else {
			return TxOutcome::Pending;
		};
		if tx.block_number.is_none() || receipt.block_number.is_none() {
			return TxOutcome::Pending;
		}
		if receipt.is_reverted() {
			if receipt.gas_used == tx.gas {
				TxOutcome::MinedRevertedOutOfGas
			} else {
				TxOutcome::MinedRevertedOther
			}
		} else {
			TxOutcome::MinedSuccess
		}
	}
}

/// The kinds of transaction flows the platform runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxSenderType {
	UnlockFunds,
	Withdraw,
	Invest,
	Upgrade,
	EtoSetDate,
	SignInvestmentAgreement,
	UserClaim,
	InvestorAcceptPayout,
	InvestorRedistributePayout,
	NeurRedeem,
}

impl TxSenderType {
	pub fn as_str(&self) -> &'static str {
		match self {
			TxSenderType::UnlockFunds => "UNLOCK_FUNDS",
			TxSenderType::Withdraw => "WITHDRAW",
			TxSenderType::Invest => "INVEST",
			TxSenderType::Upgrade => "UPGRADE",
			TxSenderType::EtoSetDate => "ETO_SET_DATE",
			TxSenderType::SignInvestmentAgreement => "SIGN_INVESTMENT_AGREEMENT",
			TxSenderType::UserClaim => "USER_CLAIM",
			TxSenderType::InvestorAcceptPayout => "INVESTOR_ACCEPT_PAYOUT",
			TxSenderType::InvestorRedistributePayout => "INVESTOR_REDISTRIBUTE_PAYOUT",
			TxSenderType::NeurRedeem => "NEUR_REDEEM",
		}
	}
}

impl fmt::Display for TxSenderType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Token families handled by the upgrade flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
	Ether,
	Euro,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn mined_tx(gas: u64) -> Transaction {
		serde_json::from_value(json!({
			"hash": B256::repeat_byte(1),
			"from": Address::repeat_byte(2),
			"to": Address::repeat_byte(3),
			"value": "0x0",
			"gas": format!("{:#x}", gas),
			"nonce": "0x1",
			"blockNumber": "0x10"
		}))
		.unwrap()
	}

	fn receipt(status: &str, gas_used: u64) -> TransactionReceipt {
		serde_json::from_value(json!({
			"transactionHash": B256::repeat_byte(1),
			"blockNumber": "0x10",
			"gasUsed": format!("{:#x}", gas_used),
			"status": status
		}))
		.unwrap()
	}

	#[test]
	fn test_outcome_table() {
		let tx = mined_tx(21000);
		let mut pending = tx.clone();
		pending.block_number = None;

		assert_eq!(TxOutcome::classify(None, None), TxOutcome::Pending);
		assert_eq!(
			TxOutcome::classify(Some(&pending), Some(&receipt("0x1", 21000))),
			TxOutcome::Pending
		);
		assert_eq!(TxOutcome::classify(Some(&tx), None), TxOutcome::Pending);
		assert_eq!(
			TxOutcome::classify(Some(&tx), Some(&receipt("0x1", 20000))),
			TxOutcome::MinedSuccess
		);
		assert_eq!(
			TxOutcome::classify(Some(&tx), Some(&receipt("0x0", 21000))),
			TxOutcome::MinedRevertedOutOfGas
		);
		assert_eq!(
			TxOutcome::classify(Some(&tx), Some(&receipt("0x0", 20000))),
			TxOutcome::MinedRevertedOther
		);
	}

	#[test]
	fn test_draft_serializes_as_rpc_object() {
		let draft = TxData {
			from: Address::repeat_byte(1),
			to: Address::repeat_byte(2),
			value: U256::from(10),
			data: None,
			gas: U64::from(21000),
			gas_price: U256::from(1_000_000_000u64),
			nonce: None,
		};
		let value = serde_json::to_value(&draft).unwrap();
		assert_eq!(value["gas"], "0x5208");
		assert_eq!(value["gasPrice"], "0x3b9aca00");
		assert!(value.get("nonce").is_none());
		assert!(value.get("data").is_none());
		assert_eq!(draft.total_cost(), U256::from(21_000_000_000_010u64));
	}
}
