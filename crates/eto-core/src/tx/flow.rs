//! The contract between the sender and a concrete flow.

use super::FlowError;
use alloy::primitives::{Address, Bytes, U256, U64};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use eto_node::NodeAdapter;
use eto_types::{DataEvent, TxData, TxSenderType};

/// Extra gas on top of the node's estimate, in percent.
pub const GAS_OVERHEAD_PERCENT: u64 = 20;

/// What a flow may use while building and checking its draft.
pub struct FlowContext<'a> {
	pub node: &'a NodeAdapter,
	/// The personal wallet sending the transaction.
	pub from: Address,
}

impl<'a> FlowContext<'a> {
	pub fn new(node: &'a NodeAdapter, from: Address) -> Self {
		Self { node, from }
	}

	/// Builds a draft priced at the current gas price with an estimated gas
	/// limit. The nonce is left empty.
	pub async fn draft(
		&self,
		to: Address,
		value: U256,
		data: Option<Bytes>,
	) -> Result<TxData, FlowError> {
		let gas_price = self.node.get_gas_price().await?;
		let mut draft = TxData {
			from: self.from,
			to,
			value,
			data,
			gas: U64::ZERO,
			gas_price,
			nonce: None,
		};
		let estimate = self.node.estimate_gas(&draft).await?;
		draft.gas = U64::from(with_gas_overhead(estimate));
		Ok(draft)
	}

	/// Builds a draft calling `call` on the contract at `to`.
	pub async fn contract_call<C: SolCall>(&self, to: Address, call: C) -> Result<TxData, FlowError> {
		self.draft(to, U256::ZERO, Some(Bytes::from(call.abi_encode())))
			.await
	}
}

pub fn with_gas_overhead(estimate: u64) -> u64 {
	estimate.saturating_add(estimate.saturating_mul(GAS_OVERHEAD_PERCENT) / 100)
}

/// One kind of transaction the user can send.
#[async_trait]
pub trait TxFlow: Send + Sync {
	fn kind(&self) -> TxSenderType;

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError>;

	/// Pre-flight check before the user is asked to sign. By default the
	/// sender must afford gas and value.
	async fn validate(&self, ctx: &FlowContext<'_>, draft: &TxData) -> Result<(), FlowError> {
		let balance = ctx.node.get_balance(draft.from).await?;
		if balance < draft.max_gas_cost() {
			return Err(FlowError::NotEnoughEtherForGas);
		}
		if balance < draft.total_cost() {
			return Err(FlowError::NotEnoughFunds);
		}
		Ok(())
	}

	/// Events published once the flow ends, whatever the outcome.
	fn cleanup(&self) -> Vec<DataEvent> {
		Vec::new()
	}
}
